//! Rule tables, one module per checker family

pub(crate) mod annotation;
pub(crate) mod compilation;
pub(crate) mod content;
pub(crate) mod continuity;
pub(crate) mod second;
pub(crate) mod syntax;
