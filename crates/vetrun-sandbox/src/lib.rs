//! vetrun Sandbox
//!
//! Controlled execution of generated Python code.
//!
//! # Layers
//!
//! - [`extract_code`]: the single fenced code block of a model response
//! - [`StaticPolicy`]: tree-sitter checks of imports, built-ins and writes
//! - [`SandboxExecutor`]: child interpreter with runtime guards, timeout and
//!   stack capture, created-file reconciliation
//! - [`CodeRunner`]: extraction, execution and output read-back in one call
//!
//! Failures abort the run and surface as one [`RunFailure`]; everything else
//! is reported as non-fatal issues.

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod config;
mod executor;
mod extract;
mod failure;
mod guest;
mod policy;
mod runner;

pub use config::{ConfigError, SandboxConfig};
pub use executor::{ExecutionOutcome, SandboxExecutor, WARNING_CATEGORY};
pub use extract::{extract_code, FENCE};
pub use failure::{CodeExtractionError, RunFailure, SourceFrame};
pub use guest::{
    GuestConfig, GuestException, GuestReport, GuestStatus, IssuedWarning, Namespace, NamespaceEntry,
    ViolationKind, BOOTSTRAP_SOURCE,
};
pub use policy::{StaticPolicy, StaticReport, DISCOURAGED_CATEGORY};
pub use runner::{CodeAndOutput, CodeRunner};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{CodeRunner, ExecutionOutcome, RunFailure, SandboxConfig, SandboxExecutor};
}
