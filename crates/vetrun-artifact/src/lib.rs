//! vetrun Artifact Model
//!
//! Values and structures shared by every vetrun crate.
//!
//! # Core Concepts
//!
//! - [`ProvenanceValue`]: number tagged with the statistics call that produced it
//! - [`Table`]: decoded data frame with per-cell provenance
//! - [`DisplayItem`]: one recorded `df_to_latex` / `df_to_figure` call
//! - [`RunIssue`] / [`RunIssues`]: structured findings ranked by [`CodeProblem`]
//!
//! # Example
//!
//! ```rust,ignore
//! use vetrun_artifact::{decode_display_item, render_latex, RenderMode};
//!
//! let item = decode_display_item(&text, &run_contexts)?;
//! let source = render_latex(&item, RenderMode::SmallerThan);
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod codec;
mod display;
mod error;
mod issue;
mod provenance;
mod render;
mod table;

pub use codec::{decode_display_item, SealVerifier};
pub use display::{DisplayArgs, DisplayFunction, DisplayItem, OneOrMany};
pub use error::{DecodeError, DecodeResult};
pub use issue::{CodeProblem, IssueHistory, RunIssue, RunIssues};
pub use provenance::{
    format_float, format_significant, ProvenanceValue, RenderMode, Scalar, MASKED_PLACEHOLDER,
    P_VALUE_MIN,
};
pub use render::{escape_latex, render_latex, render_text};
pub use table::{Axis, Cell, Label, Table};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Axis, Cell, CodeProblem, DisplayArgs, DisplayFunction, DisplayItem, Label,
        ProvenanceValue, RenderMode, RunIssue, RunIssues, Table,
    };
}
