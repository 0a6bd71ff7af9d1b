//! vetrun Output Requirements
//!
//! Declares which files a sandboxed run should produce, matches them after
//! the run, decodes them and checks their content.
//!
//! # Flow
//!
//! 1. Declare [`OutputFileRequirements`] before the run
//! 2. [`OutputFileRequirements::reconcile`] assigns created files, first match wins
//! 3. [`OutputFileRequirements::convert_to_with_content`] decodes and deletes
//! 4. [`OutputFileRequirementsWithContent`] backs formatting and validation

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod error;
mod requirement;
mod requirements;
mod text;
mod with_content;

pub use error::{OutputError, OutputResult};
pub use requirement::{
    glob_matches, label_for_extension, OutputContent, OutputFileRequirement, RequirementKind,
    DEFAULT_MAX_TOKENS, NUM_DIGITS_FOR_FLOATS, OUTPUT_CONTENT_CATEGORY, SOURCE_PRECISION, TOO_LONG_PREVIEW_DIVISOR,
};
pub use requirements::{OutputFileRequirements, Reconciliation, MISSING_OUTPUT_CATEGORY};
pub use text::{count_tokens, create_hypertargets_to_numeric_values, extract_to_nearest_newline, round_floats};
pub use with_content::{OutputFileRequirementsWithContent, RequirementFiles};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        OutputContent, OutputFileRequirement, OutputFileRequirements, OutputFileRequirementsWithContent,
        RequirementKind,
    };
}
