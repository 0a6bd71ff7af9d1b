//! vetrun Core
//!
//! The pipeline tying the vetrun layers together: a model response goes in,
//! a [`PipelineReport`] with the code, its outputs and the issues left after
//! forgiveness comes out.
//!
//! # Example
//!
//! ```rust,ignore
//! use vetrun_core::prelude::*;
//!
//! let pipeline = Pipeline::new(PipelineConfig::from_toml_file("vetrun.toml")?);
//! let mut history = IssueHistory::new();
//! let report = pipeline.run_response(&response, &mut history).await?;
//! if !report.is_clean() {
//!     send_back(report.feedback(pipeline.config().most_severe_only));
//! }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod config;
mod error;
mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, PipelineReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{Pipeline, PipelineConfig, PipelineError, PipelineReport, PipelineResult};
    pub use vetrun_artifact::{IssueHistory, RunIssue, RunIssues};
    pub use vetrun_checks::Stage;
}
