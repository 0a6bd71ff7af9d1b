//! Error types for pipeline runs
//!
//! Validation findings are never errors; a pipeline error means the run
//! produced nothing to validate, or a checker broke its contract.

use vetrun_artifact::RunIssue;
use vetrun_checks::CheckerError;
use vetrun_outputs::OutputError;
use vetrun_sandbox::{ConfigError, RunFailure};

/// Why a pipeline run ended without a report
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Extraction or execution failed
    #[error("run failed: {0}")]
    Run(#[from] RunFailure),

    /// Created files could not be collected
    #[error("output collection failed: {0}")]
    Output(#[from] OutputError),

    /// A checker broke the rule contract
    #[error("checker failed: {0}")]
    Checker(#[from] CheckerError),

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Feedback for the model, when the failure is the code's fault
    #[must_use]
    pub fn to_run_issue(&self) -> Option<RunIssue> {
        match self {
            Self::Run(failure) => Some(failure.to_run_issue()),
            Self::Output(_) | Self::Checker(_) | Self::Config(_) => None,
        }
    }
}

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;
