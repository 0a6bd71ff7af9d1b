//! Error types for checker runs

/// Contract violations of a checker run
///
/// Validation findings are never errors; they are collected as issues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckerError {
    /// A rule asked to stop the checker without reporting anything
    #[error("rule `{rule}` of {checker} requested a stop but created no issue")]
    StopWithoutIssue {
        /// Checker the rule belongs to
        checker: String,
        /// Rule identifier
        rule: &'static str,
    },
}

/// Result type for checker runs
pub type CheckerResult<T> = Result<T, CheckerError>;
