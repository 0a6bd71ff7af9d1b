//! Failure taxonomy for code runs
//!
//! Every variant aborts the run. Locations are restricted to the generated
//! source and ordered innermost-last.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use vetrun_artifact::{CodeProblem, RunIssue};

/// One location in the generated source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFrame {
    /// 1-based line number
    pub lineno: usize,
    /// Source line, trimmed
    pub line: String,
}

impl SourceFrame {
    /// Frame for `lineno` of `source`
    #[must_use]
    pub fn from_source(source: &str, lineno: usize) -> Self {
        let line = lineno
            .checked_sub(1)
            .and_then(|i| source.lines().nth(i))
            .unwrap_or("")
            .trim()
            .to_string();
        Self { lineno, line }
    }
}

/// The response does not hold exactly one fenced code block
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected exactly one triple-backtick code block, found {num_fences} triple-backtick delimiters")]
pub struct CodeExtractionError {
    /// Number of ``` delimiters found
    pub num_fences: usize,
}

/// Why a run was aborted
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    /// No single code block in the response
    #[error(transparent)]
    CodeExtraction(#[from] CodeExtractionError),

    /// Code does not parse
    #[error("failed parsing code on line {}: {message}", frame.lineno)]
    CodeParsing {
        frame: SourceFrame,
        message: String,
        unresolved_fences: bool,
    },

    /// Import outside the allow-list
    #[error("forbidden import of `{module}`")]
    ForbiddenImport { module: String, frames: Vec<SourceFrame> },

    /// Call to a blacklisted built-in
    #[error("forbidden call to `{function}`")]
    ForbiddenFunction { function: String, frames: Vec<SourceFrame> },

    /// File opened for writing outside the allow-list
    #[error("forbidden write to \"{filename}\"")]
    ForbiddenFileWrite { filename: String, frames: Vec<SourceFrame> },

    /// Run left files no requirement matches
    #[error("un-allowed files created: {}", files.join(", "))]
    UnallowedFilesCreated { files: Vec<String> },

    /// Uncaught exception
    #[error("{exception_type}: {message}")]
    Exception {
        exception_type: String,
        message: String,
        frames: Vec<SourceFrame>,
    },

    /// Warning promoted to a failure
    #[error("{category}: {message}")]
    Warning {
        category: String,
        message: String,
        frames: Vec<SourceFrame>,
    },

    /// Wall-clock budget exceeded
    #[error("code timed out after {} seconds", timeout.as_secs_f64())]
    Timeout { timeout: Duration, frames: Vec<SourceFrame> },

    /// Designated output file missing after the run
    #[error("failed loading output file \"{filename}\"")]
    OutputLoading { filename: String },

    /// Another execution holds the run folder
    #[error("run folder {} is in use by another execution", path.display())]
    RunFolderBusy { path: PathBuf },

    /// Interpreter could not be started or died without a report
    #[error("interpreter failure: {0}")]
    Interpreter(String),

    /// IO error in the run or scratch folder
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunFailure {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Offending source locations, innermost last
    #[must_use]
    pub fn frames(&self) -> Vec<&SourceFrame> {
        match self {
            Self::CodeParsing { frame, .. } => vec![frame],
            Self::ForbiddenImport { frames, .. }
            | Self::ForbiddenFunction { frames, .. }
            | Self::ForbiddenFileWrite { frames, .. }
            | Self::Exception { frames, .. }
            | Self::Warning { frames, .. }
            | Self::Timeout { frames, .. } => frames.iter().collect(),
            Self::CodeExtraction(_)
            | Self::UnallowedFilesCreated { .. }
            | Self::OutputLoading { .. }
            | Self::RunFolderBusy { .. }
            | Self::Interpreter(_)
            | Self::Io { .. } => Vec::new(),
        }
    }

    /// `(line number, source line)` pairs, innermost last
    #[must_use]
    pub fn linenos_and_lines(&self) -> Vec<(usize, String)> {
        self.frames()
            .into_iter()
            .map(|f| (f.lineno, f.line.clone()))
            .collect()
    }

    /// Short message for feedback
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::CodeParsing {
                message,
                unresolved_fences: true,
                ..
            } => format!(
                "{message}\nThe code seems to contain unresolved triple-backtick fences (```); \
                 only the code itself should be inside the code block."
            ),
            Self::ForbiddenImport { module, .. } => {
                format!("Code tried to import `{module}`, which is not allowed.")
            }
            Self::ForbiddenFunction { function, .. } => {
                format!("Code uses the forbidden function `{function}`.")
            }
            Self::ForbiddenFileWrite { filename, .. } => {
                format!("Code writes to the file \"{filename}\", which is not allowed.")
            }
            Self::UnallowedFilesCreated { files } => format!(
                "Code created the following files, which it is not supposed to create:\n{}",
                files.join("\n")
            ),
            Self::Timeout { .. } => "Code timeout: the code took too long to run.".to_string(),
            other => other.to_string(),
        }
    }

    /// Traceback-style rendering with every mapped frame
    #[must_use]
    pub fn traceback_message(&self) -> String {
        let frames = self.frames();
        if frames.is_empty() {
            return self.message();
        }
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in frames {
            out.push_str(&format!("  On line {}: {}\n", frame.lineno, frame.line));
        }
        out.push_str(&self.message());
        out
    }

    /// Ranking of this failure as a problem with the code
    #[must_use]
    pub fn code_problem(&self) -> CodeProblem {
        match self {
            Self::CodeExtraction(e) if e.num_fences == 0 => CodeProblem::NoCode,
            Self::CodeExtraction(e) if e.num_fences % 2 == 1 => CodeProblem::IncompleteBlock,
            Self::CodeExtraction(_) => CodeProblem::NotSingleBlock,
            Self::CodeParsing { .. }
            | Self::ForbiddenImport { .. }
            | Self::ForbiddenFunction { .. }
            | Self::ForbiddenFileWrite { .. }
            | Self::UnallowedFilesCreated { .. } => CodeProblem::StaticCheck,
            Self::Timeout { .. } => CodeProblem::TimeoutError,
            Self::OutputLoading { .. } => CodeProblem::MissingOutputFiles,
            Self::Exception { .. }
            | Self::Warning { .. }
            | Self::RunFolderBusy { .. }
            | Self::Interpreter(_)
            | Self::Io { .. } => CodeProblem::RuntimeError,
        }
    }

    /// Failure as feedback for the code author
    #[must_use]
    pub fn to_run_issue(&self) -> RunIssue {
        let (category, instructions) = match self {
            Self::CodeExtraction(_) => (
                "Code extraction",
                "Please send your code as a single triple-backtick block.",
            ),
            Self::CodeParsing { .. } => ("Syntax error", "Please fix the syntax of the code."),
            Self::ForbiddenImport { .. } => (
                "Forbidden import",
                "Please revise the code to only use the allowed packages.",
            ),
            Self::ForbiddenFunction { .. } => (
                "Forbidden function",
                "Please revise the code to avoid calling this function.",
            ),
            Self::ForbiddenFileWrite { .. } | Self::UnallowedFilesCreated { .. } => (
                "Un-allowed file access",
                "Please revise the code to only create the requested output files.",
            ),
            Self::Timeout { .. } => ("Timeout", "Please revise the code so that it runs faster."),
            Self::OutputLoading { .. } => (
                "Missing output files",
                "Please revise the code to make sure it creates the output file.",
            ),
            Self::Exception { .. } | Self::Warning { .. } => {
                ("Runtime exception", "Please revise the code to fix the error.")
            }
            Self::RunFolderBusy { .. } | Self::Interpreter(_) | Self::Io { .. } => {
                ("Execution environment", "Please run the code again.")
            }
        };
        RunIssue::new(category, self.traceback_message(), self.code_problem())
            .with_instructions(instructions)
            .with_lines(self.linenos_and_lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "def func():\n    raise Exception('stupid error')\nfunc()\n";

    fn exception() -> RunFailure {
        RunFailure::Exception {
            exception_type: "Exception".into(),
            message: "stupid error".into(),
            frames: vec![SourceFrame::from_source(SOURCE, 3), SourceFrame::from_source(SOURCE, 2)],
        }
    }

    #[test]
    fn frames_map_to_trimmed_lines() {
        assert_eq!(
            exception().linenos_and_lines(),
            vec![(3, "func()".to_string()), (2, "raise Exception('stupid error')".to_string())]
        );
        assert_eq!(SourceFrame::from_source(SOURCE, 99).line, "");
    }

    #[test]
    fn traceback_lists_every_frame() {
        let text = exception().traceback_message();
        assert!(text.starts_with("Traceback (most recent call last):\n  On line 3: func()\n"));
        assert!(text.ends_with("Exception: stupid error"));
    }

    #[test]
    fn extraction_problems_by_fence_count() {
        let problem = |n| RunFailure::from(CodeExtractionError { num_fences: n }).code_problem();
        assert_eq!(problem(0), CodeProblem::NoCode);
        assert_eq!(problem(3), CodeProblem::IncompleteBlock);
        assert_eq!(problem(4), CodeProblem::NotSingleBlock);
    }

    #[test]
    fn issue_carries_lines() {
        let issue = exception().to_run_issue();
        assert_eq!(issue.code_problem, CodeProblem::RuntimeError);
        assert_eq!(issue.linenos_and_lines.len(), 2);
    }
}
