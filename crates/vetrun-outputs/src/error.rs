//! Error types for output collection

use std::path::PathBuf;
use vetrun_artifact::DecodeError;

/// Errors while reading, decoding or deleting output files
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error on an output file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialized object could not be parsed
    #[error("failed to parse {filename}: {source}")]
    Json {
        filename: String,
        #[source]
        source: serde_json::Error,
    },

    /// Display item document could not be decoded
    #[error("failed to decode display item {filename}: {source}")]
    DisplayItem {
        filename: String,
        #[source]
        source: DecodeError,
    },
}

impl OutputError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Filename or path the error is about
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Io { path, .. } => path.display().to_string(),
            Self::Json { filename, .. } | Self::DisplayItem { filename, .. } => filename.clone(),
        }
    }
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
