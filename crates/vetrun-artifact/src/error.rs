//! Error types for artifact decoding

/// Errors while decoding a recorded display item
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Document is not valid JSON or misses required fields
    #[error("malformed artifact document: {0}")]
    Json(#[from] serde_json::Error),

    /// Grid dimensions disagree with the labels
    #[error("table shape mismatch: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    /// A cell object carries an unknown tag
    #[error("unknown cell encoding: {0}")]
    UnknownCell(String),
}

impl DecodeError {
    /// Create unknown-cell error
    pub fn unknown_cell(description: impl Into<String>) -> Self {
        Self::UnknownCell(description.into())
    }
}

/// Result type for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;
