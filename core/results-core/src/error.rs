//! Error types for results-core operations.
//!
//! Ignorable conditions (unknown session, unknown test, duplicate submission)
//! are not errors; they surface as [`crate::RecordOutcome`] variants.

use std::path::PathBuf;

/// All errors that can occur in results-core operations.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // ─────────────────────────────────────────────────────────────────────
    // Result Record Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid {level} status: {value}")]
    InvalidStatus { level: &'static str, value: String },

    #[error("Invalid result record: {0}")]
    InvalidRecord(String),

    // ─────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Result store error: {0}")]
    Store(String),

    #[error("Session registry error: {0}")]
    Registry(String),

    #[error("Report generation failed for {spec}: {details}")]
    Render { spec: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ResultsError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ResultsError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        ResultsError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using ResultsError.
pub type Result<T> = std::result::Result<T, ResultsError>;

impl From<ResultsError> for String {
    fn from(err: ResultsError) -> String {
        err.to_string()
    }
}
