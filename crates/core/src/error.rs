//! Error types for the recurchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! is what a turn returns to its caller.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all recurchat operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested model identifier has no initialized backend.
    #[error("Backend unavailable: model '{model}' is not loaded")]
    BackendUnavailable { model: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by a generation backend while serving a request.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model failed to load: {0}")]
    LoadFailed(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Reading the optional grounding document failed.
///
/// Never surfaced to callers of the retriever: it collapses to an empty
/// snippet and is only traced.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context document not found: {0}")]
    NotFound(PathBuf),

    #[error("Context document {path} unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Appending a completed turn to the transcript failed.
///
/// The front-end reports it and keeps the turn.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Failed to open transcript at {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Failed to append to transcript at {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_unavailable_names_the_model() {
        let err = Error::BackendUnavailable {
            model: "mythomax-l2-13b".into(),
        };
        assert!(err.to_string().contains("mythomax-l2-13b"));
        assert!(err.to_string().contains("not loaded"));
    }

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::ApiError {
            status_code: 503,
            message: "server busy".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("server busy"));
    }

    #[test]
    fn context_error_carries_path() {
        let err = ContextError::Unreadable {
            path: PathBuf::from("/tmp/notes.txt"),
            reason: "stream did not contain valid UTF-8".into(),
        };
        assert!(err.to_string().contains("/tmp/notes.txt"));
    }
}
