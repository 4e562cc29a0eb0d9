//! Error types for ControlQA.
//!
//! Library crates use [`ControlQaError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ControlQA operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlQaError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The search or completion service failed or answered with garbage.
    #[error("{service} unavailable: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    /// Document store or audit store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed input data (import files, stored documents).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Longest slice of an error response body kept in an upstream error.
const MAX_DETAIL_CHARS: usize = 200;

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ControlQaError>;

impl ControlQaError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an upstream error for the named service.
    pub fn upstream(service: &'static str, msg: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: msg.into(),
        }
    }

    /// Upstream error for a request that never produced a response.
    pub fn upstream_transport(
        service: &'static str,
        err: impl std::fmt::Display,
        timed_out: bool,
    ) -> Self {
        if timed_out {
            Self::upstream(service, format!("request timed out: {err}"))
        } else {
            Self::upstream(service, err.to_string())
        }
    }

    /// Upstream error for a non-success HTTP status, keeping the head of the body.
    pub fn upstream_status(
        service: &'static str,
        status: impl std::fmt::Display,
        body: &str,
    ) -> Self {
        Self::upstream(
            service,
            format!("HTTP {status}: {}", truncate(body, MAX_DETAIL_CHARS)),
        )
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short name of the failing component, safe to show to end users.
    pub fn component(&self) -> &'static str {
        match self {
            Self::Config { .. } => "configuration",
            Self::Upstream { service, .. } => service,
            Self::Storage(_) => "control store",
            Self::Io { .. } => "filesystem",
            Self::Validation { .. } => "input validation",
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
