//! Error taxonomy for the client.
//!
//! Every failure that aborts an operation ends up as an [`FbError`]. Each
//! variant maps to a machine-readable kind string (see [`FbError::kind`]) so
//! callers can branch on it, for example to restart API key creation after
//! `user/login-failed`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FbError>;

#[derive(Error, Debug)]
pub enum FbError {
    /// The service could not be reached (DNS, TLS, connection reset, ...)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with something we do not understand
    #[error("Invalid response: {message}")]
    Protocol { message: String },

    /// The service answered with `status: "error"`
    #[error("Request failed: {message}")]
    Api { message: String, error_id: String },

    /// A file is larger than the server accepts; nothing was sent
    #[error("File too big: {} ({size} bytes, server maximum is {max})", path.display())]
    FileTooBig { path: PathBuf, size: u64, max: u64 },

    /// The user aborted the running operation
    #[error("Interrupted")]
    Interrupted,

    #[error("No API key found in {}", path.display())]
    ApikeyNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FbError {
    pub fn protocol(message: impl Into<String>) -> Self {
        FbError::Protocol {
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>, error_id: impl Into<String>) -> Self {
        FbError::Api {
            message: message.into(),
            error_id: error_id.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        FbError::Config {
            message: message.into(),
        }
    }

    /// Machine-readable error kind. Server errors keep the server's `error_id`.
    pub fn kind(&self) -> &str {
        match self {
            FbError::Api { error_id, .. } => error_id,
            FbError::Transport(_) => "client-internal/transport",
            FbError::Protocol { .. } | FbError::Json(_) => "client-internal/invalid-response",
            FbError::FileTooBig { .. } => "client-internal/file-too-big",
            FbError::Interrupted => "client-internal/interrupted",
            FbError::ApikeyNotFound { .. } => "client-internal/apikey-not-found",
            FbError::Config { .. } => "client-internal/config",
            FbError::Io(_) => "client-internal/io",
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, FbError::Interrupted)
    }
}
