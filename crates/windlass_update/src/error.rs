//! Error types for the update subsystem.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("invalid version {input:?}: {reason}")]
    Parse { input: String, reason: String },

    #[error("update check failed: {0}")]
    Fetch(String),

    #[error("malformed release manifest: {0}")]
    Manifest(String),

    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    Checksum { expected: String, computed: String },

    #[error("unsupported checksum algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("update state error: {0}")]
    State(String),

    #[error("install failed: {0}")]
    Install(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpdateError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        UpdateError::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
