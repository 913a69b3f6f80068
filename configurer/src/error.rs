use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error("request carries no ResponseURL to answer")]
    Unanswerable,

    #[error("resource property {0} is missing")]
    MissingProperty(&'static str),

    #[error("invalid notification configuration: {0}")]
    Build(#[from] aws_sdk_s3::error::BuildError),

    #[error("S3 rejected the notification configuration for {bucket}: {message}")]
    Storage {
        bucket: String,
        code: Option<String>,
        message: String,
    },

    #[error("reconciliation did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("reconciliation aborted: {0}")]
    Aborted(String),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to deliver response: {0}")]
    Callback(#[from] reqwest::Error),

    #[error("response URL rejected the response with HTTP {0}")]
    CallbackRejected(u16),
}

impl ConfigureError {
    /// Error code reported by S3, if this is a storage error.
    pub fn storage_code(&self) -> Option<&str> {
        match self {
            ConfigureError::Storage { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
