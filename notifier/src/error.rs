use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("environment variable {0} is not set")]
    MissingVariable(&'static str),

    #[error("S3 event record has no {0}")]
    MissingField(&'static str),

    #[error("failed to render email: {0}")]
    Template(String),

    #[error("failed to build email: {0}")]
    Build(#[from] aws_sdk_sesv2::error::BuildError),

    #[error("SES rejected the email for {key}: {message}")]
    Send { key: String, message: String },

    #[error("email task aborted: {0}")]
    Aborted(String),

    #[error("{failed} of {total} notifications failed, first error: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: Box<NotifyError>,
    },
}
