//! Lambda function that emails a fixed recipient whenever an object is
//! uploaded to the watched bucket.

mod error;
mod handler;
mod message;
mod sender;
mod settings;

pub use error::NotifyError;
pub use handler::{DeliveryReport, Notifier};
pub use message::{EmailMessage, EmailRenderer, SUBJECT, UploadNotice};
pub use sender::EmailSender;
pub use settings::{RECIPIENT_VAR, REGION_VAR, SENDER_VAR, Settings, retry_config};
