use aws_sdk_sesv2::error::ProvideErrorMetadata;
use aws_sdk_sesv2::{
    Client,
    types::{Body, Content, Destination, EmailContent, Message},
};

use crate::{EmailMessage, NotifyError};

const CHARSET: &str = "UTF-8";

/// Sends upload notices through SES from a fixed sender to a fixed recipient.
pub struct EmailSender {
    ses_client: Client,
    from_address: String,
    to_address: String,
}

impl EmailSender {
    pub fn new(ses_client: Client, from_address: String, to_address: String) -> EmailSender {
        EmailSender {
            ses_client,
            from_address,
            to_address,
        }
    }

    /// Returns the SES message id. `key` only labels errors.
    pub async fn send(&self, key: &str, email: &EmailMessage) -> Result<String, NotifyError> {
        let destination = Destination::builder()
            .to_addresses(&self.to_address)
            .build();
        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(utf8(&email.subject)?)
                    .body(
                        Body::builder()
                            .html(utf8(&email.html_body)?)
                            .text(utf8(&email.text_body)?)
                            .build(),
                    )
                    .build(),
            )
            .build();

        let out = self
            .ses_client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(destination)
            .content(content)
            .send()
            .await
            .map_err(|e| e.into_service_error())
            .map_err(|e| NotifyError::Send {
                key: key.to_owned(),
                message: e.message().map(str::to_owned).unwrap_or_else(|| e.to_string()),
            })?;

        Ok(out.message_id().unwrap_or_default().to_owned())
    }
}

fn utf8(data: &str) -> Result<Content, NotifyError> {
    Ok(Content::builder().data(data).charset(CHARSET).build()?)
}
