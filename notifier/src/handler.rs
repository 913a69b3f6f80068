use std::sync::Arc;

use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::tracing;
use tokio::task::JoinSet;

use crate::{EmailRenderer, EmailSender, NotifyError, UploadNotice};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub message_ids: Vec<String>,
}

/// Turns S3 object-created events into emails, one per record.
///
/// A failed record does not stop the others. The invocation fails after every
/// record has been attempted if any of them failed, so the platform retries
/// the event.
pub struct Notifier {
    renderer: Arc<EmailRenderer>,
    sender: Arc<EmailSender>,
}

impl Notifier {
    pub fn new(renderer: EmailRenderer, sender: EmailSender) -> Notifier {
        Notifier {
            renderer: Arc::new(renderer),
            sender: Arc::new(sender),
        }
    }

    pub async fn handle(&self, event: S3Event) -> Result<DeliveryReport, NotifyError> {
        let total = event.records.len();
        if total == 0 {
            tracing::warn!("No records found in S3 event");
            return Ok(DeliveryReport::default());
        }
        tracing::info!("Number of records received: {}", total);

        let mut tasks = JoinSet::new();
        for record in &event.records {
            let notice = UploadNotice::from_record(record);
            let renderer = Arc::clone(&self.renderer);
            let sender = Arc::clone(&self.sender);

            tasks.spawn(async move {
                let notice = notice?;
                let email = renderer.render(&notice)?;
                let message_id = sender.send(&notice.key, &email).await?;
                tracing::info!(bucket = %notice.bucket, key = %notice.key, message_id = %message_id, "Email sent");
                Ok::<_, NotifyError>(message_id)
            });
        }

        let mut report = DeliveryReport::default();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(message_id)) => report.message_ids.push(message_id),
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "Failed to send notification");
                    failures.push(err);
                }
                Err(err) => {
                    tracing::error!(error = %err, "Notification task aborted");
                    failures.push(NotifyError::Aborted(err.to_string()));
                }
            }
        }

        tracing::info!("Number of failures: {}", failures.len());
        let failed = failures.len();
        match failures.into_iter().next() {
            None => Ok(report),
            Some(first) => Err(NotifyError::Partial {
                failed,
                total,
                first: Box::new(first),
            }),
        }
    }
}
