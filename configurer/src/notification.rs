use async_trait::async_trait;
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::types::{Event, LambdaFunctionConfiguration, NotificationConfiguration};
use lambda_runtime::tracing;

use crate::{ConfigureError, DesiredState};

pub const CONFIGURATION_ID: &str = "object-create-permission";
pub const OBJECT_CREATED_EVENTS: &str = "s3:ObjectCreated:*";

/// Error codes meaning there is no configuration left to clear.
const ABSENT_CODES: [&str; 3] = ["NoSuchBucket", "NotFound", "NoSuchConfiguration"];

/// Where the bucket notification configuration lives.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn reconcile(&self, desired: &DesiredState) -> Result<(), ConfigureError>;
}

/// Reconciles a bucket's notification configuration through the S3 API.
///
/// The bucket is assumed to carry this one binding only: applying replaces
/// and clearing removes every notification on the bucket.
pub struct BucketNotifications {
    s3_client: s3::Client,
}

#[async_trait]
impl NotificationStore for BucketNotifications {
    async fn reconcile(&self, desired: &DesiredState) -> Result<(), ConfigureError> {
        match desired {
            DesiredState::Bound {
                bucket,
                function_arn,
            } => self.apply(bucket, function_arn).await,
            DesiredState::Cleared { bucket } => self.clear(bucket).await,
            DesiredState::Untouched => {
                tracing::info!("Resource was never created, nothing to clear");
                Ok(())
            }
        }
    }
}

impl BucketNotifications {
    pub fn new(s3_client: s3::Client) -> BucketNotifications {
        BucketNotifications { s3_client }
    }

    /// Routes object-created events on `bucket` to `function_arn`, replacing
    /// every notification the bucket had, including ones other tools set.
    pub async fn apply(&self, bucket: &str, function_arn: &str) -> Result<(), ConfigureError> {
        let lambda = LambdaFunctionConfiguration::builder()
            .id(CONFIGURATION_ID)
            .lambda_function_arn(function_arn)
            .events(Event::from(OBJECT_CREATED_EVENTS))
            .build()?;
        let configuration = NotificationConfiguration::builder()
            .lambda_function_configurations(lambda)
            .build();

        self.put(bucket, configuration).await?;
        tracing::info!(bucket, function_arn, "Bound object-created events");
        Ok(())
    }

    /// Removes every notification from `bucket`, not only the one [`apply`]
    /// wrote. A bucket that is already gone counts as cleared.
    ///
    /// [`apply`]: BucketNotifications::apply
    pub async fn clear(&self, bucket: &str) -> Result<(), ConfigureError> {
        match self
            .put(bucket, NotificationConfiguration::builder().build())
            .await
        {
            Ok(()) => {
                tracing::info!(bucket, "Cleared notification configuration");
                Ok(())
            }
            Err(err) if err.storage_code().is_some_and(|code| ABSENT_CODES.contains(&code)) => {
                tracing::warn!(bucket, error = %err, "Notification configuration already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        configuration: NotificationConfiguration,
    ) -> Result<(), ConfigureError> {
        self.s3_client
            .put_bucket_notification_configuration()
            .bucket(bucket)
            .notification_configuration(configuration)
            .send()
            .await
            .map_err(|e| e.into_service_error())
            .map_err(|e| ConfigureError::Storage {
                bucket: bucket.to_owned(),
                code: e.code().map(str::to_owned),
                message: e.message().map(str::to_owned).unwrap_or_else(|| e.to_string()),
            })?;
        Ok(())
    }
}
