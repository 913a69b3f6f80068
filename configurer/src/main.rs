use std::sync::Arc;

use anyhow::Context as _;
use aws_config::{BehaviorVersion, SdkConfig, retry::RetryConfig};
use aws_sdk_s3 as s3;
use configurer::{BucketNotifications, Configurer, HttpResponseSender};
use lambda_runtime::LambdaEvent;

pub async fn get_aws_config() -> SdkConfig {
    let version = BehaviorVersion::v2025_01_17();
    // CloudFormation owns retries for custom resources.
    let retry_config = RetryConfig::disabled();

    aws_config::defaults(version)
        .retry_config(retry_config)
        .load()
        .await
}

async fn handle(
    configurer: &Configurer,
    request: LambdaEvent<serde_json::Value>,
) -> Result<(), lambda_runtime::Error> {
    configurer
        .handle_event(request.payload, &request.context)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let aws_config = get_aws_config().await;
    let s3_client = s3::Client::new(&aws_config);
    let responder = HttpResponseSender::new().context("building response client")?;
    let configurer = Configurer::new(
        Arc::new(BucketNotifications::new(s3_client)),
        Arc::new(responder),
    );

    let service_fn = lambda_runtime::service_fn(|request| handle(&configurer, request));
    lambda_runtime::run(service_fn).await
}
