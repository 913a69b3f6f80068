use anyhow::Context as _;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_lambda_events::event::s3::S3Event;
use aws_sdk_sesv2 as ses;
use aws_sdk_sesv2::config::Region;
use lambda_runtime::{LambdaEvent, tracing};
use notifier::{EmailRenderer, EmailSender, Notifier, Settings, retry_config};

pub async fn get_aws_config(region: &str) -> SdkConfig {
    let version = BehaviorVersion::v2025_01_17();

    aws_config::defaults(version)
        .region(Region::new(region.to_owned()))
        .retry_config(retry_config())
        .load()
        .await
}

async fn handle(
    notifier: &Notifier,
    request: LambdaEvent<S3Event>,
) -> Result<(), lambda_runtime::Error> {
    let report = notifier.handle(request.payload).await?;
    tracing::info!("Number of emails sent: {}", report.message_ids.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let settings = Settings::from_env().context("reading notifier settings")?;
    let aws_config = get_aws_config(&settings.region).await;
    let sender = EmailSender::new(
        ses::Client::new(&aws_config),
        settings.sender,
        settings.recipient,
    );
    let renderer = EmailRenderer::new().context("loading email templates")?;
    let notifier = Notifier::new(renderer, sender);

    let service_fn = lambda_runtime::service_fn(|request| handle(&notifier, request));
    lambda_runtime::run(service_fn).await
}
