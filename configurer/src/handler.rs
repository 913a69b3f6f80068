use std::sync::Arc;
use std::time::{Duration, SystemTime};

use lambda_runtime::{Context, tracing};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    Acknowledgement, CALLBACK_TIMEOUT, ConfigureError, CustomResourceRequest,
    CustomResourceResponse, NotificationStore, ResponseEnvelope, ResponseSender,
};

/// Time kept back from the invocation deadline to deliver the response: the
/// callback's own timeout plus slack for logging and serialization.
pub const RESPONSE_MARGIN: Duration = CALLBACK_TIMEOUT.saturating_add(Duration::from_secs(2));

/// Budget used when the invocation carries no usable deadline.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(30);

/// Answers custom resource lifecycle requests.
///
/// Every request gets exactly one response: a payload that does not parse,
/// storage errors, a blown time budget and panics during reconciliation are
/// all reported as FAILED.
pub struct Configurer {
    store: Arc<dyn NotificationStore>,
    responder: Arc<dyn ResponseSender>,
}

impl Configurer {
    pub fn new(store: Arc<dyn NotificationStore>, responder: Arc<dyn ResponseSender>) -> Configurer {
        Configurer { store, responder }
    }

    /// Entry point for the raw invocation payload.
    ///
    /// A payload that is not a valid request is still answered with FAILED as
    /// long as it names a `ResponseURL`.
    pub async fn handle_event(
        &self,
        payload: Value,
        context: &Context,
    ) -> Result<CustomResourceResponse, ConfigureError> {
        match CustomResourceRequest::deserialize(&payload) {
            Ok(request) => self.handle(request, context).await,
            Err(err) => {
                let envelope =
                    ResponseEnvelope::from_payload(&payload).ok_or(ConfigureError::Unanswerable)?;
                tracing::error!(error = %err, request_id = %envelope.request_id, "Malformed custom resource request");
                let physical_resource_id = envelope.failure_physical_id();
                Acknowledgement::new(envelope, self.responder.as_ref())
                    .fail(physical_resource_id, format!("malformed request: {err}"))
                    .await
            }
        }
    }

    /// Fails only when the response itself could not be delivered.
    pub async fn handle(
        &self,
        request: CustomResourceRequest,
        context: &Context,
    ) -> Result<CustomResourceResponse, ConfigureError> {
        tracing::info!(
            request_type = ?request.request_type,
            request_id = %request.request_id,
            logical_resource_id = %request.logical_resource_id,
            "Received custom resource request"
        );
        let ack = Acknowledgement::for_request(&request, self.responder.as_ref());

        let response = match self.reconcile(&request, time_budget(context)).await {
            Ok(()) => ack.succeed(request.success_physical_id()).await?,
            Err(err) => {
                tracing::error!(error = %err, "Failed to reconcile bucket notification");
                ack.fail(request.failure_physical_id(), err.to_string())
                    .await?
            }
        };

        tracing::info!(
            status = ?response.status,
            physical_resource_id = %response.physical_resource_id,
            "Sent custom resource response"
        );
        Ok(response)
    }

    async fn reconcile(
        &self,
        request: &CustomResourceRequest,
        budget: Duration,
    ) -> Result<(), ConfigureError> {
        let desired = request.desired_state()?;
        let store = Arc::clone(&self.store);
        let mut task = tokio::spawn(async move { store.reconcile(&desired).await });

        match tokio::time::timeout(budget, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(ConfigureError::Aborted(err.to_string())),
            Err(_) => {
                task.abort();
                Err(ConfigureError::TimedOut(budget))
            }
        }
    }
}

/// Time left for reconciliation, keeping [`RESPONSE_MARGIN`] for the answer.
pub fn time_budget(context: &Context) -> Duration {
    match context.deadline().duration_since(SystemTime::now()) {
        Ok(remaining) => remaining.saturating_sub(RESPONSE_MARGIN),
        Err(_) => DEFAULT_BUDGET,
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use aws_sdk_s3::operation::put_bucket_notification_configuration::{
        PutBucketNotificationConfigurationError, PutBucketNotificationConfigurationOutput,
    };
    use async_trait::async_trait;
    use aws_smithy_mocks::{mock, mock_client};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::test_support::{FailingSender, RecordingSender, create_request, s3_error};
    use crate::{BucketNotifications, DesiredState, RequestType, ResponseStatus};

    const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:fn-notify";

    fn configurer(s3: aws_sdk_s3::Client, sender: &Arc<RecordingSender>) -> Configurer {
        let responder: Arc<dyn ResponseSender> = sender.clone();
        Configurer::new(Arc::new(BucketNotifications::new(s3)), responder)
    }

    fn ok_rule() -> aws_smithy_mocks::Rule {
        mock!(aws_sdk_s3::Client::put_bucket_notification_configuration)
            .then_output(|| PutBucketNotificationConfigurationOutput::builder().build())
    }

    #[tokio::test]
    async fn create_binds_and_reports_success() {
        let put_rule = mock!(aws_sdk_s3::Client::put_bucket_notification_configuration)
            .match_requests(|req| {
                req.bucket() == Some("bkt-1")
                    && req.notification_configuration().is_some_and(|c| {
                        c.lambda_function_configurations()
                            .iter()
                            .any(|l| l.lambda_function_arn() == FUNCTION_ARN)
                    })
            })
            .then_output(|| PutBucketNotificationConfigurationOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());

        let response = configurer(s3, &sender)
            .handle(create_request("bkt-1", FUNCTION_ARN), &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 1);
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "bkt-1-notify-config");
        assert_eq!(response.reason, None);
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn update_reports_id_of_new_bucket() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());
        let mut request = create_request("bkt-2", FUNCTION_ARN);
        request.request_type = RequestType::Update;
        request.physical_resource_id = Some("bkt-1-notify-config".into());

        let response = configurer(s3, &sender)
            .handle(request, &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 1);
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "bkt-2-notify-config");
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn delete_without_configuration_succeeds() {
        let put_rule = mock!(aws_sdk_s3::Client::put_bucket_notification_configuration)
            .then_error(|| {
                PutBucketNotificationConfigurationError::generic(s3_error(
                    "NoSuchBucket",
                    "The specified bucket does not exist",
                ))
            });
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());
        let mut request = create_request("bkt-1", FUNCTION_ARN);
        request.request_type = RequestType::Delete;
        request.physical_resource_id = Some("bkt-1-notify-config".into());

        let response = configurer(s3, &sender)
            .handle(request, &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 1);
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "bkt-1-notify-config");
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn delete_of_failed_create_skips_storage() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());
        let mut request = create_request("bkt-1", FUNCTION_ARN);
        request.request_type = RequestType::Delete;
        request.physical_resource_id = Some("failed-create-req-0".into());

        let response = configurer(s3, &sender)
            .handle(request, &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 0);
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn storage_error_reports_failure_once() {
        let put_rule = mock!(aws_sdk_s3::Client::put_bucket_notification_configuration)
            .then_error(|| {
                PutBucketNotificationConfigurationError::generic(s3_error(
                    "AccessDenied",
                    "Access Denied",
                ))
            });
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());

        let response = configurer(s3, &sender)
            .handle(create_request("bkt-1", FUNCTION_ARN), &Context::default())
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.reason.as_deref().is_some_and(|r| r.contains("Access Denied")));
        assert_eq!(response.physical_resource_id, "failed-create-req-1");
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn missing_properties_report_failure_without_calling_s3() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());
        let mut request = create_request("bkt-1", FUNCTION_ARN);
        request.resource_properties.bucket_name = None;

        let response = configurer(s3, &sender)
            .handle(request, &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 0);
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(
            response.reason.as_deref(),
            Some("resource property S3BucketName is missing")
        );
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn panic_during_reconcile_reports_failure() {
        let put_rule = mock!(aws_sdk_s3::Client::put_bucket_notification_configuration)
            .then_output(|| -> PutBucketNotificationConfigurationOutput { panic!("storage fake exploded") });
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());

        let response = configurer(s3, &sender)
            .handle(create_request("bkt-1", FUNCTION_ARN), &Context::default())
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.reason.as_deref().is_some_and(|r| r.starts_with("reconciliation aborted")));
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn undeliverable_response_fails_invocation() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let configurer = Configurer::new(Arc::new(BucketNotifications::new(s3)), Arc::new(FailingSender));

        let err = configurer
            .handle(create_request("bkt-1", FUNCTION_ARN), &Context::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigureError::CallbackRejected(403)));
    }

    #[test]
    fn budget_keeps_margin_before_deadline() {
        let mut context = Context::default();
        let deadline = SystemTime::now() + RESPONSE_MARGIN + Duration::from_secs(60);
        context.deadline = deadline.duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;

        let budget = time_budget(&context);

        assert!(budget <= Duration::from_secs(60));
        assert!(budget > Duration::from_secs(55));
    }

    #[test]
    fn margin_outlasts_callback_timeout() {
        assert!(RESPONSE_MARGIN > CALLBACK_TIMEOUT);
    }

    struct StalledStore;

    #[async_trait]
    impl NotificationStore for StalledStore {
        async fn reconcile(&self, _desired: &DesiredState) -> Result<(), ConfigureError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_reconcile_times_out_as_failure() {
        let sender = Arc::new(RecordingSender::default());
        let responder: Arc<dyn ResponseSender> = sender.clone();
        let configurer = Configurer::new(Arc::new(StalledStore), responder);

        let response = configurer
            .handle(create_request("bkt-1", FUNCTION_ARN), &Context::default())
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(
            response
                .reason
                .as_deref()
                .is_some_and(|r| r.starts_with("reconciliation did not finish"))
        );
        assert_eq!(sender.sent().len(), 1);
    }

    fn raw_create_payload() -> Value {
        json!({
            "RequestType": "Create",
            "ResponseURL": "https://cloudformation-custom-resource-response.s3.amazonaws.com/req-1",
            "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/notify/1",
            "RequestId": "req-1",
            "LogicalResourceId": "BucketNotification",
            "ResourceType": "Custom::BucketNotification",
            "ResourceProperties": {
                "S3BucketName": "bkt-1",
                "FunctionARN": FUNCTION_ARN
            }
        })
    }

    #[tokio::test]
    async fn raw_payload_is_handled() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());

        let response = configurer(s3, &sender)
            .handle_event(raw_create_payload(), &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 1);
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "bkt-1-notify-config");
    }

    #[tokio::test]
    async fn payload_without_logical_id_still_gets_one_failure() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());
        let mut payload = raw_create_payload();
        payload.as_object_mut().unwrap().remove("LogicalResourceId");

        let response = configurer(s3, &sender)
            .handle_event(payload, &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 0);
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.physical_resource_id, "failed-create-req-1");
        assert_eq!(response.request_id, "req-1");
        assert!(
            response
                .reason
                .as_deref()
                .is_some_and(|r| r.contains("LogicalResourceId"))
        );
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].0,
            "https://cloudformation-custom-resource-response.s3.amazonaws.com/req-1"
        );
    }

    #[tokio::test]
    async fn unknown_request_type_gets_one_failure() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());
        let mut payload = raw_create_payload();
        payload["RequestType"] = json!("Replace");
        payload["PhysicalResourceId"] = json!("bkt-1-notify-config");

        let response = configurer(s3, &sender)
            .handle_event(payload, &Context::default())
            .await
            .unwrap();

        assert_eq!(put_rule.num_calls(), 0);
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.physical_resource_id, "bkt-1-notify-config");
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn payload_without_response_url_cannot_be_answered() {
        let put_rule = ok_rule();
        let s3 = mock_client!(aws_sdk_s3, [&put_rule]);
        let sender = Arc::new(RecordingSender::default());
        let mut payload = raw_create_payload();
        payload.as_object_mut().unwrap().remove("ResponseURL");

        let err = configurer(s3, &sender)
            .handle_event(payload, &Context::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigureError::Unanswerable));
        assert!(sender.sent().is_empty());
    }

    #[test]
    fn budget_falls_back_without_deadline() {
        assert_eq!(time_budget(&Context::default()), DEFAULT_BUDGET);
    }
}
