use std::time::Duration;

use async_trait::async_trait;
use lambda_runtime::tracing;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::{ConfigureError, CustomResourceRequest, ResponseEnvelope};

/// Upper bound on delivering one response.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);
const UNKNOWN_REASON: &str = "unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
}

/// Delivers a response to the URL CloudFormation handed out with the request.
#[async_trait]
pub trait ResponseSender: Send + Sync {
    async fn send(&self, url: &str, response: &CustomResourceResponse) -> Result<(), ConfigureError>;
}

/// Uploads the response with a plain HTTP PUT.
///
/// The response URL is a presigned S3 URL signed without a content type, so
/// the header is sent empty.
pub struct HttpResponseSender {
    client: reqwest::Client,
}

impl HttpResponseSender {
    pub fn new() -> Result<Self, ConfigureError> {
        let client = reqwest::Client::builder().timeout(CALLBACK_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResponseSender for HttpResponseSender {
    async fn send(&self, url: &str, response: &CustomResourceResponse) -> Result<(), ConfigureError> {
        let body = serde_json::to_string(response)?;
        let status = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "")
            .body(body)
            .send()
            .await?
            .status();

        if !status.is_success() {
            return Err(ConfigureError::CallbackRejected(status.as_u16()));
        }
        Ok(())
    }
}

/// One-shot answer to a single request.
///
/// Answering consumes the acknowledgement, so a request gets at most one
/// response. Dropping it unanswered is logged, because CloudFormation will
/// then wait until its own timeout.
pub struct Acknowledgement<'a> {
    sender: &'a dyn ResponseSender,
    envelope: ResponseEnvelope,
    answered: bool,
}

impl<'a> Acknowledgement<'a> {
    pub fn new(envelope: ResponseEnvelope, sender: &'a dyn ResponseSender) -> Self {
        Self {
            sender,
            envelope,
            answered: false,
        }
    }

    pub fn for_request(request: &CustomResourceRequest, sender: &'a dyn ResponseSender) -> Self {
        Self::new(request.envelope(), sender)
    }

    pub async fn succeed(self, physical_resource_id: String) -> Result<CustomResourceResponse, ConfigureError> {
        self.answer(ResponseStatus::Success, None, physical_resource_id).await
    }

    pub async fn fail(
        self,
        physical_resource_id: String,
        reason: String,
    ) -> Result<CustomResourceResponse, ConfigureError> {
        let reason = if reason.trim().is_empty() {
            UNKNOWN_REASON.to_owned()
        } else {
            reason
        };
        self.answer(ResponseStatus::Failed, Some(reason), physical_resource_id)
            .await
    }

    async fn answer(
        mut self,
        status: ResponseStatus,
        reason: Option<String>,
        physical_resource_id: String,
    ) -> Result<CustomResourceResponse, ConfigureError> {
        self.answered = true;
        let response = CustomResourceResponse {
            status,
            reason,
            physical_resource_id,
            stack_id: std::mem::take(&mut self.envelope.stack_id),
            request_id: std::mem::take(&mut self.envelope.request_id),
            logical_resource_id: std::mem::take(&mut self.envelope.logical_resource_id),
        };
        self.sender
            .send(&self.envelope.response_url, &response)
            .await?;
        Ok(response)
    }
}

impl Drop for Acknowledgement<'_> {
    fn drop(&mut self) {
        if !self.answered {
            tracing::error!(
                request_id = %self.envelope.request_id,
                "Custom resource request dropped without a response"
            );
        }
    }
}
