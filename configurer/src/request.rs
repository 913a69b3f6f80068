use serde::Deserialize;
use serde_json::Value;

use crate::ConfigureError;

const PHYSICAL_ID_SUFFIX: &str = "-notify-config";

/// Prefix of the physical id reported when a Create fails. A Delete carrying
/// such an id has nothing to remove.
pub const FAILED_CREATE_PREFIX: &str = "failed-create-";

pub fn physical_resource_id(bucket: &str) -> String {
    format!("{bucket}{PHYSICAL_ID_SUFFIX}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceProperties {
    #[serde(rename = "S3BucketName", default)]
    pub bucket_name: Option<String>,
    #[serde(rename = "FunctionARN", default)]
    pub function_arn: Option<String>,
}

/// Lifecycle request sent by CloudFormation for the custom resource.
///
/// Missing resource properties are reported back as a failure by the handler.
/// A payload that does not parse at all is answered from its
/// [`ResponseEnvelope`] instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    pub request_id: String,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
}

/// The fields a response echoes back, recovered from a raw payload.
///
/// Anything but `ResponseURL` may be missing; without it there is nowhere to
/// send an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
}

impl ResponseEnvelope {
    pub fn from_payload(payload: &Value) -> Option<ResponseEnvelope> {
        let field = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_owned);

        Some(ResponseEnvelope {
            response_url: field("ResponseURL").filter(|url| !url.is_empty())?,
            stack_id: field("StackId").unwrap_or_default(),
            request_id: field("RequestId").unwrap_or_default(),
            logical_resource_id: field("LogicalResourceId").unwrap_or_default(),
            physical_resource_id: field("PhysicalResourceId"),
        })
    }

    /// Physical id to report when the request itself could not be read.
    pub fn failure_physical_id(&self) -> String {
        self.physical_resource_id
            .clone()
            .unwrap_or_else(|| format!("{FAILED_CREATE_PREFIX}{}", self.request_id))
    }
}

/// What the bucket's notification configuration should look like once the
/// request has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredState {
    Bound { bucket: String, function_arn: String },
    Cleared { bucket: String },
    /// The resource was never created, so there is nothing to reconcile.
    Untouched,
}

impl CustomResourceRequest {
    pub fn envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope {
            response_url: self.response_url.clone(),
            stack_id: self.stack_id.clone(),
            request_id: self.request_id.clone(),
            logical_resource_id: self.logical_resource_id.clone(),
            physical_resource_id: self.physical_resource_id.clone(),
        }
    }

    fn bucket(&self) -> Result<&str, ConfigureError> {
        self.resource_properties
            .bucket_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(ConfigureError::MissingProperty("S3BucketName"))
    }

    fn function_arn(&self) -> Result<&str, ConfigureError> {
        self.resource_properties
            .function_arn
            .as_deref()
            .filter(|arn| !arn.is_empty())
            .ok_or(ConfigureError::MissingProperty("FunctionARN"))
    }

    fn is_failed_create(&self) -> bool {
        self.physical_resource_id
            .as_deref()
            .is_some_and(|id| id.starts_with(FAILED_CREATE_PREFIX))
    }

    pub fn desired_state(&self) -> Result<DesiredState, ConfigureError> {
        match self.request_type {
            RequestType::Create | RequestType::Update => Ok(DesiredState::Bound {
                bucket: self.bucket()?.to_owned(),
                function_arn: self.function_arn()?.to_owned(),
            }),
            RequestType::Delete if self.is_failed_create() => Ok(DesiredState::Untouched),
            RequestType::Delete => Ok(DesiredState::Cleared {
                bucket: self.bucket()?.to_owned(),
            }),
        }
    }

    fn derived_physical_id(&self) -> Option<String> {
        self.bucket().ok().map(physical_resource_id)
    }

    fn failed_create_id(&self) -> String {
        format!("{FAILED_CREATE_PREFIX}{}", self.request_id)
    }

    /// Physical id to report after a successful reconciliation.
    ///
    /// Create and Update derive it from the bucket, so pointing the resource
    /// at another bucket yields a new id and CloudFormation deletes the old
    /// one. Delete echoes the id it was given.
    pub fn success_physical_id(&self) -> String {
        let id = match self.request_type {
            RequestType::Delete => self
                .physical_resource_id
                .clone()
                .or_else(|| self.derived_physical_id()),
            RequestType::Create | RequestType::Update => self
                .derived_physical_id()
                .or_else(|| self.physical_resource_id.clone()),
        };
        id.unwrap_or_else(|| self.failed_create_id())
    }

    /// Physical id to report when reconciliation failed.
    pub fn failure_physical_id(&self) -> String {
        match self.request_type {
            RequestType::Create => self.failed_create_id(),
            RequestType::Update | RequestType::Delete => self
                .physical_resource_id
                .clone()
                .or_else(|| self.derived_physical_id())
                .unwrap_or_else(|| self.failed_create_id()),
        }
    }
}
