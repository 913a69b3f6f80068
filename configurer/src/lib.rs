//! Custom resource handler that attaches an S3 bucket's object-created
//! notifications to a Lambda function.
//!
//! CloudFormation cannot declare the bucket notification directly: the bucket,
//! the function and the invoke permission would depend on each other. The
//! stack instead declares a custom resource, and this function applies the
//! configuration once all three exist.

mod error;
mod handler;
mod notification;
mod request;
mod response;

pub use error::ConfigureError;
pub use handler::{Configurer, DEFAULT_BUDGET, RESPONSE_MARGIN, time_budget};
pub use notification::{
    BucketNotifications, CONFIGURATION_ID, NotificationStore, OBJECT_CREATED_EVENTS,
};
pub use request::{
    CustomResourceRequest, DesiredState, FAILED_CREATE_PREFIX, RequestType, ResourceProperties,
    ResponseEnvelope, physical_resource_id,
};
pub use response::{
    Acknowledgement, CALLBACK_TIMEOUT, CustomResourceResponse, HttpResponseSender, ResponseSender,
    ResponseStatus,
};
