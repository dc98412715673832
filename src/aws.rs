//! Shared AWS SDK plumbing: client configuration and error classification.

use crate::error::MedstoreError;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Attempts made by the SDK's standard retry policy before giving up.
pub const MAX_ATTEMPTS: u32 = 10;

/// Loads the shared SDK configuration for a region.
///
/// Credentials come from the default provider chain. Retries are left to the
/// SDK; nothing in this crate retries on its own.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
        .load()
        .await
}

/// Coarse classification of a service-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    NotFound,
    PermissionDenied,
    Throttled,
    InvalidRequest,
    Other,
}

impl ServiceErrorKind {
    /// Wraps a message in the matching error variant.
    pub fn into_error(self, message: String) -> MedstoreError {
        match self {
            Self::NotFound => MedstoreError::NotFound(message),
            Self::PermissionDenied => MedstoreError::PermissionDenied(message),
            Self::Throttled => MedstoreError::Throttled(message),
            Self::InvalidRequest => MedstoreError::InvalidRequest(message),
            Self::Other => MedstoreError::Service(message),
        }
    }
}

/// Classifies an error from its service error code, falling back to the
/// HTTP status for bodiless responses such as `HeadBucket`.
pub fn classify_code(code: Option<&str>, status: Option<u16>) -> ServiceErrorKind {
    if let Some(code) = code {
        match code {
            "NoSuchBucket" | "NoSuchKey" | "NoSuchVersion" | "NotFound"
            | "NoSuchLifecycleConfiguration" | "ResourceNotFoundException"
            | "EntityNotFoundException" => return ServiceErrorKind::NotFound,
            "AccessDenied" | "AccessDeniedException" | "Forbidden" | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch" | "ExpiredToken" | "UnrecognizedClientException" => {
                return ServiceErrorKind::PermissionDenied
            }
            "SlowDown" | "Throttling" | "ThrottlingException" | "TooManyRequestsException"
            | "RequestLimitExceeded" => return ServiceErrorKind::Throttled,
            "InvalidRequestException" | "InvalidRequest" | "InvalidArgument"
            | "InvalidBucketName" | "MalformedXML" | "MalformedPolicy" => {
                return ServiceErrorKind::InvalidRequest
            }
            _ => {}
        }
    }

    match status {
        Some(404) => ServiceErrorKind::NotFound,
        Some(401) | Some(403) => ServiceErrorKind::PermissionDenied,
        Some(429) | Some(503) => ServiceErrorKind::Throttled,
        Some(400) => ServiceErrorKind::InvalidRequest,
        _ => ServiceErrorKind::Other,
    }
}

/// Converts an SDK error into a classified [`MedstoreError`].
///
/// `context` names the operation and its target, e.g. `"HeadBucket my-bucket"`.
pub fn classify_sdk_error<E>(context: &str, err: SdkError<E, HttpResponse>) -> MedstoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = format!("{context}: {}", DisplayErrorContext(&err));

    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            return MedstoreError::Transport(detail);
        }
        SdkError::ConstructionFailure(_) => return MedstoreError::Internal(detail),
        _ => {}
    }

    let code = err.as_service_error().and_then(|e| e.code());
    let status = err.raw_response().map(|r| r.status().as_u16());
    classify_code(code, status).into_error(detail)
}
