use std::error::Error as StdError;
use std::io::Error as IoError;

use aws_sdk_eks::error::DisplayErrorContext;
use aws_sdk_eks::error::ProvideErrorMetadata;
use aws_sdk_eks::error::SdkError;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use thiserror::Error;

use crate::{ClusterEndpoint, ClusterRef};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no usable AWS credentials: {}", .reasons.join("; "))]
    CredentialsUnavailable { reasons: Vec<String> },
    #[error("unable to mint token for {cluster}: {}", .attempts.join("; "))]
    TokenMintFailed {
        cluster: ClusterRef,
        attempts: Vec<String>,
    },
    #[error("cluster {0} not found")]
    ClusterNotFound(ClusterRef),
    #[error("nodegroup {nodegroup} not found in cluster {cluster}")]
    NodegroupNotFound {
        cluster: ClusterRef,
        nodegroup: String,
    },
    #[error("{target} unreachable: {reason}")]
    Unreachable { target: String, reason: String },
    #[error("cluster {cluster} is {status}, not ACTIVE")]
    ClusterNotActive {
        cluster: ClusterRef,
        status: String,
        endpoint: Box<ClusterEndpoint>,
    },
    #[error("{target} rejected the caller identity: {message}")]
    Unauthorized { target: String, message: String },
    #[error("{target} returned status {status}: {message}")]
    Upstream {
        target: String,
        status: u16,
        message: String,
    },
    #[error("unexpected response from {target}: {reason}")]
    Decode { target: String, reason: String },
    #[error("{program} failed: {message}")]
    Process { program: String, message: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
}

impl AuthError {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::CredentialsUnavailable {
            reasons: vec![reason.into()],
        }
    }

    pub(crate) fn decode(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

const NOT_FOUND_EXCEPTION: &str = "ResourceNotFoundException";

/// map a failed AWS call onto the error taxonomy
///
/// `not_found` builds the error for a 404 or `ResourceNotFoundException`,
/// receiving the service message.
pub(crate) fn from_sdk<E, F>(target: &str, err: SdkError<E, HttpResponse>, not_found: F) -> AuthError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    F: FnOnce(String) -> AuthError,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => AuthError::Unreachable {
            target: target.to_owned(),
            reason: DisplayErrorContext(&err).to_string(),
        },
        _ => {
            let status = err
                .raw_response()
                .map(|response| response.status().as_u16())
                .unwrap_or_default();
            let code = err.code().unwrap_or_default().to_owned();
            let message = err
                .message()
                .map(str::to_owned)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
            classify(target, status, &code, message, not_found)
        }
    }
}

pub(crate) fn classify<F>(target: &str, status: u16, code: &str, message: String, not_found: F) -> AuthError
where
    F: FnOnce(String) -> AuthError,
{
    if status == 404 || code == NOT_FOUND_EXCEPTION {
        return not_found(message);
    }
    if status == 401 || status == 403 || code.starts_with("AccessDenied") {
        return AuthError::Unauthorized {
            target: target.to_owned(),
            message,
        };
    }
    AuthError::Upstream {
        target: target.to_owned(),
        status,
        message,
    }
}

#[cfg(test)]
mod test {

    use crate::ClusterRef;

    use super::*;

    #[test]
    fn test_classify() {
        let cluster = ClusterRef::new("gone", "us-east-1");
        let not_found = |_: String| AuthError::ClusterNotFound(cluster.clone());

        assert!(matches!(
            classify("eks", 404, "", "No cluster found for name: gone.".to_owned(), not_found),
            AuthError::ClusterNotFound(_)
        ));
        assert!(matches!(
            classify("eks", 400, "ResourceNotFoundException", String::new(), not_found),
            AuthError::ClusterNotFound(_)
        ));
        match classify("eks", 403, "AccessDeniedException", "denied".to_owned(), not_found) {
            AuthError::Unauthorized { message, .. } => assert_eq!(message, "denied"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            classify("sts", 400, "AccessDenied", String::new(), not_found),
            AuthError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify("eks", 503, "ServerException", "oops".to_owned(), not_found),
            AuthError::Upstream { status: 503, .. }
        ));
    }
}
