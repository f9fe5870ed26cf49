use std::fmt;
use std::io::Error as IoError;

use serde::Serialize;
use thiserror::Error;

use k8_config::ConfigError;
use k8_eks_auth::AuthError;
use k8_eks_auth::ClusterRef;

/// stable failure kinds reported at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    CredentialsUnavailable,
    TokenMintFailed,
    ClusterNotFound,
    ClusterUnreachable,
    ClusterNotActive,
    UpstreamUnauthorized,
    ResourceNotFound,
    UpstreamError,
    DecodeError,
    MissingParameter,
    UnknownOperation,
    InvalidParameter,
    ConfigurationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialsUnavailable => "CredentialsUnavailable",
            Self::TokenMintFailed => "TokenMintFailed",
            Self::ClusterNotFound => "ClusterNotFound",
            Self::ClusterUnreachable => "ClusterUnreachable",
            Self::ClusterNotActive => "ClusterNotActive",
            Self::UpstreamUnauthorized => "UpstreamUnauthorized",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::UpstreamError => "UpstreamError",
            Self::DecodeError => "DecodeError",
            Self::MissingParameter => "MissingParameter",
            Self::UnknownOperation => "UnknownOperation",
            Self::InvalidParameter => "InvalidParameter",
            Self::ConfigurationError => "ConfigurationError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{cluster} refused {path}: {message}")]
    UpstreamUnauthorized {
        cluster: ClusterRef,
        path: String,
        message: String,
    },
    #[error("{path} not found in {cluster}: {message}")]
    ResourceNotFound {
        cluster: ClusterRef,
        path: String,
        message: String,
    },
    #[error("{cluster} failed {path}: {message}")]
    UpstreamError {
        cluster: ClusterRef,
        path: String,
        message: String,
    },
    #[error("unable to decode {what}: {reason}")]
    DecodeError { what: String, reason: String },
    #[error("operation {operation} requires parameter {param}")]
    MissingParameter { operation: String, param: String },
    #[error("unknown operation {0}")]
    UnknownOperation(String),
    #[error("invalid parameter {param} for {operation}: {reason}")]
    InvalidParameter {
        operation: String,
        param: String,
        reason: String,
    },
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: String,
        name: String,
        reason: String,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("kubeconfig error: {0}")]
    KubeConfig(#[from] ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Auth(err) => match err {
                AuthError::CredentialsUnavailable { .. } => ErrorCode::CredentialsUnavailable,
                AuthError::TokenMintFailed { .. } => ErrorCode::TokenMintFailed,
                AuthError::ClusterNotFound(_) => ErrorCode::ClusterNotFound,
                AuthError::NodegroupNotFound { .. } => ErrorCode::ResourceNotFound,
                AuthError::Unreachable { .. } => ErrorCode::ClusterUnreachable,
                AuthError::ClusterNotActive { .. } => ErrorCode::ClusterNotActive,
                AuthError::Unauthorized { .. } => ErrorCode::UpstreamUnauthorized,
                AuthError::Upstream { .. } | AuthError::Process { .. } => ErrorCode::UpstreamError,
                AuthError::Decode { .. } => ErrorCode::DecodeError,
                AuthError::InvalidRequest(_) => ErrorCode::InvalidParameter,
                AuthError::IoError(_) => ErrorCode::UpstreamError,
            },
            Self::UpstreamUnauthorized { .. } => ErrorCode::UpstreamUnauthorized,
            Self::ResourceNotFound { .. } => ErrorCode::ResourceNotFound,
            Self::UpstreamError { .. } | Self::IoError(_) => ErrorCode::UpstreamError,
            Self::DecodeError { .. } => ErrorCode::DecodeError,
            Self::MissingParameter { .. } => ErrorCode::MissingParameter,
            Self::UnknownOperation(_) => ErrorCode::UnknownOperation,
            Self::InvalidParameter { .. } | Self::InvalidName { .. } => ErrorCode::InvalidParameter,
            Self::Configuration(_) | Self::KubeConfig(_) => ErrorCode::ConfigurationError,
        }
    }

    pub(crate) fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::DecodeError {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}
