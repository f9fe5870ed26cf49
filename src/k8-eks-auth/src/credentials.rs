//! AWS credential discovery.
//!
//! Resolution is delegated to the `aws-config` default chain: environment,
//! shared config and credentials files (including SSO and
//! `credential_process` profiles), web identity federation, the container
//! endpoint and instance metadata. Resolved credentials are cached by the
//! chain until shortly before they expire.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_config::SdkConfig;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sts::error::DisplayErrorContext;
use tracing::debug;
use tracing::trace;

pub use aws_credential_types::Credentials;

use crate::AuthError;

/// region used to bootstrap the chain when none is configured
pub const FALLBACK_REGION: &str = "us-east-1";

/// shared SDK configuration with bounded timeouts and retries disabled
///
/// `region` only seeds the credential chain, every regional client
/// overrides it with the region of the cluster it talks to.
pub async fn shared_config(region: Option<String>, timeout: Duration) -> SdkConfig {
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(timeout)
        .operation_timeout(timeout)
        .build();
    let loader = aws_config::defaults(BehaviorVersion::latest())
        .timeout_config(timeouts)
        .retry_config(RetryConfig::disabled());

    let loader = match region {
        Some(region) => loader.region(Region::new(region)),
        None => loader.region(RegionProviderChain::default_provider().or_else(FALLBACK_REGION)),
    };
    let config = loader.load().await;
    debug!(region = ?config.region(), "loaded aws configuration");
    config
}

#[async_trait]
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    /// short label used in failure reasons
    fn name(&self) -> &'static str;

    async fn credentials(&self) -> Result<Credentials, AuthError>;
}

/// credentials taken as given
#[derive(Debug, Clone)]
pub struct StaticProvider(Credentials);

impl StaticProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

#[async_trait]
impl CredentialsProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn credentials(&self) -> Result<Credentials, AuthError> {
        Ok(self.0.clone())
    }
}

/// the provider chain carried by an `SdkConfig`
#[derive(Debug, Clone)]
pub struct SdkProvider {
    inner: Option<SharedCredentialsProvider>,
}

impl SdkProvider {
    pub fn new(inner: SharedCredentialsProvider) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            inner: config.credentials_provider(),
        }
    }
}

#[async_trait]
impl CredentialsProvider for SdkProvider {
    fn name(&self) -> &'static str {
        "aws-sdk"
    }

    async fn credentials(&self) -> Result<Credentials, AuthError> {
        let provider = self
            .inner
            .as_ref()
            .ok_or_else(|| AuthError::unavailable("no credential provider configured"))?;
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|err| AuthError::unavailable(DisplayErrorContext(&err).to_string()))?;
        trace!(
            access_key_len = credentials.access_key_id().len(),
            session = credentials.session_token().is_some(),
            "resolved credentials"
        );
        Ok(credentials)
    }
}
