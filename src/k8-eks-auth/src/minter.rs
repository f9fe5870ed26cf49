use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_config::SdkConfig;
use chrono::DateTime;
use chrono::Utc;
use tokio::process::Command;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use k8_types::core::plugin::ExecCredential;

use crate::error::from_sdk;
use crate::token::TOKEN_TTL;
use crate::AuthError;
use crate::BearerToken;
use crate::ClusterRef;
use crate::CredentialsProvider;
use crate::IdentitySigner;

/// anything that can hand out a bearer token for a cluster
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, cluster: &ClusterRef) -> Result<BearerToken, AuthError>;
}

/// one way of producing a token
#[async_trait]
pub trait MintStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn mint(&self, cluster: &ClusterRef) -> Result<BearerToken, AuthError>;
}

/// tries each strategy in order until one yields a valid token
pub struct TokenMinter {
    strategies: Vec<Box<dyn MintStrategy>>,
}

impl TokenMinter {
    pub fn new(strategies: Vec<Box<dyn MintStrategy>>) -> Self {
        Self { strategies }
    }

    /// helper cli, then STS verified presign, then local presign
    pub fn standard(
        aws_cli: impl Into<PathBuf>,
        process_timeout: Duration,
        config: &SdkConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        let signer = IdentitySigner::new(credentials);
        Self::new(vec![
            Box::new(CliStrategy::new(aws_cli, process_timeout)),
            Box::new(StsVerifiedStrategy::new(signer.clone(), config.clone())),
            Box::new(PresignStrategy::new(signer)),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub async fn mint(&self, cluster: &ClusterRef) -> Result<BearerToken, AuthError> {
        let mut attempts = vec![];
        for strategy in &self.strategies {
            match strategy.mint(cluster).await.and_then(BearerToken::validated) {
                Ok(token) => {
                    debug!(strategy = strategy.name(), %cluster, "minted token");
                    trace!(len = token.value().len(), "token length");
                    return Ok(token);
                }
                Err(err) => {
                    error!(strategy = strategy.name(), %cluster, %err, "token strategy failed");
                    attempts.push(format!("{}: {}", strategy.name(), err));
                }
            }
        }

        Err(AuthError::TokenMintFailed {
            cluster: cluster.clone(),
            attempts,
        })
    }
}

#[async_trait]
impl TokenSource for TokenMinter {
    async fn token(&self, cluster: &ClusterRef) -> Result<BearerToken, AuthError> {
        self.mint(cluster).await
    }
}

/// `aws eks get-token`
#[derive(Debug, Clone)]
pub struct CliStrategy {
    program: PathBuf,
    timeout: Duration,
}

impl CliStrategy {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MintStrategy for CliStrategy {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn mint(&self, cluster: &ClusterRef) -> Result<BearerToken, AuthError> {
        let mut command = Command::new(&self.program);
        command
            .args(["eks", "get-token", "--cluster-name"])
            .arg(&cluster.name)
            .arg("--region")
            .arg(&cluster.region)
            .args(["--output", "json"])
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!(program = %self.program.display(), %cluster, "running token helper");

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(AuthError::Process {
                    program: self.program.display().to_string(),
                    message: format!("no output within {}s", self.timeout.as_secs()),
                })
            }
        };

        if !output.status.success() {
            return Err(AuthError::Process {
                program: self.program.display().to_string(),
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let credential: ExecCredential = serde_json::from_slice(&output.stdout)
            .map_err(|err| AuthError::decode("aws eks get-token", err))?;
        token_from_credential(&credential)
    }
}

fn token_from_credential(credential: &ExecCredential) -> Result<BearerToken, AuthError> {
    let status = credential
        .status
        .as_ref()
        .ok_or_else(|| AuthError::decode("aws eks get-token", "no status in ExecCredential"))?;
    let now = Utc::now();
    let ttl = DateTime::parse_from_rfc3339(&status.expiration_timestamp)
        .ok()
        .and_then(|expires| (expires.with_timezone(&Utc) - now).to_std().ok())
        .unwrap_or(TOKEN_TTL);
    BearerToken::from_value(status.token.clone(), now, ttl)
}

/// checks the caller identity against STS before presigning
#[derive(Debug, Clone)]
pub struct StsVerifiedStrategy {
    signer: IdentitySigner,
    config: SdkConfig,
}

/// who STS says we are
#[derive(Debug, Clone, PartialEq, Eq)]
struct CallerIdentity {
    arn: String,
    account: String,
}

impl StsVerifiedStrategy {
    pub fn new(signer: IdentitySigner, config: SdkConfig) -> Self {
        Self { signer, config }
    }

    async fn caller_identity(&self, cluster: &ClusterRef) -> Result<CallerIdentity, AuthError> {
        let target = format!("sts.{}", cluster.region);
        let config = aws_sdk_sts::config::Builder::from(&self.config)
            .region(Region::new(cluster.region.clone()))
            .build();
        let output = aws_sdk_sts::Client::from_conf(config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|err| {
                from_sdk(&target, err, |message| AuthError::Upstream {
                    target: target.clone(),
                    status: 404,
                    message,
                })
            })?;

        match output.arn().filter(|arn| !arn.is_empty()) {
            Some(arn) => Ok(CallerIdentity {
                arn: arn.to_owned(),
                account: output.account().unwrap_or_default().to_owned(),
            }),
            None => Err(AuthError::decode(target, "GetCallerIdentity returned no Arn")),
        }
    }
}

#[async_trait]
impl MintStrategy for StsVerifiedStrategy {
    fn name(&self) -> &'static str {
        "sts-verified"
    }

    async fn mint(&self, cluster: &ClusterRef) -> Result<BearerToken, AuthError> {
        let identity = self.caller_identity(cluster).await?;
        info!(arn = %identity.arn, account = %identity.account, %cluster, "verified caller identity");
        let presigned = self.signer.sign(cluster).await?;
        Ok(BearerToken::from_presigned(&presigned))
    }
}

/// local presign, no network
#[derive(Debug, Clone)]
pub struct PresignStrategy {
    signer: IdentitySigner,
}

impl PresignStrategy {
    pub fn new(signer: IdentitySigner) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl MintStrategy for PresignStrategy {
    fn name(&self) -> &'static str {
        "presign"
    }

    async fn mint(&self, cluster: &ClusterRef) -> Result<BearerToken, AuthError> {
        let presigned = self.signer.sign(cluster).await?;
        Ok(BearerToken::from_presigned(&presigned))
    }
}
