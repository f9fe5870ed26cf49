use std::fmt::Debug;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use http::header::ACCEPT;
use http::header::AUTHORIZATION;
use http::StatusCode;
use reqwest::Certificate;
use tokio::process::Command;
use tracing::debug;
use tracing::trace;

use k8_eks_auth::ClusterRef;
use k8_types::MetaStatus;

use crate::trust::TrustBundle;
use crate::ClientError;

/// what the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Text,
}

impl ResponseKind {
    fn accept(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain",
        }
    }
}

/// read-only access to the Kubernetes API of one cluster
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// GET `path` (path and query, no host) and return the raw body
    async fn get(
        &self,
        bundle: &TrustBundle,
        path: &str,
        kind: ResponseKind,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError>;
}

/// direct HTTPS to the API server
#[derive(Debug, Clone, Default)]
pub struct HttpsTransport {}

impl HttpsTransport {
    pub fn new() -> Self {
        Self {}
    }

    fn client(bundle: &TrustBundle, timeout: Duration) -> Result<reqwest::Client, ClientError> {
        let pem = std::fs::read(bundle.ca_file())?;
        let ca = Certificate::from_pem(&pem)
            .map_err(|err| ClientError::decode("cluster certificate authority", err))?;
        reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(ca)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| ClientError::Configuration(format!("https client: {err}")))
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    fn name(&self) -> &'static str {
        "https"
    }

    async fn get(
        &self,
        bundle: &TrustBundle,
        path: &str,
        kind: ResponseKind,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let client = Self::client(bundle, timeout)?;
        let uri = format!("{}{}", bundle.endpoint().host(), path);
        debug!(cluster = %bundle.cluster(), %uri, "GET");

        let response = client
            .get(&uri)
            .header(AUTHORIZATION, format!("Bearer {}", bundle.token().value()))
            .header(ACCEPT, kind.accept())
            .send()
            .await
            .map_err(|err| upstream(bundle.cluster(), path, err))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| upstream(bundle.cluster(), path, err))?;

        if status.is_success() {
            trace!(%status, len = body.len(), "response received");
            Ok(body.to_vec())
        } else {
            trace!(%status, "error response received");
            Err(map_status(bundle.cluster(), path, status, &body))
        }
    }
}

fn upstream(cluster: &ClusterRef, path: &str, err: impl ToString) -> ClientError {
    ClientError::UpstreamError {
        cluster: cluster.clone(),
        path: path.to_owned(),
        message: err.to_string(),
    }
}

/// map a non-success API server response, using the `Status` body when present
pub(crate) fn map_status(
    cluster: &ClusterRef,
    path: &str,
    status: StatusCode,
    body: &[u8],
) -> ClientError {
    let message = match serde_json::from_slice::<MetaStatus>(body) {
        Ok(api_status) if !api_status.message.is_empty() => api_status.to_string(),
        _ => format!("{}: {}", status, String::from_utf8_lossy(body).trim()),
    };
    let cluster = cluster.clone();
    let path = path.to_owned();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::UpstreamUnauthorized {
            cluster,
            path,
            message,
        },
        StatusCode::NOT_FOUND => ClientError::ResourceNotFound {
            cluster,
            path,
            message,
        },
        _ => ClientError::UpstreamError {
            cluster,
            path,
            message,
        },
    }
}

/// `kubectl get --raw` against the bundle's kubeconfig
#[derive(Debug, Clone)]
pub struct KubectlTransport {
    program: PathBuf,
    process_timeout: Duration,
}

impl KubectlTransport {
    pub fn new(program: impl Into<PathBuf>, process_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            process_timeout,
        }
    }
}

#[async_trait]
impl Transport for KubectlTransport {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    async fn get(
        &self,
        bundle: &TrustBundle,
        path: &str,
        _kind: ResponseKind,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let kubeconfig = bundle.kubeconfig().ok_or_else(|| {
            ClientError::Configuration(format!(
                "no kubeconfig materialized for {}, kubectl transport needs one",
                bundle.cluster()
            ))
        })?;

        let mut command = Command::new(&self.program);
        command
            .args(["get", "--raw", path])
            .env("KUBECONFIG", kubeconfig)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!(cluster = %bundle.cluster(), program = %self.program.display(), path, "kubectl get --raw");

        // log tailing may need longer than process startup allows
        let timeout = timeout.max(self.process_timeout);
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClientError::Configuration(format!(
                    "kubectl not found at {}",
                    self.program.display()
                )))
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                return Err(upstream(
                    bundle.cluster(),
                    path,
                    format!("kubectl gave no answer within {}s", timeout.as_secs()),
                ))
            }
        };

        if output.status.success() {
            trace!(len = output.stdout.len(), "kubectl output received");
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(map_stderr(bundle.cluster(), path, stderr.trim()))
        }
    }
}

/// kubectl reports the API status reason in its error text
pub(crate) fn map_stderr(cluster: &ClusterRef, path: &str, stderr: &str) -> ClientError {
    let cluster = cluster.clone();
    let path = path.to_owned();
    let message = if stderr.is_empty() {
        "kubectl failed without output".to_owned()
    } else {
        stderr.to_owned()
    };
    if stderr.contains("NotFound") {
        ClientError::ResourceNotFound {
            cluster,
            path,
            message,
        }
    } else if stderr.contains("Unauthorized") || stderr.contains("Forbidden") {
        ClientError::UpstreamUnauthorized {
            cluster,
            path,
            message,
        }
    } else {
        ClientError::UpstreamError {
            cluster,
            path,
            message,
        }
    }
}
