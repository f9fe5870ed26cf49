//! In-process fakes for the control plane, token minting and transports.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::StatusCode;

use k8_eks_auth::eks::{CertificateAuthority, EksCluster, EksNodegroup, ScalingConfig};
use k8_eks_auth::token::TOKEN_TTL;
use k8_eks_auth::{AuthError, BearerToken, ClusterDirectory, ClusterEndpoint, ClusterRef, TokenSource};

use crate::config::KubeconfigMode;
use crate::transport::{map_status, ResponseKind, Transport};
use crate::trust::{MaterializeOptions, TrustBundle, TrustMaterializer};
use crate::ClientError;

pub const CA_B64: &str = "LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t";

#[derive(Default)]
pub struct FakeDirectory {
    pub clusters: Vec<String>,
    pub nodegroups: Vec<String>,
    /// nodegroups whose describe call fails
    pub broken_nodegroups: Vec<String>,
    /// cluster status, `ACTIVE` when unset
    pub status: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterDirectory for FakeDirectory {
    async fn list_clusters(&self, _region: &str) -> Result<Vec<String>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.clusters.clone())
    }

    async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<EksCluster, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.clusters.contains(&cluster.name) {
            return Err(AuthError::ClusterNotFound(cluster.clone()));
        }
        Ok(EksCluster {
            name: cluster.name.clone(),
            status: self.status.clone().unwrap_or_else(|| "ACTIVE".to_owned()),
            version: "1.29".to_owned(),
            endpoint: "https://api.example".to_owned(),
            certificate_authority: CertificateAuthority {
                data: CA_B64.to_owned(),
            },
            ..Default::default()
        })
    }

    async fn list_nodegroups(&self, _cluster: &ClusterRef) -> Result<Vec<String>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.nodegroups.clone())
    }

    async fn describe_nodegroup(
        &self,
        cluster: &ClusterRef,
        nodegroup: &str,
    ) -> Result<EksNodegroup, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_nodegroups.iter().any(|name| name == nodegroup) {
            return Err(AuthError::Upstream {
                target: format!("eks.{}", cluster.region),
                status: 500,
                message: "internal failure".to_owned(),
            });
        }
        if !self.nodegroups.iter().any(|name| name == nodegroup) {
            return Err(AuthError::NodegroupNotFound {
                cluster: cluster.clone(),
                nodegroup: nodegroup.to_owned(),
            });
        }
        Ok(EksNodegroup {
            nodegroup_name: nodegroup.to_owned(),
            cluster_name: cluster.name.clone(),
            status: "ACTIVE".to_owned(),
            capacity_type: "ON_DEMAND".to_owned(),
            instance_types: vec!["m5.large".to_owned()],
            scaling_config: ScalingConfig {
                min_size: 1,
                max_size: 4,
                desired_size: 2,
            },
            ..Default::default()
        })
    }
}

#[derive(Default)]
pub struct FakeTokens {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn token(&self, _cluster: &ClusterRef) -> Result<BearerToken, AuthError> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst);
        BearerToken::from_value(format!("k8s-aws-v1.dG9rZW4{count}"), Utc::now(), TOKEN_TTL)
    }
}

/// canned responses keyed by request path
#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: HashMap<String, (StatusCode, Vec<u8>)>,
    requests: Mutex<Vec<(String, ResponseKind)>>,
}

impl FakeTransport {
    pub fn with(mut self, path: &str, status: StatusCode, body: &str) -> Self {
        self.responses
            .insert(path.to_owned(), (status, body.as_bytes().to_vec()));
        self
    }

    pub fn requests(&self) -> Vec<(String, ResponseKind)> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get(
        &self,
        bundle: &TrustBundle,
        path: &str,
        kind: ResponseKind,
        _timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((path.to_owned(), kind));
        }
        match self.responses.get(path) {
            Some((status, body)) if status.is_success() => Ok(body.clone()),
            Some((status, body)) => Err(map_status(bundle.cluster(), path, *status, body)),
            None => Err(map_status(bundle.cluster(), path, StatusCode::NOT_FOUND, b"")),
        }
    }
}

pub fn materializer(directory: Arc<FakeDirectory>, kubeconfig: KubeconfigMode) -> TrustMaterializer {
    TrustMaterializer::new(
        directory,
        Arc::new(FakeTokens::default()),
        MaterializeOptions {
            kubeconfig,
            ..Default::default()
        },
    )
}

/// a materialized bundle for `prod` in us-east-1
pub fn bundle(kubeconfig: KubeconfigMode) -> TrustBundle {
    let token = BearerToken::from_value("k8s-aws-v1.dG9rZW4", Utc::now(), TOKEN_TTL).expect("token");
    materializer(Arc::new(FakeDirectory::default()), kubeconfig)
        .materialize(
            &ClusterRef::new("prod", "us-east-1"),
            ClusterEndpoint::new("https://api.example", CA_B64),
            token,
        )
        .expect("bundle")
}
