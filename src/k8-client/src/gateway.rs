use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use k8_eks_auth::{shared_config, ClusterDirectory, ClusterRef, CredentialsProvider};
use k8_eks_auth::{EksClient, SdkProvider, TokenMinter};
use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::namespace::NamespaceSpec;
use k8_types::core::pod::PodSpec;
use k8_types::core::service::ServiceSpec;

use crate::config::{GatewayConfig, TransportKind};
use crate::envelope::Envelope;
use crate::records::{self, decode_item, decode_list};
use crate::records::{ClusterDetail, DeploymentDetail, DeploymentRecord, NamespaceRecord};
use crate::records::{NodegroupDetail, NodegroupSummary, PodDetail, PodRecord, ServiceRecord};
use crate::transport::{HttpsTransport, KubectlTransport, ResponseKind, Transport};
use crate::trust::{MaterializeOptions, TrustMaterializer};
use crate::uri::{check_label, item_uri, items_uri, LogOptions, NameSpace};
use crate::ClientError;

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub control_plane: Duration,
    pub logs: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            control_plane: Duration::from_secs(5),
            logs: Duration::from_secs(30),
        }
    }
}

/// cluster summary with each follow-up section reported on its own
#[derive(Serialize, Debug)]
pub struct ClusterOverview {
    pub cluster: ClusterDetail,
    pub nodegroups: Envelope<Vec<NodegroupSummary>>,
    pub namespaces: Envelope<Vec<NamespaceRecord>>,
}

/// read-only view of EKS clusters and their Kubernetes resources
pub struct ApiGateway {
    directory: Arc<dyn ClusterDirectory>,
    trust: TrustMaterializer,
    transport: Arc<dyn Transport>,
    timeouts: Timeouts,
}

impl ApiGateway {
    pub fn new(
        directory: Arc<dyn ClusterDirectory>,
        trust: TrustMaterializer,
        transport: Arc<dyn Transport>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            directory,
            trust,
            transport,
            timeouts,
        }
    }

    /// AWS SDK configuration, EKS client, standard token minter and the configured transport
    pub async fn from_config(config: &GatewayConfig) -> Self {
        let sdk = shared_config(None, config.control_plane_timeout()).await;
        let credentials: Arc<dyn CredentialsProvider> = Arc::new(SdkProvider::from_config(&sdk));
        let directory: Arc<dyn ClusterDirectory> = Arc::new(EksClient::new(sdk.clone()));
        let minter = TokenMinter::standard(
            config.aws_cli_path.clone(),
            config.process_timeout(),
            &sdk,
            credentials,
        );
        let trust = TrustMaterializer::new(
            directory.clone(),
            Arc::new(minter),
            MaterializeOptions {
                ttl: config.bundle_ttl(),
                kubeconfig: config.kubeconfig_mode(),
                exec_command: config.exec_command(),
                scratch_dir: config.scratch_dir.clone(),
                allow_inactive: config.allow_inactive_clusters,
            },
        );
        let transport: Arc<dyn Transport> = match config.transport {
            TransportKind::Https => Arc::new(HttpsTransport::new()),
            TransportKind::Kubectl => Arc::new(KubectlTransport::new(
                config.kubectl_path.clone(),
                config.process_timeout(),
            )),
        };
        debug!(transport = transport.name(), ttl = ?config.bundle_ttl(), "gateway configured");

        Self::new(
            directory,
            trust,
            transport,
            Timeouts {
                control_plane: config.control_plane_timeout(),
                logs: config.log_timeout(),
            },
        )
    }

    pub fn trust(&self) -> &TrustMaterializer {
        &self.trust
    }

    /// notice for a cluster last reached while not ACTIVE
    pub fn cluster_warning(&self, cluster: &ClusterRef) -> Option<String> {
        self.trust
            .inactive_status(cluster)
            .map(|status| format!("cluster {cluster} is {status}, not ACTIVE"))
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn fetch(
        &self,
        cluster: &ClusterRef,
        path: &str,
        kind: ResponseKind,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let bundle = self.trust.get_or_create(cluster).await?;
        debug!(%cluster, path, transport = self.transport.name(), "kubernetes request");
        self.transport.get(&bundle, path, kind, timeout).await
    }

    async fn fetch_json(&self, cluster: &ClusterRef, path: &str) -> Result<Vec<u8>, ClientError> {
        self.fetch(cluster, path, ResponseKind::Json, self.timeouts.control_plane)
            .await
    }

    pub async fn list_clusters(&self, region: &str) -> Result<Vec<String>, ClientError> {
        Ok(self.directory.list_clusters(region).await?)
    }

    pub async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<ClusterDetail, ClientError> {
        let description = self.directory.describe_cluster(cluster).await?;
        Ok(ClusterDetail::from(&description))
    }

    /// every nodegroup is listed, one whose describe fails shows as `UNKNOWN`
    pub async fn list_nodegroups(
        &self,
        cluster: &ClusterRef,
    ) -> Result<Vec<NodegroupSummary>, ClientError> {
        let names = self.directory.list_nodegroups(cluster).await?;
        let mut nodegroups = Vec::with_capacity(names.len());
        for name in names {
            match self.directory.describe_nodegroup(cluster, &name).await {
                Ok(nodegroup) => nodegroups.push(NodegroupSummary::from(&nodegroup)),
                Err(err) => {
                    warn!(%cluster, nodegroup = %name, %err, "unable to describe nodegroup");
                    nodegroups.push(NodegroupSummary::unknown(name));
                }
            }
        }
        Ok(nodegroups)
    }

    pub async fn describe_nodegroup(
        &self,
        cluster: &ClusterRef,
        nodegroup: &str,
    ) -> Result<NodegroupDetail, ClientError> {
        let description = self.directory.describe_nodegroup(cluster, nodegroup).await?;
        Ok(NodegroupDetail::from(&description))
    }

    pub async fn list_namespaces(
        &self,
        cluster: &ClusterRef,
    ) -> Result<Vec<NamespaceRecord>, ClientError> {
        let path = items_uri::<NamespaceSpec>(&NameSpace::All)?;
        let body = self.fetch_json(cluster, &path).await?;
        Ok(records::project(&decode_list::<NamespaceSpec>(&body)?))
    }

    pub async fn list_pods(
        &self,
        cluster: &ClusterRef,
        namespace: &str,
    ) -> Result<Vec<PodRecord>, ClientError> {
        let path = items_uri::<PodSpec>(&namespace.into())?;
        let body = self.fetch_json(cluster, &path).await?;
        Ok(records::project(&decode_list::<PodSpec>(&body)?))
    }

    pub async fn describe_pod(
        &self,
        cluster: &ClusterRef,
        namespace: &str,
        pod: &str,
    ) -> Result<PodDetail, ClientError> {
        let path = item_uri::<PodSpec, ()>(pod, namespace, None, None)?;
        let body = self.fetch_json(cluster, &path).await?;
        Ok(PodDetail::from(&decode_item::<PodSpec>(&body)?))
    }

    pub async fn get_deployments(
        &self,
        cluster: &ClusterRef,
        namespace: &str,
    ) -> Result<Vec<DeploymentRecord>, ClientError> {
        let path = items_uri::<DeploymentSpec>(&namespace.into())?;
        let body = self.fetch_json(cluster, &path).await?;
        Ok(records::project(&decode_list::<DeploymentSpec>(&body)?))
    }

    pub async fn describe_deployment(
        &self,
        cluster: &ClusterRef,
        namespace: &str,
        deployment: &str,
    ) -> Result<DeploymentDetail, ClientError> {
        let path = item_uri::<DeploymentSpec, ()>(deployment, namespace, None, None)?;
        let body = self.fetch_json(cluster, &path).await?;
        Ok(DeploymentDetail::from(&decode_item::<DeploymentSpec>(&body)?))
    }

    pub async fn get_services(
        &self,
        cluster: &ClusterRef,
        namespace: &str,
    ) -> Result<Vec<ServiceRecord>, ClientError> {
        let path = items_uri::<ServiceSpec>(&namespace.into())?;
        let body = self.fetch_json(cluster, &path).await?;
        Ok(records::project(&decode_list::<ServiceSpec>(&body)?))
    }

    /// last `tail` lines of a pod's log as plain text
    pub async fn get_pod_logs(
        &self,
        cluster: &ClusterRef,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail: u32,
    ) -> Result<String, ClientError> {
        if let Some(container) = container {
            check_label("container", container)?;
        }
        let options = LogOptions {
            container: container.map(str::to_owned),
            tail_lines: Some(tail),
        };
        let path = item_uri::<PodSpec, _>(pod, namespace, Some("/log"), Some(&options))?;
        let body = self
            .fetch(cluster, &path, ResponseKind::Text, self.timeouts.logs)
            .await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// describe the cluster, then its nodegroups and namespaces
    ///
    /// Only the cluster description is required; nodegroup and namespace
    /// failures are reported inside their own sections.
    pub async fn cluster_overview(
        &self,
        cluster: &ClusterRef,
    ) -> Result<ClusterOverview, ClientError> {
        let detail = self.describe_cluster(cluster).await?;
        let nodegroups = self.list_nodegroups(cluster).await;
        let namespaces = self.list_namespaces(cluster).await;
        Ok(ClusterOverview {
            cluster: detail,
            nodegroups: nodegroups.into(),
            namespaces: namespaces.into(),
        })
    }
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("transport", &self.transport.name())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
