//! EKS control plane: cluster and nodegroup reads.

use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::Region;
use aws_config::SdkConfig;
use aws_sdk_eks::primitives::DateTime as AwsDateTime;
use aws_sdk_eks::types::Cluster;
use aws_sdk_eks::types::Nodegroup;
use aws_sdk_eks::Client;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

use crate::error::from_sdk;
use crate::AuthError;
use crate::ClusterEndpoint;
use crate::ClusterRef;

pub const ACTIVE: &str = "ACTIVE";

const PAGE_SIZE: i32 = 100;

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EksCluster {
    pub name: String,
    pub arn: String,
    pub created_at: Option<Value>,
    pub version: String,
    pub endpoint: String,
    pub role_arn: String,
    pub resources_vpc_config: Value,
    pub kubernetes_network_config: Value,
    pub logging: Value,
    pub identity: Value,
    pub status: String,
    pub certificate_authority: CertificateAuthority,
    pub platform_version: String,
    pub tags: BTreeMap<String, String>,
}

impl EksCluster {
    pub fn created(&self) -> String {
        timestamp_to_rfc3339(self.created_at.as_ref())
    }

    pub fn is_active(&self) -> bool {
        self.status == ACTIVE
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CertificateAuthority {
    pub data: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EksNodegroup {
    pub nodegroup_name: String,
    pub nodegroup_arn: String,
    pub cluster_name: String,
    pub version: String,
    pub release_version: String,
    pub created_at: Option<Value>,
    pub modified_at: Option<Value>,
    pub status: String,
    pub capacity_type: String,
    pub scaling_config: ScalingConfig,
    pub instance_types: Vec<String>,
    pub subnets: Vec<String>,
    pub remote_access: Value,
    pub ami_type: String,
    pub node_role: String,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Value>,
    pub disk_size: i64,
    pub health: Value,
    pub tags: BTreeMap<String, String>,
}

impl EksNodegroup {
    pub fn created(&self) -> String {
        timestamp_to_rfc3339(self.created_at.as_ref())
    }

    pub fn modified(&self) -> String {
        timestamp_to_rfc3339(self.modified_at.as_ref())
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScalingConfig {
    pub min_size: i64,
    pub max_size: i64,
    pub desired_size: i64,
}

/// EKS timestamps arrive as epoch seconds; strings pass through
pub fn timestamp_to_rfc3339(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(number)) => number
            .as_f64()
            .and_then(|secs| {
                DateTime::<Utc>::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
            })
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default(),
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}

fn epoch(time: Option<&AwsDateTime>) -> Option<Value> {
    time.map(|time| Value::from(time.secs()))
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_owned()
}

fn sorted(map: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    map.map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

impl From<&Cluster> for EksCluster {
    fn from(cluster: &Cluster) -> Self {
        let resources_vpc_config = cluster
            .resources_vpc_config()
            .map(|vpc| {
                json!({
                    "subnetIds": vpc.subnet_ids(),
                    "securityGroupIds": vpc.security_group_ids(),
                    "clusterSecurityGroupId": vpc.cluster_security_group_id(),
                    "vpcId": vpc.vpc_id(),
                    "endpointPublicAccess": vpc.endpoint_public_access(),
                    "endpointPrivateAccess": vpc.endpoint_private_access(),
                    "publicAccessCidrs": vpc.public_access_cidrs(),
                })
            })
            .unwrap_or_default();
        let kubernetes_network_config = cluster
            .kubernetes_network_config()
            .map(|network| {
                json!({
                    "serviceIpv4Cidr": network.service_ipv4_cidr(),
                    "serviceIpv6Cidr": network.service_ipv6_cidr(),
                    "ipFamily": network.ip_family().map(|family| family.as_str()),
                })
            })
            .unwrap_or_default();
        let logging = cluster
            .logging()
            .map(|logging| {
                let setups: Vec<Value> = logging
                    .cluster_logging()
                    .iter()
                    .map(|setup| {
                        json!({
                            "types": setup.types().iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                            "enabled": setup.enabled(),
                        })
                    })
                    .collect();
                json!({ "clusterLogging": setups })
            })
            .unwrap_or_default();
        let identity = cluster
            .identity()
            .map(|identity| {
                json!({ "oidc": { "issuer": identity.oidc().and_then(|oidc| oidc.issuer()) } })
            })
            .unwrap_or_default();

        Self {
            name: text(cluster.name()),
            arn: text(cluster.arn()),
            created_at: epoch(cluster.created_at()),
            version: text(cluster.version()),
            endpoint: text(cluster.endpoint()),
            role_arn: text(cluster.role_arn()),
            resources_vpc_config,
            kubernetes_network_config,
            logging,
            identity,
            status: text(cluster.status().map(|status| status.as_str())),
            certificate_authority: CertificateAuthority {
                data: text(cluster.certificate_authority().and_then(|ca| ca.data())),
            },
            platform_version: text(cluster.platform_version()),
            tags: sorted(cluster.tags()),
        }
    }
}

impl From<&Nodegroup> for EksNodegroup {
    fn from(nodegroup: &Nodegroup) -> Self {
        let scaling = nodegroup.scaling_config();
        let size = |value: Option<i32>| i64::from(value.unwrap_or_default());
        let remote_access = nodegroup
            .remote_access()
            .map(|access| {
                json!({
                    "ec2SshKey": access.ec2_ssh_key(),
                    "sourceSecurityGroups": access.source_security_groups(),
                })
            })
            .unwrap_or_default();
        let health = nodegroup
            .health()
            .map(|health| {
                let issues: Vec<Value> = health
                    .issues()
                    .iter()
                    .map(|issue| {
                        json!({
                            "code": issue.code().map(|code| code.as_str()),
                            "message": issue.message(),
                            "resourceIds": issue.resource_ids(),
                        })
                    })
                    .collect();
                json!({ "issues": issues })
            })
            .unwrap_or_default();
        let taints = nodegroup
            .taints()
            .iter()
            .map(|taint| {
                json!({
                    "key": taint.key(),
                    "value": taint.value(),
                    "effect": taint.effect().map(|effect| effect.as_str()),
                })
            })
            .collect();

        Self {
            nodegroup_name: text(nodegroup.nodegroup_name()),
            nodegroup_arn: text(nodegroup.nodegroup_arn()),
            cluster_name: text(nodegroup.cluster_name()),
            version: text(nodegroup.version()),
            release_version: text(nodegroup.release_version()),
            created_at: epoch(nodegroup.created_at()),
            modified_at: epoch(nodegroup.modified_at()),
            status: text(nodegroup.status().map(|status| status.as_str())),
            capacity_type: text(nodegroup.capacity_type().map(|capacity| capacity.as_str())),
            scaling_config: ScalingConfig {
                min_size: size(scaling.and_then(|config| config.min_size())),
                max_size: size(scaling.and_then(|config| config.max_size())),
                desired_size: size(scaling.and_then(|config| config.desired_size())),
            },
            instance_types: nodegroup.instance_types().to_vec(),
            subnets: nodegroup.subnets().to_vec(),
            remote_access,
            ami_type: text(nodegroup.ami_type().map(|ami| ami.as_str())),
            node_role: text(nodegroup.node_role()),
            labels: sorted(nodegroup.labels()),
            taints,
            disk_size: i64::from(nodegroup.disk_size().unwrap_or_default()),
            health,
            tags: sorted(nodegroup.tags()),
        }
    }
}

/// cluster discovery against the cloud control plane
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    async fn list_clusters(&self, region: &str) -> Result<Vec<String>, AuthError>;

    async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<EksCluster, AuthError>;

    async fn list_nodegroups(&self, cluster: &ClusterRef) -> Result<Vec<String>, AuthError>;

    async fn describe_nodegroup(
        &self,
        cluster: &ClusterRef,
        nodegroup: &str,
    ) -> Result<EksNodegroup, AuthError>;

    /// endpoint and CA of an ACTIVE cluster
    ///
    /// A cluster in any other state fails with `ClusterNotActive`, which
    /// still carries whatever endpoint EKS reported.
    async fn resolve(&self, cluster: &ClusterRef) -> Result<ClusterEndpoint, AuthError> {
        let description = self.describe_cluster(cluster).await?;
        let endpoint = ClusterEndpoint::new(
            description.endpoint.clone(),
            description.certificate_authority.data.clone(),
        );

        if !description.is_active() {
            return Err(AuthError::ClusterNotActive {
                cluster: cluster.clone(),
                status: description.status,
                endpoint: Box::new(endpoint),
            });
        }
        if endpoint.api_server_url.is_empty() || endpoint.ca_certificate_b64.is_empty() {
            return Err(AuthError::decode(
                cluster.to_string(),
                "cluster has no endpoint or certificate authority",
            ));
        }
        debug!(%cluster, endpoint = %endpoint.api_server_url, "resolved cluster");
        Ok(endpoint)
    }
}

/// EKS client over the AWS SDK, one regional client per call
#[derive(Debug, Clone)]
pub struct EksClient {
    config: SdkConfig,
}

impl EksClient {
    pub fn new(config: SdkConfig) -> Self {
        Self { config }
    }

    fn client(&self, region: &str) -> Client {
        let config = aws_sdk_eks::config::Builder::from(&self.config)
            .region(Region::new(region.to_owned()))
            .build();
        Client::from_conf(config)
    }
}

fn target(region: &str) -> String {
    format!("eks.{region}")
}

#[async_trait]
impl ClusterDirectory for EksClient {
    async fn list_clusters(&self, region: &str) -> Result<Vec<String>, AuthError> {
        let client = self.client(region);
        let mut clusters = vec![];
        let mut next_token: Option<String> = None;
        loop {
            let page = client
                .list_clusters()
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| {
                    from_sdk(&target(region), err, |message| AuthError::Upstream {
                        target: target(region),
                        status: 404,
                        message,
                    })
                })?;
            clusters.extend(page.clusters().iter().cloned());
            match page.next_token().filter(|token| !token.is_empty()) {
                Some(token) => next_token = Some(token.to_owned()),
                None => break,
            }
        }
        debug!(region, count = clusters.len(), "listed clusters");
        Ok(clusters)
    }

    async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<EksCluster, AuthError> {
        trace!(%cluster, "describe cluster");
        let output = self
            .client(&cluster.region)
            .describe_cluster()
            .name(&cluster.name)
            .send()
            .await
            .map_err(|err| {
                from_sdk(&target(&cluster.region), err, |_| {
                    AuthError::ClusterNotFound(cluster.clone())
                })
            })?;
        output
            .cluster()
            .map(EksCluster::from)
            .ok_or_else(|| AuthError::decode(target(&cluster.region), "DescribeCluster returned no cluster"))
    }

    async fn list_nodegroups(&self, cluster: &ClusterRef) -> Result<Vec<String>, AuthError> {
        let client = self.client(&cluster.region);
        let mut nodegroups = vec![];
        let mut next_token: Option<String> = None;
        loop {
            let page = client
                .list_nodegroups()
                .cluster_name(&cluster.name)
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| {
                    from_sdk(&target(&cluster.region), err, |_| {
                        AuthError::ClusterNotFound(cluster.clone())
                    })
                })?;
            nodegroups.extend(page.nodegroups().iter().cloned());
            match page.next_token().filter(|token| !token.is_empty()) {
                Some(token) => next_token = Some(token.to_owned()),
                None => break,
            }
        }
        Ok(nodegroups)
    }

    async fn describe_nodegroup(
        &self,
        cluster: &ClusterRef,
        nodegroup: &str,
    ) -> Result<EksNodegroup, AuthError> {
        let output = self
            .client(&cluster.region)
            .describe_nodegroup()
            .cluster_name(&cluster.name)
            .nodegroup_name(nodegroup)
            .send()
            .await
            .map_err(|err| {
                from_sdk(&target(&cluster.region), err, |message| {
                    missing_nodegroup(cluster, nodegroup, &message)
                })
            })?;
        output
            .nodegroup()
            .map(EksNodegroup::from)
            .ok_or_else(|| AuthError::decode(target(&cluster.region), "DescribeNodegroup returned no nodegroup"))
    }
}

/// EKS reports a missing cluster and a missing nodegroup with the same exception
fn missing_nodegroup(cluster: &ClusterRef, nodegroup: &str, message: &str) -> AuthError {
    if message.to_lowercase().contains("no cluster found") {
        AuthError::ClusterNotFound(cluster.clone())
    } else {
        AuthError::NodegroupNotFound {
            cluster: cluster.clone(),
            nodegroup: nodegroup.to_owned(),
        }
    }
}
