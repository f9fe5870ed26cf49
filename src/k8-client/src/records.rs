//! Flat projections of Kubernetes and EKS objects.
//!
//! Every field is always present in the output. Missing upstream values
//! become `""`, `0`, `[]` or `{}`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use k8_eks_auth::eks::EksCluster;
use k8_eks_auth::eks::EksNodegroup;
use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::namespace::NamespaceSpec;
use k8_types::core::pod::ContainerSpec;
use k8_types::core::pod::PodSpec;
use k8_types::core::service::ServicePort;
use k8_types::core::service::ServiceSpec;
use k8_types::K8List;
use k8_types::K8Obj;
use k8_types::Spec;

use crate::ClientError;

pub const UNKNOWN: &str = "UNKNOWN";
const NO_EXTERNAL_IP: &str = "None";
const NO_INSTANCE_TYPE: &str = "unknown";

pub fn decode<T>(what: &str, bytes: &[u8]) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(bytes).map_err(|err| ClientError::decode(what, err))
}

pub fn decode_list<S>(bytes: &[u8]) -> Result<K8List<S>, ClientError>
where
    S: Spec,
{
    decode(S::metadata().names.plural, bytes)
}

pub fn decode_item<S>(bytes: &[u8]) -> Result<K8Obj<S>, ClientError>
where
    S: Spec,
{
    decode(S::metadata().names.singular, bytes)
}

fn object_or_empty(value: &Value) -> Value {
    match value {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDetail {
    pub name: String,
    pub status: String,
    pub version: String,
    pub endpoint: String,
    pub created: String,
    pub role_arn: String,
    pub platform_version: String,
    pub resources_vpc_config: Value,
    pub logging: Value,
    pub identity: Value,
    pub tags: BTreeMap<String, String>,
}

impl From<&EksCluster> for ClusterDetail {
    fn from(cluster: &EksCluster) -> Self {
        Self {
            name: cluster.name.clone(),
            status: cluster.status.clone(),
            version: cluster.version.clone(),
            endpoint: cluster.endpoint.clone(),
            created: cluster.created(),
            role_arn: cluster.role_arn.clone(),
            platform_version: cluster.platform_version.clone(),
            resources_vpc_config: object_or_empty(&cluster.resources_vpc_config),
            logging: object_or_empty(&cluster.logging),
            identity: object_or_empty(&cluster.identity),
            tags: cluster.tags.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodegroupSummary {
    pub name: String,
    pub status: String,
    pub instance_type: String,
    pub capacity_type: String,
    pub desired_size: i64,
    pub min_size: i64,
    pub max_size: i64,
    pub created: String,
}

impl NodegroupSummary {
    /// placeholder for a nodegroup whose describe call failed
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: UNKNOWN.to_owned(),
            instance_type: UNKNOWN.to_owned(),
            capacity_type: UNKNOWN.to_owned(),
            desired_size: 0,
            min_size: 0,
            max_size: 0,
            created: String::new(),
        }
    }
}

impl From<&EksNodegroup> for NodegroupSummary {
    fn from(nodegroup: &EksNodegroup) -> Self {
        Self {
            name: nodegroup.nodegroup_name.clone(),
            status: nodegroup.status.clone(),
            instance_type: first_instance_type(nodegroup),
            capacity_type: nodegroup.capacity_type.clone(),
            desired_size: nodegroup.scaling_config.desired_size,
            min_size: nodegroup.scaling_config.min_size,
            max_size: nodegroup.scaling_config.max_size,
            created: nodegroup.created(),
        }
    }
}

fn first_instance_type(nodegroup: &EksNodegroup) -> String {
    nodegroup
        .instance_types
        .first()
        .cloned()
        .unwrap_or_else(|| NO_INSTANCE_TYPE.to_owned())
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScalingRecord {
    pub desired_size: i64,
    pub min_size: i64,
    pub max_size: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodegroupDetail {
    pub name: String,
    pub cluster_name: String,
    pub status: String,
    pub instance_type: String,
    pub instance_types: Vec<String>,
    pub capacity_type: String,
    pub ami_type: String,
    pub disk_size: i64,
    pub subnets: Vec<String>,
    pub scaling_config: ScalingRecord,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Value>,
    pub tags: BTreeMap<String, String>,
    pub health: Value,
    pub remote_access: Value,
    pub created: String,
    pub modified: String,
}

impl From<&EksNodegroup> for NodegroupDetail {
    fn from(nodegroup: &EksNodegroup) -> Self {
        Self {
            name: nodegroup.nodegroup_name.clone(),
            cluster_name: nodegroup.cluster_name.clone(),
            status: nodegroup.status.clone(),
            instance_type: first_instance_type(nodegroup),
            instance_types: nodegroup.instance_types.clone(),
            capacity_type: nodegroup.capacity_type.clone(),
            ami_type: nodegroup.ami_type.clone(),
            disk_size: nodegroup.disk_size,
            subnets: nodegroup.subnets.clone(),
            scaling_config: ScalingRecord {
                desired_size: nodegroup.scaling_config.desired_size,
                min_size: nodegroup.scaling_config.min_size,
                max_size: nodegroup.scaling_config.max_size,
            },
            labels: nodegroup.labels.clone(),
            taints: nodegroup.taints.clone(),
            tags: nodegroup.tags.clone(),
            health: object_or_empty(&nodegroup.health),
            remote_access: object_or_empty(&nodegroup.remote_access),
            created: nodegroup.created(),
            modified: nodegroup.modified(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRecord {
    pub name: String,
    pub status: String,
    pub created: String,
}

impl From<&K8Obj<NamespaceSpec>> for NamespaceRecord {
    fn from(namespace: &K8Obj<NamespaceSpec>) -> Self {
        Self {
            name: namespace.metadata.name.clone(),
            status: namespace.status.phase.clone(),
            created: namespace.metadata.creation_timestamp.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub status: String,
    pub node: String,
    pub ip: String,
    pub containers: usize,
}

impl From<&K8Obj<PodSpec>> for PodRecord {
    fn from(pod: &K8Obj<PodSpec>) -> Self {
        Self {
            name: pod.metadata.name.clone(),
            status: pod.status.phase.clone(),
            node: pod.spec.node_name.clone(),
            ip: pod.status.pod_ip.clone(),
            containers: pod.spec.containers.len(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ContainerRecord {
    pub name: String,
    pub image: String,
    pub ports: Vec<Value>,
    pub resources: Map<String, Value>,
}

impl From<&ContainerSpec> for ContainerRecord {
    fn from(container: &ContainerSpec) -> Self {
        Self {
            name: container.name.clone(),
            image: container.image.clone(),
            ports: container.ports.clone(),
            resources: container.resources.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodDetail {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub creation_timestamp: String,
    pub labels: BTreeMap<String, String>,
    pub node_name: String,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    #[serde(rename = "podIP")]
    pub pod_ip: String,
    pub phase: String,
    pub containers: Vec<ContainerRecord>,
}

impl From<&K8Obj<PodSpec>> for PodDetail {
    fn from(pod: &K8Obj<PodSpec>) -> Self {
        Self {
            name: pod.metadata.name.clone(),
            namespace: pod.metadata.namespace.clone(),
            uid: pod.metadata.uid.clone(),
            creation_timestamp: pod.metadata.creation_timestamp.clone(),
            labels: pod.metadata.labels.clone(),
            node_name: pod.spec.node_name.clone(),
            host_ip: pod.status.host_ip.clone(),
            pod_ip: pod.status.pod_ip.clone(),
            phase: pod.status.phase.clone(),
            containers: pod.spec.containers.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    pub available: i32,
    pub ready: i32,
    pub updated: i32,
    pub created: String,
}

impl From<&K8Obj<DeploymentSpec>> for DeploymentRecord {
    fn from(deployment: &K8Obj<DeploymentSpec>) -> Self {
        Self {
            name: deployment.metadata.name.clone(),
            namespace: deployment.metadata.namespace.clone(),
            replicas: deployment.spec.replicas,
            available: deployment.status.available_replicas,
            ready: deployment.status.ready_replicas,
            updated: deployment.status.updated_replicas,
            created: deployment.metadata.creation_timestamp.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConditionRecord {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusRecord {
    pub available_replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
    pub conditions: Vec<ConditionRecord>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetail {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub creation_timestamp: String,
    pub labels: BTreeMap<String, String>,
    pub replicas: i32,
    pub strategy: String,
    pub selector: BTreeMap<String, String>,
    pub status: DeploymentStatusRecord,
    pub containers: Vec<ContainerRecord>,
}

impl From<&K8Obj<DeploymentSpec>> for DeploymentDetail {
    fn from(deployment: &K8Obj<DeploymentSpec>) -> Self {
        let status = &deployment.status;
        Self {
            name: deployment.metadata.name.clone(),
            namespace: deployment.metadata.namespace.clone(),
            uid: deployment.metadata.uid.clone(),
            creation_timestamp: deployment.metadata.creation_timestamp.clone(),
            labels: deployment.metadata.labels.clone(),
            replicas: deployment.spec.replicas,
            strategy: deployment.spec.strategy.type_.clone(),
            selector: deployment.spec.selector.match_labels.clone(),
            status: DeploymentStatusRecord {
                available_replicas: status.available_replicas,
                ready_replicas: status.ready_replicas,
                updated_replicas: status.updated_replicas,
                conditions: status
                    .conditions
                    .iter()
                    .map(|condition| ConditionRecord {
                        type_: condition.type_.clone(),
                        status: condition.status.clone(),
                        reason: condition.reason.clone(),
                        message: condition.message.clone(),
                    })
                    .collect(),
            },
            containers: deployment
                .spec
                .template
                .spec
                .containers
                .iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortRecord {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub target_port: String,
    pub node_port: u16,
}

impl From<&ServicePort> for PortRecord {
    fn from(port: &ServicePort) -> Self {
        Self {
            name: port.name.clone().unwrap_or_default(),
            protocol: port.protocol.clone().unwrap_or_default(),
            port: port.port,
            target_port: port
                .target_port
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            node_port: port.node_port.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
    #[serde(rename = "externalIP")]
    pub external_ip: String,
    pub ports: Vec<PortRecord>,
    pub created: String,
}

impl From<&K8Obj<ServiceSpec>> for ServiceRecord {
    fn from(service: &K8Obj<ServiceSpec>) -> Self {
        Self {
            name: service.metadata.name.clone(),
            namespace: service.metadata.namespace.clone(),
            type_: service.spec.r#type.clone(),
            cluster_ip: service.spec.cluster_ip.clone(),
            external_ip: service
                .spec
                .external_ips
                .first()
                .cloned()
                .unwrap_or_else(|| NO_EXTERNAL_IP.to_owned()),
            ports: service.spec.ports.iter().map(Into::into).collect(),
            created: service.metadata.creation_timestamp.clone(),
        }
    }
}

/// project every item of a list
pub fn project<S, R>(list: &K8List<S>) -> Vec<R>
where
    S: Spec,
    R: for<'a> From<&'a K8Obj<S>>,
{
    list.items.iter().map(R::from).collect()
}
