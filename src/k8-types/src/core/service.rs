use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::Crd;
use crate::CrdNames;
use crate::Spec;
use crate::Status;

const SERVICE_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "Service",
        plural: "services",
        singular: "service",
    },
};

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSpec {
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
    #[serde(rename = "externalIPs")]
    pub external_ips: Vec<String>,
    #[serde(rename = "loadBalancerIP")]
    pub load_balancer_ip: Option<String>,
    pub r#type: String,
    pub external_name: Option<String>,
    pub ports: Vec<ServicePort>,
    pub selector: BTreeMap<String, String>,
}

impl Spec for ServiceSpec {
    type Status = ServiceStatus;

    fn metadata() -> &'static Crd {
        &SERVICE_API
    }
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicePort {
    pub name: Option<String>,
    pub protocol: Option<String>,
    pub node_port: Option<u16>,
    pub port: u16,
    pub target_port: Option<TargetPort>,
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Clone)]
#[serde(untagged)]
pub enum TargetPort {
    Number(u16),
    Name(String),
}

impl std::fmt::Display for TargetPort {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", value),
            Self::Name(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceStatus {
    pub load_balancer: LoadBalancerStatus,
}

impl Status for ServiceStatus {}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancerStatus {
    pub ingress: Vec<LoadBalancerIngress>,
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancerIngress {
    pub hostname: Option<String>,
    pub ip: Option<String>,
}

#[cfg(test)]
mod test {

    use super::ServiceSpec;
    use super::TargetPort;
    use crate::K8Obj;

    #[test]
    fn test_decode_service() {
        let service: K8Obj<ServiceSpec> = serde_json::from_str(
            r#"{
                "metadata": { "name": "web", "namespace": "shop" },
                "spec": {
                    "type": "ClusterIP",
                    "clusterIP": "10.100.0.12",
                    "ports": [ { "port": 80, "protocol": "TCP", "targetPort": "http" } ]
                }
            }"#,
        )
        .expect("decode");
        assert_eq!(service.spec.r#type, "ClusterIP");
        assert_eq!(service.spec.cluster_ip, "10.100.0.12");
        assert!(service.spec.external_ips.is_empty());
        assert_eq!(
            service.spec.ports[0].target_port,
            Some(TargetPort::Name("http".to_owned()))
        );
    }
}
