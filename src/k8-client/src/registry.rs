//! Static catalog of gateway operations and parameter-checked dispatch.
//!
//! Discovery (`list`, `describe`) never needs credentials or a backend.
//! `dispatch` validates parameters completely before the first network
//! call.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use k8_eks_auth::ClusterRef;

use crate::envelope::Envelope;
use crate::gateway::ApiGateway;
use crate::records::{ClusterDetail, DeploymentDetail, DeploymentRecord, NamespaceRecord};
use crate::records::{NodegroupDetail, NodegroupSummary, PodDetail, PodRecord, ServiceRecord};
use crate::ClientError;

pub const CATALOG_VERSION: &str = "1";
pub const DEFAULT_TAIL: u32 = 100;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl OperationSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|param| param.name == name)
    }
}

const fn required(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::String,
        required: true,
        default: None,
        description,
    }
}

const REGION: ParamSpec = required("region", "AWS region (e.g., us-east-1)");
const CLUSTER_NAME: ParamSpec = required("cluster_name", "Name of the EKS cluster");
const NAMESPACE: ParamSpec = required("namespace", "Kubernetes namespace");
const POD_NAME: ParamSpec = required("pod_name", "Name of the pod");
const DEPLOYMENT_NAME: ParamSpec = required("deployment_name", "Name of the deployment");
const NODEGROUP_NAME: ParamSpec = required("nodegroup_name", "Name of the nodegroup");
const CONTAINER: ParamSpec = ParamSpec {
    name: "container",
    kind: ParamKind::String,
    required: false,
    default: None,
    description: "Container name, needed for pods with more than one container",
};
const TAIL: ParamSpec = ParamSpec {
    name: "tail",
    kind: ParamKind::Integer,
    required: false,
    default: Some("100"),
    description: "Number of log lines from the end of the log",
};

pub const CATALOG: &[OperationSpec] = &[
    OperationSpec {
        name: "list_clusters",
        description: "List EKS clusters in the specified region",
        params: &[REGION],
    },
    OperationSpec {
        name: "describe_cluster",
        description: "Get detailed information about an EKS cluster",
        params: &[CLUSTER_NAME, REGION],
    },
    OperationSpec {
        name: "list_nodegroups",
        description: "List nodegroups for an EKS cluster",
        params: &[CLUSTER_NAME, REGION],
    },
    OperationSpec {
        name: "describe_nodegroup",
        description: "Get detailed information about a nodegroup",
        params: &[CLUSTER_NAME, NODEGROUP_NAME, REGION],
    },
    OperationSpec {
        name: "list_namespaces",
        description: "List Kubernetes namespaces in the cluster",
        params: &[CLUSTER_NAME, REGION],
    },
    OperationSpec {
        name: "list_pods",
        description: "List pods in a namespace",
        params: &[CLUSTER_NAME, NAMESPACE, REGION],
    },
    OperationSpec {
        name: "describe_pod",
        description: "Get detailed information about a pod",
        params: &[CLUSTER_NAME, NAMESPACE, POD_NAME, REGION],
    },
    OperationSpec {
        name: "get_deployments",
        description: "List deployments in a namespace",
        params: &[CLUSTER_NAME, NAMESPACE, REGION],
    },
    OperationSpec {
        name: "describe_deployment",
        description: "Get detailed information about a deployment",
        params: &[CLUSTER_NAME, NAMESPACE, DEPLOYMENT_NAME, REGION],
    },
    OperationSpec {
        name: "get_services",
        description: "List services in a namespace",
        params: &[CLUSTER_NAME, NAMESPACE, REGION],
    },
    OperationSpec {
        name: "get_pod_logs",
        description: "Get the most recent log lines of a pod",
        params: &[CLUSTER_NAME, NAMESPACE, POD_NAME, REGION, CONTAINER, TAIL],
    },
];

/// payload of a successful operation, named after what it holds
#[derive(Serialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutput {
    Clusters(Vec<String>),
    Cluster(ClusterDetail),
    Nodegroups(Vec<NodegroupSummary>),
    Nodegroup(NodegroupDetail),
    Namespaces(Vec<NamespaceRecord>),
    Pods(Vec<PodRecord>),
    Pod(PodDetail),
    Deployments(Vec<DeploymentRecord>),
    Deployment(DeploymentDetail),
    Services(Vec<ServiceRecord>),
    Logs(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamValue {
    Text(String),
    Integer(u64),
}

/// parameters that passed validation against an `OperationSpec`
#[derive(Debug)]
pub struct Params {
    operation: &'static str,
    values: HashMap<&'static str, ParamValue>,
}

impl Params {
    /// check `raw` against `spec`, filling in defaults
    pub fn validate(spec: &OperationSpec, raw: &Map<String, Value>) -> Result<Self, ClientError> {
        let mut values = HashMap::new();
        for param in spec.params {
            let value = match raw.get(param.name) {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) if text.trim().is_empty() => None,
                Some(value) => Some(value),
            };
            let converted = match value {
                Some(value) => Self::convert(spec, param, value)?,
                None if param.required => {
                    return Err(ClientError::MissingParameter {
                        operation: spec.name.to_owned(),
                        param: param.name.to_owned(),
                    })
                }
                None => match param.default {
                    Some(default) => {
                        Self::convert(spec, param, &Value::String(default.to_owned()))?
                    }
                    None => continue,
                },
            };
            values.insert(param.name, converted);
        }

        for key in raw.keys() {
            if spec.param(key).is_none() {
                debug!(operation = spec.name, param = %key, "ignoring unknown parameter");
            }
        }

        Ok(Self {
            operation: spec.name,
            values,
        })
    }

    fn convert(spec: &OperationSpec, param: &ParamSpec, value: &Value) -> Result<ParamValue, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidParameter {
            operation: spec.name.to_owned(),
            param: param.name.to_owned(),
            reason: reason.to_owned(),
        };
        match (param.kind, value) {
            (ParamKind::String, Value::String(text)) => Ok(ParamValue::Text(text.trim().to_owned())),
            (ParamKind::String, _) => Err(invalid("expected a string")),
            (ParamKind::Integer, Value::Number(number)) => number
                .as_u64()
                .map(ParamValue::Integer)
                .ok_or_else(|| invalid("expected a non-negative integer")),
            (ParamKind::Integer, Value::String(text)) => text
                .trim()
                .parse()
                .map(ParamValue::Integer)
                .map_err(|_| invalid("expected a non-negative integer")),
            (ParamKind::Integer, _) => Err(invalid("expected a non-negative integer")),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, ClientError> {
        self.optional_text(name)
            .ok_or_else(|| ClientError::MissingParameter {
                operation: self.operation.to_owned(),
                param: name.to_owned(),
            })
    }

    pub fn optional_text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<u64> {
        match self.values.get(name) {
            Some(ParamValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn cluster(&self) -> Result<ClusterRef, ClientError> {
        Ok(ClusterRef::new(self.text("cluster_name")?, self.text("region")?))
    }

    fn tail(&self) -> Result<u32, ClientError> {
        let tail = self.integer("tail").unwrap_or(u64::from(DEFAULT_TAIL));
        u32::try_from(tail).map_err(|_| ClientError::InvalidParameter {
            operation: self.operation.to_owned(),
            param: "tail".to_owned(),
            reason: format!("{tail} is too large"),
        })
    }
}

/// binds catalog entries to gateway calls
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    gateway: Arc<ApiGateway>,
}

impl OperationRegistry {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<ApiGateway> {
        &self.gateway
    }

    /// catalog in declaration order
    pub fn list() -> &'static [OperationSpec] {
        CATALOG
    }

    pub fn describe(name: &str) -> Result<&'static OperationSpec, ClientError> {
        CATALOG
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| ClientError::UnknownOperation(name.to_owned()))
    }

    pub async fn dispatch(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<OperationOutput, ClientError> {
        let spec = Self::describe(name)?;
        let params = Params::validate(spec, params)?;
        debug!(operation = spec.name, "dispatching");

        let gateway = &self.gateway;
        let output = match spec.name {
            "list_clusters" => OperationOutput::Clusters(gateway.list_clusters(params.text("region")?).await?),
            "describe_cluster" => OperationOutput::Cluster(gateway.describe_cluster(&params.cluster()?).await?),
            "list_nodegroups" => OperationOutput::Nodegroups(gateway.list_nodegroups(&params.cluster()?).await?),
            "describe_nodegroup" => OperationOutput::Nodegroup(
                gateway
                    .describe_nodegroup(&params.cluster()?, params.text("nodegroup_name")?)
                    .await?,
            ),
            "list_namespaces" => OperationOutput::Namespaces(gateway.list_namespaces(&params.cluster()?).await?),
            "list_pods" => OperationOutput::Pods(
                gateway
                    .list_pods(&params.cluster()?, params.text("namespace")?)
                    .await?,
            ),
            "describe_pod" => OperationOutput::Pod(
                gateway
                    .describe_pod(
                        &params.cluster()?,
                        params.text("namespace")?,
                        params.text("pod_name")?,
                    )
                    .await?,
            ),
            "get_deployments" => OperationOutput::Deployments(
                gateway
                    .get_deployments(&params.cluster()?, params.text("namespace")?)
                    .await?,
            ),
            "describe_deployment" => OperationOutput::Deployment(
                gateway
                    .describe_deployment(
                        &params.cluster()?,
                        params.text("namespace")?,
                        params.text("deployment_name")?,
                    )
                    .await?,
            ),
            "get_services" => OperationOutput::Services(
                gateway
                    .get_services(&params.cluster()?, params.text("namespace")?)
                    .await?,
            ),
            "get_pod_logs" => OperationOutput::Logs(
                gateway
                    .get_pod_logs(
                        &params.cluster()?,
                        params.text("namespace")?,
                        params.text("pod_name")?,
                        params.optional_text("container"),
                        params.tail()?,
                    )
                    .await?,
            ),
            other => return Err(ClientError::UnknownOperation(other.to_owned())),
        };
        Ok(output)
    }

    /// dispatch and wrap the outcome for the boundary
    pub async fn dispatch_envelope(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Envelope<OperationOutput> {
        let result = self.dispatch(name, params).await;
        if let Err(err) = &result {
            error!(operation = name, code = %err.code(), %err, "operation failed");
        }
        let envelope: Envelope<OperationOutput> = result.into();
        let warning = envelope
            .is_success()
            .then(|| Self::target(name, params))
            .flatten()
            .and_then(|cluster| self.gateway.cluster_warning(&cluster));
        match warning {
            Some(warning) => envelope.with_warning(warning),
            None => envelope,
        }
    }

    /// cluster an operation ran against, when it names one
    fn target(name: &str, params: &Map<String, Value>) -> Option<ClusterRef> {
        let spec = Self::describe(name).ok()?;
        Params::validate(spec, params).ok()?.cluster().ok()
    }
}

#[cfg(test)]
mod test {

    use http::StatusCode;
    use serde_json::json;

    use crate::config::KubeconfigMode;
    use crate::fixture::{self, FakeDirectory, FakeTokens, FakeTransport};
    use crate::gateway::Timeouts;
    use crate::trust::{MaterializeOptions, TrustMaterializer};
    use crate::ErrorCode;

    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn registry(transport: FakeTransport) -> (OperationRegistry, Arc<FakeDirectory>, Arc<FakeTransport>) {
        let directory = Arc::new(FakeDirectory {
            clusters: vec!["a".to_owned(), "b".to_owned()],
            ..Default::default()
        });
        let transport = Arc::new(transport);
        let gateway = ApiGateway::new(
            directory.clone(),
            fixture::materializer(directory.clone(), KubeconfigMode::None),
            transport.clone(),
            Timeouts::default(),
        );
        (OperationRegistry::new(Arc::new(gateway)), directory, transport)
    }

    #[test]
    fn test_catalog_order() {
        let names: Vec<&str> = OperationRegistry::list().iter().map(|spec| spec.name).collect();
        assert_eq!(
            names,
            vec![
                "list_clusters",
                "describe_cluster",
                "list_nodegroups",
                "describe_nodegroup",
                "list_namespaces",
                "list_pods",
                "describe_pod",
                "get_deployments",
                "describe_deployment",
                "get_services",
                "get_pod_logs",
            ]
        );

        let logs = OperationRegistry::describe("get_pod_logs").expect("logs");
        let required: Vec<&str> = logs
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
            .collect();
        assert_eq!(required, vec!["cluster_name", "namespace", "pod_name", "region"]);
        assert_eq!(logs.param("tail").and_then(|tail| tail.default), Some("100"));
    }

    #[test]
    fn test_catalog_serializes() {
        let value = serde_json::to_value(OperationRegistry::describe("list_pods").expect("op")).expect("encode");
        assert_eq!(value["params"][0]["name"], "cluster_name");
        assert_eq!(value["params"][0]["kind"], "string");
        assert_eq!(value["params"][0]["required"], true);
    }

    #[test]
    fn test_describe_unknown() {
        let err = OperationRegistry::describe("delete_cluster").expect_err("unknown");
        assert_eq!(err.code(), ErrorCode::UnknownOperation);
    }

    #[test]
    fn test_validation() {
        let spec = OperationRegistry::describe("get_pod_logs").expect("op");

        let ok = Params::validate(
            spec,
            &params(json!({"cluster_name": "c", "namespace": "ns", "pod_name": "p", "region": "us-east-1"})),
        )
        .expect("valid");
        assert_eq!(ok.tail().expect("tail"), 100);
        assert_eq!(ok.optional_text("container"), None);

        let ok = Params::validate(
            spec,
            &params(json!({"cluster_name": "c", "namespace": "ns", "pod_name": "p", "region": "us-east-1", "tail": "25"})),
        )
        .expect("string tail");
        assert_eq!(ok.tail().expect("tail"), 25);

        for tail in [json!(-1), json!(1.5), json!("ten"), json!(true)] {
            let err = Params::validate(
                spec,
                &params(json!({"cluster_name": "c", "namespace": "ns", "pod_name": "p", "region": "r", "tail": tail})),
            )
            .expect_err("bad tail");
            assert_eq!(err.code(), ErrorCode::InvalidParameter);
        }

        let err = Params::validate(
            spec,
            &params(json!({"cluster_name": 7, "namespace": "ns", "pod_name": "p", "region": "r"})),
        )
        .expect_err("number name");
        assert_eq!(err.code(), ErrorCode::InvalidParameter);

        let err = Params::validate(
            spec,
            &params(json!({"cluster_name": "c", "namespace": "  ", "pod_name": "p", "region": "r"})),
        )
        .expect_err("blank namespace");
        assert!(matches!(
            err,
            ClientError::MissingParameter { ref param, .. } if param == "namespace"
        ));
    }

    #[tokio::test]
    async fn test_dispatch_list_clusters() {
        let (registry, _, _) = registry(FakeTransport::default());
        let envelope = registry
            .dispatch_envelope("list_clusters", &params(json!({"region": "us-east-1"})))
            .await;
        assert_eq!(
            serde_json::to_value(&envelope).expect("encode"),
            json!({
                "status": "success",
                "data": {"clusters": ["a", "b"]},
                "error": null,
                "error_code": null
            })
        );
    }

    #[tokio::test]
    async fn test_missing_parameter_makes_no_calls() {
        let (registry, directory, transport) = registry(FakeTransport::default());
        let err = registry
            .dispatch("list_pods", &params(json!({"cluster_name": "a", "region": "us-east-1"})))
            .await
            .expect_err("missing namespace");
        assert!(matches!(
            err,
            ClientError::MissingParameter { ref operation, ref param } if operation == "list_pods" && param == "namespace"
        ));
        assert_eq!(directory.calls(), 0);
        assert!(transport.requests().is_empty());
        assert_eq!(registry.gateway().trust().cached_clusters(), 0);
    }

    #[tokio::test]
    async fn test_pod_logs_not_found() {
        let (registry, _, transport) = registry(FakeTransport::default());
        let envelope = registry
            .dispatch_envelope(
                "get_pod_logs",
                &params(json!({"cluster_name": "a", "namespace": "ns", "pod_name": "p", "region": "us-east-1", "tail": 10})),
            )
            .await;
        assert!(!envelope.is_success());
        assert_eq!(envelope.error_code, Some(ErrorCode::ResourceNotFound));
        assert_eq!(
            transport.requests()[0].0,
            "/api/v1/namespaces/ns/pods/p/log?tailLines=10"
        );
    }

    #[tokio::test]
    async fn test_inactive_cluster_is_reported() {
        let directory = Arc::new(FakeDirectory {
            clusters: vec!["a".to_owned()],
            status: Some("UPDATING".to_owned()),
            ..Default::default()
        });
        let trust = TrustMaterializer::new(
            directory.clone(),
            Arc::new(FakeTokens::default()),
            MaterializeOptions {
                allow_inactive: true,
                ..Default::default()
            },
        );
        let transport = Arc::new(FakeTransport::default().with(
            "/api/v1/namespaces/ns/services",
            StatusCode::OK,
            r#"{"items":[]}"#,
        ));
        let registry = OperationRegistry::new(Arc::new(ApiGateway::new(
            directory,
            trust,
            transport,
            Timeouts::default(),
        )));

        let envelope = registry
            .dispatch_envelope(
                "get_services",
                &params(json!({"cluster_name": "a", "namespace": "ns", "region": "us-east-1"})),
            )
            .await;
        assert!(envelope.is_success());
        assert_eq!(envelope.warnings, vec!["cluster a (us-east-1) is UPDATING, not ACTIVE".to_owned()]);

        let clusters = registry
            .dispatch_envelope("list_clusters", &params(json!({"region": "us-east-1"})))
            .await;
        assert!(clusters.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_escaping_pod_name_makes_no_calls() {
        let (registry, directory, transport) = registry(FakeTransport::default());
        let envelope = registry
            .dispatch_envelope(
                "get_pod_logs",
                &params(json!({"cluster_name": "a", "namespace": "ns", "pod_name": "../secrets?x=", "region": "us-east-1"})),
            )
            .await;
        assert_eq!(envelope.error_code, Some(ErrorCode::InvalidParameter));
        assert!(transport.requests().is_empty());
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_pods() {
        let (registry, _, _) = registry(FakeTransport::default().with(
            "/api/v1/namespaces/ns/pods",
            StatusCode::OK,
            r#"{"items":[{"metadata":{"name":"web-0"},"spec":{"containers":[{"name":"web"}]},"status":{"phase":"Running"}}]}"#,
        ));
        let output = registry
            .dispatch(
                "list_pods",
                &params(json!({"cluster_name": "a", "namespace": "ns", "region": "us-east-1"})),
            )
            .await
            .expect("pods");
        assert_eq!(
            serde_json::to_value(&output).expect("encode"),
            json!({"pods": [{"name": "web-0", "status": "Running", "node": "", "ip": "", "containers": 1}]})
        );
    }
}
