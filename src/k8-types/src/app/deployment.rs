use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as DynamicObject;

use crate::core::pod::PodSpec;
use crate::{Crd, CrdNames, LabelSelector, Spec, Status, TemplateSpec};

const DEPLOYMENT_API: Crd = Crd {
    group: "apps",
    version: "v1",
    names: CrdNames {
        kind: "Deployment",
        plural: "deployments",
        singular: "deployment",
    },
};

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentSpec {
    pub min_ready_seconds: Option<i32>,
    pub paused: Option<bool>,
    pub progress_deadline_seconds: Option<i32>,
    pub replicas: i32,
    pub revision_history_limit: Option<i32>,
    pub selector: LabelSelector,
    pub strategy: DeploymentStrategy,
    pub template: TemplateSpec<PodSpec>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentStrategy {
    pub rolling_update: Option<DynamicObject>,
    #[serde(rename = "type")]
    pub type_: String,
}

impl Spec for DeploymentSpec {
    type Status = DeploymentStatus;

    fn metadata() -> &'static Crd {
        &DEPLOYMENT_API
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentStatus {
    pub available_replicas: i32,
    pub collision_count: Option<i32>,
    pub conditions: Vec<DeploymentCondition>,
    pub observed_generation: Option<i64>,
    pub ready_replicas: i32,
    pub replicas: i32,
    pub unavailable_replicas: i32,
    pub updated_replicas: i32,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentCondition {
    pub last_transition_time: String,
    pub last_update_time: String,
    pub message: String,
    pub reason: String,
    pub status: String,
    #[serde(rename = "type")]
    pub type_: String,
}

impl Status for DeploymentStatus {}

#[cfg(test)]
mod test {

    use super::DeploymentSpec;
    use crate::K8Obj;

    #[test]
    fn test_decode_deployment() {
        let deployment: K8Obj<DeploymentSpec> = serde_json::from_str(
            r#"{
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": { "name": "api", "namespace": "shop" },
                "spec": {
                    "replicas": 3,
                    "selector": { "matchLabels": { "app": "api" } },
                    "strategy": { "type": "RollingUpdate", "rollingUpdate": { "maxSurge": "25%" } },
                    "template": {
                        "metadata": { "labels": { "app": "api" } },
                        "spec": { "containers": [ { "name": "api", "image": "api:2" } ] }
                    }
                },
                "status": {
                    "readyReplicas": 2,
                    "conditions": [ { "type": "Available", "status": "True" } ]
                }
            }"#,
        )
        .expect("decode");

        assert_eq!(deployment.spec.replicas, 3);
        assert_eq!(deployment.spec.strategy.type_, "RollingUpdate");
        assert_eq!(deployment.spec.selector.match_labels["app"], "api");
        assert_eq!(deployment.spec.template.spec.containers[0].image, "api:2");
        assert_eq!(deployment.status.ready_replicas, 2);
        assert_eq!(deployment.status.available_replicas, 0);
        assert_eq!(deployment.status.conditions[0].type_, "Available");
    }
}
