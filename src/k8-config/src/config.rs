use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::ConfigError;

pub const KUBECONFIG_API_VERSION: &str = "v1";
pub const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub cluster: ClusterDetail,
}

#[derive(Debug, Eq, PartialEq, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    pub server: String,
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    pub context: ContextDetail,
}

#[derive(Debug, Eq, PartialEq, Default, Clone, Serialize, Deserialize)]
pub struct ContextDetail {
    pub cluster: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub user: UserDetail,
}

#[derive(Debug, Eq, PartialEq, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<Exec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserDetail {
    /// user authenticating with a fixed bearer token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// user whose token is produced by an exec credential plugin
    pub fn with_exec(exec: Exec) -> Self {
        Self {
            exec: Some(exec),
            ..Default::default()
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Exec {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub args: Vec<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<ExecEnv>,
    #[serde(
        rename = "interactiveMode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub interactive_mode: Option<String>,
}

impl Exec {
    pub fn new<C, A>(command: C, args: Vec<A>) -> Self
    where
        C: Into<String>,
        A: Into<String>,
    {
        Self {
            api_version: EXEC_API_VERSION.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            command: command.into(),
            env: vec![],
            interactive_mode: Some("Never".to_owned()),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct ExecEnv {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Eq, PartialEq, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub clusters: Vec<Cluster>,
    pub contexts: Vec<Context>,
    pub current_context: String,
    pub kind: String,
    pub users: Vec<User>,
}

impl KubeConfig {
    /// document with exactly one cluster, one user and a current context binding them
    pub fn single_cluster(
        cluster_name: &str,
        server: &str,
        certificate_authority_data: &str,
        user: UserDetail,
    ) -> Self {
        let user_name = format!("eks-user-{}", cluster_name);
        let context_name = format!("eks-{}", cluster_name);
        debug!(cluster = cluster_name, context = %context_name, "building kubeconfig");
        Self {
            path: PathBuf::new(),
            api_version: KUBECONFIG_API_VERSION.to_owned(),
            clusters: vec![Cluster {
                name: cluster_name.to_owned(),
                cluster: ClusterDetail {
                    certificate_authority_data: Some(certificate_authority_data.to_owned()),
                    server: server.to_owned(),
                    ..Default::default()
                },
            }],
            contexts: vec![Context {
                name: context_name.clone(),
                context: ContextDetail {
                    cluster: cluster_name.to_owned(),
                    user: user_name.clone(),
                    namespace: None,
                },
            }],
            current_context: context_name,
            kind: "Config".to_owned(),
            users: vec![User {
                name: user_name,
                user,
            }],
        }
    }

    /// JSON documents are read through the YAML parser as well
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let file = File::open(path.as_ref())?;
        let mut config: Self = serde_yaml::from_reader(file)?;
        config.path = path.as_ref().to_path_buf();
        Ok(config)
    }

    pub fn to_yaml_writer<W: Write>(&self, writer: W) -> Result<(), ConfigError> {
        Ok(serde_yaml::to_writer(writer, self)?)
    }
}
