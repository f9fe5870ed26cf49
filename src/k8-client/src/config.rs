use std::env;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::ClientError;

pub const CONFIG_ENV: &str = "EKS_GATEWAY_CONFIG";
pub const TRANSPORT_ENV: &str = "EKS_GATEWAY_TRANSPORT";
pub const BUNDLE_TTL_ENV: &str = "EKS_GATEWAY_BUNDLE_TTL";
pub const KUBECTL_ENV: &str = "EKS_GATEWAY_KUBECTL";
pub const AWS_CLI_ENV: &str = "EKS_GATEWAY_AWS_CLI";

/// how Kubernetes API requests leave the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    #[default]
    Https,
    Kubectl,
}

impl std::str::FromStr for TransportKind {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "https" => Ok(Self::Https),
            "kubectl" => Ok(Self::Kubectl),
            other => Err(ClientError::Configuration(format!(
                "unknown transport {other}, expected https or kubectl"
            ))),
        }
    }
}

/// which kubeconfig document, if any, accompanies a trust bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KubeconfigMode {
    None,
    StaticToken,
    ExecPlugin,
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub transport: TransportKind,
    pub kubectl_path: PathBuf,
    pub aws_cli_path: PathBuf,
    pub bundle_ttl_secs: u64,
    pub control_plane_timeout_secs: u64,
    pub log_timeout_secs: u64,
    pub process_timeout_secs: u64,
    pub kubeconfig: KubeconfigMode,
    pub exec_command: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub allow_inactive_clusters: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Https,
            kubectl_path: PathBuf::from("kubectl"),
            aws_cli_path: PathBuf::from("aws"),
            bundle_ttl_secs: 600,
            control_plane_timeout_secs: 5,
            log_timeout_secs: 30,
            process_timeout_secs: 15,
            kubeconfig: KubeconfigMode::Auto,
            exec_command: None,
            scratch_dir: None,
            allow_inactive_clusters: false,
        }
    }
}

impl GatewayConfig {
    /// defaults, then the config file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|name| env::var(name).ok())
    }

    /// YAML or JSON document; JSON goes through the YAML parser
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading gateway config");
        let file = File::open(path).map_err(|err| {
            ClientError::Configuration(format!("can't open {}: {}", path.display(), err))
        })?;
        serde_yaml::from_reader(file)
            .map_err(|err| ClientError::Configuration(format!("{}: {}", path.display(), err)))
    }

    /// apply `EKS_GATEWAY_*` overrides read through `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(transport) = lookup(TRANSPORT_ENV) {
            self.transport = transport.parse()?;
        }
        if let Some(ttl) = lookup(BUNDLE_TTL_ENV) {
            self.bundle_ttl_secs = ttl.trim().parse().map_err(|_| {
                ClientError::Configuration(format!(
                    "{BUNDLE_TTL_ENV} must be a whole number of seconds, got {ttl}"
                ))
            })?;
        }
        if let Some(kubectl) = lookup(KUBECTL_ENV) {
            self.kubectl_path = PathBuf::from(kubectl);
        }
        if let Some(aws) = lookup(AWS_CLI_ENV) {
            self.aws_cli_path = PathBuf::from(aws);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        for (key, value) in [
            ("control-plane-timeout-secs", self.control_plane_timeout_secs),
            ("log-timeout-secs", self.log_timeout_secs),
            ("process-timeout-secs", self.process_timeout_secs),
        ] {
            if value == 0 {
                return Err(ClientError::Configuration(format!(
                    "{key} must be greater than zero"
                )));
            }
        }
        if self.kubectl_path.as_os_str().is_empty() || self.aws_cli_path.as_os_str().is_empty() {
            return Err(ClientError::Configuration(
                "kubectl-path and aws-cli-path can't be empty".to_owned(),
            ));
        }
        if self.transport == TransportKind::Kubectl && self.kubeconfig == KubeconfigMode::None {
            return Err(ClientError::Configuration(
                "kubectl transport needs a kubeconfig, kubeconfig can't be none".to_owned(),
            ));
        }
        Ok(())
    }

    /// `auto` resolved against the transport
    pub fn kubeconfig_mode(&self) -> KubeconfigMode {
        match (self.kubeconfig, self.transport) {
            (KubeconfigMode::Auto, TransportKind::Kubectl) => KubeconfigMode::StaticToken,
            (KubeconfigMode::Auto, TransportKind::Https) => KubeconfigMode::None,
            (mode, _) => mode,
        }
    }

    /// command written into exec-plugin kubeconfigs
    pub fn exec_command(&self) -> PathBuf {
        self.exec_command
            .clone()
            .or_else(|| env::current_exe().ok())
            .unwrap_or_else(|| PathBuf::from("eks-gateway"))
    }

    pub fn bundle_ttl(&self) -> Duration {
        Duration::from_secs(self.bundle_ttl_secs)
    }

    pub fn control_plane_timeout(&self) -> Duration {
        Duration::from_secs(self.control_plane_timeout_secs)
    }

    pub fn log_timeout(&self) -> Duration {
        Duration::from_secs(self.log_timeout_secs)
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }
}

#[cfg(test)]
mod test {

    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default().with_overrides(|_| None).expect("config");
        assert_eq!(config.transport, TransportKind::Https);
        assert_eq!(config.bundle_ttl(), Duration::from_secs(600));
        assert_eq!(config.kubeconfig_mode(), KubeconfigMode::None);
        assert!(!config.allow_inactive_clusters);
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("file");
        writeln!(
            file,
            "transport: kubectl\nbundle-ttl-secs: 0\nallow-inactive-clusters: true\n"
        )
        .expect("write");

        let config = GatewayConfig::from_file(file.path()).expect("config");
        assert_eq!(config.transport, TransportKind::Kubectl);
        assert_eq!(config.bundle_ttl_secs, 0);
        assert_eq!(config.kubectl_path, PathBuf::from("kubectl"));
        assert_eq!(config.kubeconfig_mode(), KubeconfigMode::StaticToken);
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("file");
        write!(file, r#"{{"kubeconfig": "exec-plugin", "log-timeout-secs": 60}}"#).expect("write");

        let config = GatewayConfig::from_file(file.path()).expect("config");
        assert_eq!(config.kubeconfig_mode(), KubeconfigMode::ExecPlugin);
        assert_eq!(config.log_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("file");
        writeln!(file, "transprot: https").expect("write");
        let err = GatewayConfig::from_file(file.path()).expect_err("typo");
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_env_overrides() {
        let config = GatewayConfig::default()
            .with_overrides(env_of(&[
                (TRANSPORT_ENV, "KUBECTL"),
                (BUNDLE_TTL_ENV, "30"),
                (KUBECTL_ENV, "/opt/bin/kubectl"),
                (AWS_CLI_ENV, "/opt/bin/aws"),
            ]))
            .expect("config");
        assert_eq!(config.transport, TransportKind::Kubectl);
        assert_eq!(config.bundle_ttl_secs, 30);
        assert_eq!(config.kubectl_path, PathBuf::from("/opt/bin/kubectl"));
        assert_eq!(config.aws_cli_path, PathBuf::from("/opt/bin/aws"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(GatewayConfig::default()
            .with_overrides(env_of(&[(TRANSPORT_ENV, "grpc")]))
            .is_err());
        assert!(GatewayConfig::default()
            .with_overrides(env_of(&[(BUNDLE_TTL_ENV, "-1")]))
            .is_err());

        let config = GatewayConfig {
            transport: TransportKind::Kubectl,
            kubeconfig: KubeconfigMode::None,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GatewayConfig {
            process_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
