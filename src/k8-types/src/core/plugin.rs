use serde::Deserialize;
use serde::Serialize;

pub const EXEC_CREDENTIAL_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";
pub const EXEC_CREDENTIAL_KIND: &str = "ExecCredential";

/// Credential printed by exec plugins such as `aws eks get-token`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub spec: ExecCredentialSpec,
    pub status: Option<ExecCredentialStatus>,
}

fn default_api_version() -> String {
    EXEC_CREDENTIAL_API_VERSION.to_owned()
}

fn default_kind() -> String {
    EXEC_CREDENTIAL_KIND.to_owned()
}

impl ExecCredential {
    pub fn new(token: String, expiration_timestamp: String) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            spec: ExecCredentialSpec::default(),
            status: Some(ExecCredentialStatus {
                expiration_timestamp,
                token,
            }),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.status.as_ref().map(|status| status.token.as_str())
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialSpec {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecCredentialStatus {
    pub expiration_timestamp: String,
    pub token: String,
}
