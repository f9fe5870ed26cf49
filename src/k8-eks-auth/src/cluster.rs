use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identity of a target cluster, used as lookup key everywhere
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterRef {
    pub name: String,
    pub region: String,
}

impl ClusterRef {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.region)
    }
}

/// api server url and base64 encoded CA bundle as reported by EKS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEndpoint {
    #[serde(rename = "apiServerURL")]
    pub api_server_url: String,
    #[serde(rename = "caCertificateB64")]
    pub ca_certificate_b64: String,
}

impl ClusterEndpoint {
    pub fn new(api_server_url: impl Into<String>, ca_certificate_b64: impl Into<String>) -> Self {
        Self {
            api_server_url: api_server_url.into(),
            ca_certificate_b64: ca_certificate_b64.into(),
        }
    }

    /// api server url without trailing slash, ready to be joined with a resource path
    pub fn host(&self) -> &str {
        self.api_server_url.trim_end_matches('/')
    }
}

/// `amazonaws.com` except for the China partition
pub(crate) fn aws_domain(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    }
}

#[cfg(test)]
mod test {

    use super::{aws_domain, ClusterEndpoint, ClusterRef};

    #[test]
    fn test_display() {
        assert_eq!(ClusterRef::new("prod", "eu-west-1").to_string(), "prod (eu-west-1)");
    }

    #[test]
    fn test_host_trims_slash() {
        let endpoint = ClusterEndpoint::new("https://abc.eks.amazonaws.com/", "Q0E");
        assert_eq!(endpoint.host(), "https://abc.eks.amazonaws.com");
    }

    #[test]
    fn test_partition_domain() {
        assert_eq!(aws_domain("us-east-1"), "amazonaws.com");
        assert_eq!(aws_domain("cn-north-1"), "amazonaws.com.cn");
    }
}
