use serde::Serialize;

use k8_types::Crd;
use k8_types::Spec;

use crate::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSpace {
    All,
    Named(String),
}

impl NameSpace {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<&str> for NameSpace {
    fn from(namespace: &str) -> Self {
        Self::Named(namespace.to_owned())
    }
}

/// query of the pod `log` sub resource
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_lines: Option<u32>,
}

const LABEL_MAX: usize = 63;
const SUBDOMAIN_MAX: usize = 253;

fn label_chars(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}

fn invalid(kind: &str, name: &str, shape: &str) -> ClientError {
    ClientError::InvalidName {
        kind: kind.to_owned(),
        name: name.to_owned(),
        reason: format!("must be a lowercase RFC 1123 {shape}"),
    }
}

/// namespace and container names: RFC 1123 label
pub fn check_label(kind: &str, name: &str) -> Result<(), ClientError> {
    if name.len() <= LABEL_MAX && label_chars(name) {
        Ok(())
    } else {
        Err(invalid(kind, name, "label"))
    }
}

/// object names: RFC 1123 subdomain, dot separated labels
pub fn check_subdomain(kind: &str, name: &str) -> Result<(), ClientError> {
    if name.len() <= SUBDOMAIN_MAX && name.split('.').all(label_chars) {
        Ok(())
    } else {
        Err(invalid(kind, name, "subdomain"))
    }
}

/// generate collection path for given crd
/// if crd group is core then /api is used otherwise /apis + group
pub fn prefix_uri(crd: &Crd, namespace: &NameSpace) -> String {
    match namespace {
        NameSpace::All => format!("/{}/{}", crd.api_prefix(), crd.names.plural),
        NameSpace::Named(name) => format!(
            "/{}/namespaces/{}/{}",
            crd.api_prefix(),
            name,
            crd.names.plural
        ),
    }
}

/// items path, cluster scoped kinds ignore the namespace
pub fn items_uri<S>(namespace: &NameSpace) -> Result<String, ClientError>
where
    S: Spec,
{
    if !S::NAME_SPACED {
        return Ok(prefix_uri(S::metadata(), &NameSpace::All));
    }
    if let NameSpace::Named(name) = namespace {
        check_label("namespace", name)?;
    }
    Ok(prefix_uri(S::metadata(), namespace))
}

/// single item path with optional sub resource and query
pub fn item_uri<S, Q>(
    name: &str,
    namespace: &str,
    sub_resource: Option<&str>,
    query_params: Option<&Q>,
) -> Result<String, ClientError>
where
    S: Spec,
    Q: Serialize,
{
    check_subdomain(S::metadata().names.singular, name)?;
    let ns = if S::NAME_SPACED {
        check_label("namespace", namespace)?;
        NameSpace::from(namespace)
    } else {
        NameSpace::All
    };
    let prefix = prefix_uri(S::metadata(), &ns);
    let sub_resource = sub_resource.unwrap_or("");
    let query = match query_params {
        Some(params) => serde_qs::to_string(params)
            .map_err(|err| ClientError::decode("query parameters", err))?,
        None => String::new(),
    };

    if query.is_empty() {
        Ok(format!("{prefix}/{name}{sub_resource}"))
    } else {
        Ok(format!("{prefix}/{name}{sub_resource}?{query}"))
    }
}
