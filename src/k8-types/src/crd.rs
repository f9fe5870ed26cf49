/// API group, version and names of a resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crd {
    pub group: &'static str,
    pub version: &'static str,
    pub names: CrdNames,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdNames {
    pub kind: &'static str,
    pub plural: &'static str,
    pub singular: &'static str,
}

impl Crd {
    /// `api/v1` for the core group, `apis/<group>/<version>` otherwise
    pub fn api_prefix(&self) -> String {
        match self.group {
            "core" => format!("api/{}", self.version),
            group => format!("apis/{}/{}", group, self.version),
        }
    }
}
