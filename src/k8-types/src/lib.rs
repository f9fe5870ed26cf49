mod crd;
mod metadata;
pub mod app;
pub mod core;

pub use self::crd::*;
pub use self::metadata::*;
pub use self::spec_def::*;

mod spec_def {

    use std::fmt::Debug;

    use serde::de::DeserializeOwned;

    use super::Crd;

    pub trait Status: Sized + Debug + Clone + Default + DeserializeOwned + Send + Sync {}

    /// Kubernetes Spec
    pub trait Spec: Sized + Debug + Clone + Default + DeserializeOwned + Send + Sync {
        type Status: Status;

        /// if true, spec is namespaced
        const NAME_SPACED: bool = true;

        /// return uri for single instance
        fn metadata() -> &'static Crd;

        fn label() -> &'static str {
            Self::metadata().names.kind
        }

        fn api_version() -> String {
            let metadata = Self::metadata();
            if metadata.group == "core" {
                return metadata.version.to_owned();
            }
            format!("{}/{}", metadata.group, metadata.version)
        }

        fn kind() -> String {
            Self::metadata().names.kind.to_owned()
        }
    }
}
