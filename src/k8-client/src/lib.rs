mod error;
mod gateway;
mod uri;

pub mod config;
pub mod envelope;
pub mod records;
pub mod registry;
pub mod transport;
pub mod trust;

#[cfg(test)]
mod fixture;

pub use self::config::GatewayConfig;
pub use self::envelope::Envelope;
pub use self::error::{ClientError, ErrorCode};
pub use self::gateway::{ApiGateway, ClusterOverview, Timeouts};
pub use self::registry::{OperationOutput, OperationRegistry, OperationSpec, ParamSpec};
pub use self::uri::{LogOptions, NameSpace};
pub use k8_eks_auth::ClusterRef;

pub use shared::new_shared;
pub use shared::SharedGateway;

mod shared {

    use std::sync::Arc;

    use super::ApiGateway;
    use super::GatewayConfig;

    pub type SharedGateway = Arc<ApiGateway>;

    pub async fn new_shared(config: &GatewayConfig) -> SharedGateway {
        Arc::new(ApiGateway::from_config(config).await)
    }
}
