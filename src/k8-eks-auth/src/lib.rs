//! Derives Kubernetes bearer tokens from AWS IAM identities and
//! resolves EKS clusters through the EKS control plane.

mod cluster;
mod error;

pub mod credentials;
pub mod eks;
pub mod identity;
pub mod minter;
pub mod token;

pub use cluster::{ClusterEndpoint, ClusterRef};
pub use credentials::{shared_config, Credentials, CredentialsProvider, SdkProvider};
pub use eks::{ClusterDirectory, EksClient};
pub use error::AuthError;
pub use identity::{IdentitySigner, PresignedRequest};
pub use minter::{MintStrategy, TokenMinter, TokenSource};
pub use token::BearerToken;
