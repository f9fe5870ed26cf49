//! eks-gateway
//!
//! Read-only access to EKS clusters: operation discovery, dispatch and
//! the `mint-token` exec plugin used by generated kubeconfigs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use k8_client::config::CONFIG_ENV;
use k8_client::registry::CATALOG_VERSION;
use k8_client::{new_shared, ClusterOverview, ClusterRef, Envelope, GatewayConfig};
use k8_client::{OperationRegistry, OperationSpec};
use k8_eks_auth::{shared_config, SdkProvider, TokenMinter};
use k8_types::core::plugin::ExecCredential;

#[derive(Debug, Parser)]
#[command(name = "eks-gateway", version, about = "Read-only gateway to EKS clusters")]
struct Cli {
    /// gateway config file, YAML or JSON
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the operation catalog
    Operations,
    /// Print a single operation and its parameters
    Describe { operation: String },
    /// Run an operation and print the response envelope
    Call {
        operation: String,
        /// operation parameter as key=value, repeatable
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Describe a cluster together with its nodegroups and namespaces
    Overview {
        #[arg(long)]
        cluster_name: String,
        #[arg(long)]
        region: String,
    },
    /// Print an ExecCredential for kubectl exec plugins
    MintToken {
        #[arg(long)]
        cluster_name: String,
        #[arg(long)]
        region: String,
    },
}

#[derive(Serialize)]
struct Catalog {
    version: &'static str,
    operations: &'static [OperationSpec],
}

/// `key=value`, the value read as JSON when it parses and as a string otherwise
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw}"))?;
    if key.trim().is_empty() {
        return Err(format!("missing parameter name in {raw}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.trim().to_owned(), value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Operations => print_json(&Catalog {
            version: CATALOG_VERSION,
            operations: OperationRegistry::list(),
        }),
        Command::Describe { operation } => print_json(OperationRegistry::describe(&operation)?),
        Command::Call { operation, params } => {
            let config = GatewayConfig::load(cli.config.as_deref())?;
            let params: Map<String, Value> = params.into_iter().collect();
            if !call(&config, &operation, &params).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Overview {
            cluster_name,
            region,
        } => {
            let config = GatewayConfig::load(cli.config.as_deref())?;
            let gateway = new_shared(&config).await;
            let cluster = ClusterRef::new(cluster_name, region);
            let envelope: Envelope<ClusterOverview> = tokio::select! {
                overview = gateway.cluster_overview(&cluster) => overview.into(),
                _ = tokio::signal::ctrl_c() => {
                    warn!("interrupted, removing trust material");
                    gateway.trust().purge();
                    bail!("interrupted");
                }
            };
            gateway.trust().purge();
            print_json(&envelope)
        }
        Command::MintToken {
            cluster_name,
            region,
        } => {
            let config = GatewayConfig::load(cli.config.as_deref())?;
            let sdk = shared_config(Some(region.clone()), config.control_plane_timeout()).await;
            let minter = TokenMinter::standard(
                config.aws_cli_path.clone(),
                config.process_timeout(),
                &sdk,
                Arc::new(SdkProvider::from_config(&sdk)),
            );
            let cluster = ClusterRef::new(cluster_name, region);
            let token = minter
                .mint(&cluster)
                .await
                .with_context(|| format!("minting token for {cluster}"))?;
            print_json(&ExecCredential::new(
                token.value().to_owned(),
                token.expiration_timestamp(),
            ))
        }
    }
}

/// dispatch one operation, true when it succeeded
async fn call(config: &GatewayConfig, operation: &str, params: &Map<String, Value>) -> Result<bool> {
    let registry = OperationRegistry::new(new_shared(config).await);
    info!(operation, transport = registry.gateway().transport().name(), "calling");

    let envelope = tokio::select! {
        envelope = registry.dispatch_envelope(operation, params) => envelope,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, removing trust material");
            registry.gateway().trust().purge();
            bail!("interrupted");
        }
    };
    registry.gateway().trust().purge();
    print_json(&envelope)?;
    Ok(envelope.is_success())
}
