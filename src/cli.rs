//! Shared setup for the command-line binaries

use crate::artifacts::Artifacts;
use crate::backend::ChainBackend;
use crate::config::Config;
use crate::deployments::Deployments;
use crate::error::Result;
use crate::network::Network;
use crate::persistence::{Database, DeploymentStore, InMemoryStore};
use crate::rpc::RpcBackend;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Opens the backend and record store for `network`.
///
/// A network without an RPC url gets a freshly started `anvil` node whose
/// records live only as long as the process, like Hardhat's built-in
/// network. Networks with a url are reached over JSON-RPC and use the
/// SQLite store. Private key accounts of the network become local signers.
pub async fn open_backend(
    config: &Config,
    network: &Network,
) -> Result<(Arc<dyn ChainBackend>, Arc<dyn DeploymentStore>)> {
    let signers = config.local_signers(&network.name)?;
    match &network.url {
        None => {
            info!(
                "Network '{}' has no RPC url, starting a development node",
                network.name
            );
            let backend = RpcBackend::spawn(network, &config.rpc, signers).await?;
            info!("Development node listening on {}", backend.url());
            Ok((Arc::new(backend), Arc::new(InMemoryStore::new())))
        }
        Some(url) => {
            info!("Connecting to '{}' at {}", network.name, url);
            let backend = RpcBackend::connect(network, &config.rpc, signers).await?;
            let store = Database::open(&config.database.path)?;
            Ok((Arc::new(backend), Arc::new(store)))
        }
    }
}

/// Builds the deployment framework for `network_name`.
pub async fn open_deployments(config: &Config, network_name: &str) -> Result<Deployments> {
    let network = config.network(network_name)?;
    let (backend, store) = open_backend(config, &network).await?;
    let artifacts = Artifacts::load_dir(&config.artifacts.path)?;
    Ok(Deployments::new(
        network,
        backend,
        store,
        artifacts,
        config.named_accounts_for(network_name),
    ))
}
