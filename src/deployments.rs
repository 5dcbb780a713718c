//! Deployment framework: named accounts, `deploy` and `get`.
//!
//! `Deployments` ties together a network, the chain backend serving it, the
//! record store and the compiled artifacts. Deploying a contract whose
//! bytecode and constructor arguments match the stored record, and whose code
//! is still on chain, reuses the stored record instead of redeploying.

use crate::abi::{encode_creation, ConstructorArg};
use crate::artifacts::Artifacts;
use crate::backend::{ChainBackend, TransactionRequest};
use crate::config::NamedAccount;
use crate::error::{DeployError, Result};
use crate::network::Network;
use crate::persistence::DeploymentStore;
use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    pub args: Vec<ConstructorArg>,
    pub deployer: Address,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// Hex SHA-256 of the creation bytecode
    pub bytecode_hash: String,
    pub deployed_at: DateTime<Utc>,
    /// Whether this run submitted the creation transaction.
    #[serde(skip)]
    pub newly_deployed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub from: Address,
    pub args: Vec<ConstructorArg>,
    pub log: bool,
    pub wait_confirmations: u64,
}

impl DeployOptions {
    pub fn new(from: Address) -> Self {
        Self {
            from,
            args: Vec::new(),
            log: false,
            wait_confirmations: 1,
        }
    }

    pub fn args(mut self, args: Vec<ConstructorArg>) -> Self {
        self.args = args;
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn wait_confirmations(mut self, confirmations: u64) -> Self {
        self.wait_confirmations = confirmations;
        self
    }
}

pub struct Deployments {
    network: Network,
    backend: Arc<dyn ChainBackend>,
    store: Arc<dyn DeploymentStore>,
    artifacts: Artifacts,
    named_accounts: HashMap<String, NamedAccount>,
}

impl Deployments {
    pub fn new(
        network: Network,
        backend: Arc<dyn ChainBackend>,
        store: Arc<dyn DeploymentStore>,
        artifacts: Artifacts,
        named_accounts: HashMap<String, NamedAccount>,
    ) -> Self {
        Self {
            network,
            backend,
            store,
            artifacts,
            named_accounts,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn backend(&self) -> &Arc<dyn ChainBackend> {
        &self.backend
    }

    pub fn store(&self) -> &Arc<dyn DeploymentStore> {
        &self.store
    }

    /// Progress line attributed to the deploy steps.
    pub fn log(&self, message: &str) {
        info!(target: "fundme_deploy::steps", "{}", message);
    }

    /// Resolves every configured named account against the backend's accounts.
    pub async fn named_accounts(&self) -> Result<BTreeMap<String, Address>> {
        let accounts = self.backend.accounts().await?;
        let mut resolved = BTreeMap::new();
        for (name, account) in &self.named_accounts {
            resolved.insert(name.clone(), resolve_named(name, account, &accounts)?);
        }
        Ok(resolved)
    }

    pub async fn named_account(&self, name: &str) -> Result<Address> {
        let account = self.named_accounts.get(name).ok_or_else(|| {
            DeployError::ConfigurationError(format!("named account '{}' is not configured", name))
        })?;
        let accounts = self.backend.accounts().await?;
        resolve_named(name, account, &accounts)
    }

    /// Most recent deployment of `name` on this network.
    pub fn get(&self, name: &str) -> Result<DeploymentRecord> {
        self.get_optional(name)?.ok_or_else(|| {
            DeployError::LookupError(format!(
                "no deployment of '{}' on network '{}'",
                name, self.network.name
            ))
        })
    }

    pub fn get_optional(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        self.store.get(&self.network.name, name)
    }

    pub fn all(&self) -> Result<Vec<DeploymentRecord>> {
        self.store.list(&self.network.name)
    }

    /// Forgets every stored deployment of this network.
    pub fn reset(&self) -> Result<usize> {
        self.store.clear(&self.network.name)
    }

    pub async fn deploy(&self, name: &str, options: DeployOptions) -> Result<DeploymentRecord> {
        let artifact = self.artifacts.get(name)?;
        let bytecode = artifact.bytecode_bytes()?;
        let bytecode_hash = artifact.bytecode_hash()?;

        if let Some(existing) = self.get_optional(name)? {
            if existing.bytecode_hash == bytecode_hash
                && existing.args == options.args
                && self.backend.has_code(existing.address).await?
            {
                if options.log {
                    info!("reusing \"{}\" at {}", name, existing.address);
                }
                return Ok(existing);
            }
        }

        let data = encode_creation(&bytecode, &options.args);
        let confirmations = options.wait_confirmations.max(1);
        if options.log {
            info!(
                "deploying \"{}\" from {}, waiting for {} confirmation(s)...",
                name, options.from, confirmations
            );
        }
        let receipt = self
            .backend
            .send_transaction(TransactionRequest::creation(options.from, data), confirmations)
            .await?;
        if !receipt.status {
            return Err(DeployError::TransactionError(format!(
                "deployment of '{}' reverted (tx: {})",
                name, receipt.transaction_hash
            )));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            DeployError::TransactionError(format!(
                "receipt of '{}' deployment has no contract address (tx: {})",
                name, receipt.transaction_hash
            ))
        })?;

        let record = DeploymentRecord {
            name: name.to_string(),
            address,
            args: options.args,
            deployer: options.from,
            transaction_hash: Some(receipt.transaction_hash),
            block_number: Some(receipt.block_number),
            gas_used: Some(receipt.gas_used),
            bytecode_hash,
            deployed_at: Utc::now(),
            newly_deployed: true,
        };
        self.store.save(&self.network.name, &record)?;

        if options.log {
            info!(
                "deployed \"{}\" at {} (tx: {}) with {} gas",
                name, record.address, receipt.transaction_hash, receipt.gas_used
            );
        }
        Ok(record)
    }
}

fn resolve_named(name: &str, account: &NamedAccount, accounts: &[Address]) -> Result<Address> {
    match account {
        NamedAccount::Address(address) => Ok(*address),
        NamedAccount::PrivateKey { .. } => match account.load_signer()? {
            Some(signer) => Ok(signer.address()),
            None => Err(DeployError::ConfigurationError(format!(
                "named account '{}' has no signer",
                name
            ))),
        },
        NamedAccount::Index(index) => accounts.get(*index).copied().ok_or_else(|| {
            DeployError::ConfigurationError(format!(
                "named account '{}' refers to account #{} but the node exposes {} accounts",
                name,
                index,
                accounts.len()
            ))
        }),
    }
}
