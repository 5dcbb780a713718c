//! Network identity and the static tables that classify networks.
//!
//! Both tables are built once from configuration and handed to the deploy
//! steps explicitly; nothing here is global.

use crate::error::{DeployError, Result};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fallback confirmation count when a network does not configure one.
pub const DEFAULT_BLOCK_CONFIRMATIONS: u64 = 1;

/// The network a deployment run targets. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
    pub url: Option<String>,
    pub block_confirmations: Option<u64>,
}

impl Network {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
            url: None,
            block_confirmations: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_block_confirmations(mut self, confirmations: u64) -> Self {
        self.block_confirmations = Some(confirmations);
        self
    }

    pub fn confirmations(&self) -> u64 {
        self.block_confirmations.unwrap_or(DEFAULT_BLOCK_CONFIRMATIONS)
    }
}

/// Names of networks treated as local/test networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevelopmentNetworks {
    names: BTreeSet<String>,
}

impl DevelopmentNetworks {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, network: &Network) -> bool {
        self.contains_name(&network.name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Per-chain parameters for public networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub name: String,
    #[serde(default)]
    pub eth_usd_price_feed: Option<Address>,
}

/// Chain id -> per-network parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkConfigTable {
    entries: BTreeMap<u64, NetworkEntry>,
}

impl NetworkConfigTable {
    pub fn new(entries: BTreeMap<u64, NetworkEntry>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, chain_id: u64, entry: NetworkEntry) {
        self.entries.insert(chain_id, entry);
    }

    pub fn get(&self, chain_id: u64) -> Option<&NetworkEntry> {
        self.entries.get(&chain_id)
    }

    /// The configured ETH/USD price feed for `chain_id`.
    pub fn price_feed(&self, chain_id: u64) -> Result<Address> {
        let entry = self.entries.get(&chain_id).ok_or_else(|| {
            DeployError::ConfigurationError(format!("no network config entry for chain id {}", chain_id))
        })?;
        entry.eth_usd_price_feed.ok_or_else(|| {
            DeployError::ConfigurationError(format!(
                "network config entry '{}' (chain id {}) has no eth_usd_price_feed",
                entry.name, chain_id
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn sepolia_table() -> NetworkConfigTable {
        let mut table = NetworkConfigTable::default();
        table.insert(
            11155111,
            NetworkEntry {
                name: "sepolia".to_string(),
                eth_usd_price_feed: Some(address!("694AA1769357215DE4FAC081bf1f309aDC325306")),
            },
        );
        table.insert(
            5,
            NetworkEntry {
                name: "goerli".to_string(),
                eth_usd_price_feed: None,
            },
        );
        table
    }

    #[test]
    fn test_development_membership_by_name() {
        let dev = DevelopmentNetworks::new(["hardhat", "localhost"]);
        assert!(dev.contains(&Network::new("hardhat", 31337)));
        assert!(dev.contains(&Network::new("localhost", 31337)));
        assert!(!dev.contains(&Network::new("sepolia", 11155111)));
    }

    #[test]
    fn test_price_feed_lookup() {
        let table = sepolia_table();
        let feed = table.price_feed(11155111).unwrap();
        assert_eq!(feed.to_string(), "0x694AA1769357215DE4FAC081bf1f309aDC325306");
    }

    #[test]
    fn test_price_feed_missing_chain_or_field() {
        let table = sepolia_table();
        assert!(matches!(table.price_feed(1), Err(DeployError::ConfigurationError(_))));
        assert!(matches!(table.price_feed(5), Err(DeployError::ConfigurationError(_))));
    }

    #[test]
    fn test_confirmations_default_to_one() {
        assert_eq!(Network::new("sepolia", 11155111).confirmations(), 1);
        assert_eq!(
            Network::new("sepolia", 11155111).with_block_confirmations(6).confirmations(),
            6
        );
    }
}
