//! Configuration management for fundme-deploy

use crate::error::{DeployError, Result};
use crate::network::{DevelopmentNetworks, Network, NetworkConfigTable, NetworkEntry};
use alloy::primitives::{address, Address};
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "fundme.toml";

/// Decimal precision of the mock price feed.
pub const DECIMALS: u8 = 8;
/// Initial answer of the mock price feed (2000 USD with 8 decimals).
pub const INITIAL_ANSWER: i64 = 200_000_000_000;

pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const SEPOLIA_ETH_USD_PRICE_FEED: Address = address!("694AA1769357215DE4FAC081bf1f309aDC325306");

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_networks")]
    pub networks: HashMap<String, NetworkSettings>,
    #[serde(default = "default_named_accounts")]
    pub named_accounts: HashMap<String, NamedAccount>,
    #[serde(default)]
    pub helper: HelperConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    pub chain_id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub block_confirmations: Option<u64>,
    /// Overrides of the top-level named accounts on this network.
    #[serde(default)]
    pub named_accounts: HashMap<String, NamedAccount>,
}

/// A named account is an index into the account list, a literal address or
/// a private key read from the environment and used as a local signer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NamedAccount {
    Index(usize),
    Address(Address),
    PrivateKey { private_key_env: String },
}

impl NamedAccount {
    /// Loads the signer of a `private_key_env` account. Other accounts have
    /// no local signer.
    pub fn load_signer(&self) -> Result<Option<PrivateKeySigner>> {
        let env = match self {
            NamedAccount::PrivateKey { private_key_env } => private_key_env,
            _ => return Ok(None),
        };
        let key = std::env::var(env).map_err(|_| {
            DeployError::ConfigurationError(format!(
                "environment variable {} with the account's private key is not set",
                env
            ))
        })?;
        let signer = key.trim().parse::<PrivateKeySigner>().map_err(|e| {
            DeployError::ConfigurationError(format!("{} does not hold a valid private key: {}", env, e))
        })?;
        Ok(Some(signer))
    }
}

/// Project-level deployment parameters: which networks are development
/// networks, per-chain price feeds and mock parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HelperConfig {
    #[serde(default = "default_development_chains")]
    pub development_chains: Vec<String>,
    #[serde(default = "default_network_config")]
    pub network_config: BTreeMap<String, NetworkEntry>,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_initial_answer")]
    pub initial_answer: i64,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            development_chains: default_development_chains(),
            network_config: default_network_config(),
            decimals: DECIMALS,
            initial_answer: INITIAL_ANSWER,
        }
    }
}

impl HelperConfig {
    pub fn development_networks(&self) -> DevelopmentNetworks {
        DevelopmentNetworks::new(self.development_chains.iter().cloned())
    }

    /// Builds the chain id keyed table. TOML table keys are strings, so the
    /// chain ids are parsed here.
    pub fn network_table(&self) -> Result<NetworkConfigTable> {
        let mut table = NetworkConfigTable::default();
        for (key, entry) in &self.network_config {
            let chain_id = key.trim().parse::<u64>().map_err(|_| {
                DeployError::ConfigurationError(format!(
                    "helper.network_config key '{}' is not a chain id",
                    key
                ))
            })?;
            table.insert(chain_id, entry.clone());
        }
        Ok(table)
    }

    pub fn mock_params(&self) -> MockParams {
        MockParams {
            decimals: self.decimals,
            initial_answer: self.initial_answer,
        }
    }
}

/// Constructor parameters of the mock price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockParams {
    pub decimals: u8,
    pub initial_answer: i64,
}

impl Default for MockParams {
    fn default() -> Self {
        Self {
            decimals: DECIMALS,
            initial_answer: INITIAL_ANSWER,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_path")]
    pub path: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            path: default_artifacts_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_poll_interval", deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    #[serde(default = "default_receipt_timeout", deserialize_with = "deserialize_duration")]
    pub receipt_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            receipt_timeout: default_receipt_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationPolicy {
    /// Log verification failures and keep the deployment.
    #[default]
    Tolerate,
    /// Abort the run on verification failure.
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Environment variable holding the explorer API credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// External command invoked as `<command...> --network <name> <address> <args...>`.
    #[serde(default = "default_verify_command")]
    pub command: Vec<String>,
    #[serde(default)]
    pub policy: VerificationPolicy,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            command: default_verify_command(),
            policy: VerificationPolicy::default(),
        }
    }
}

impl VerificationConfig {
    /// Reads the API credential from the process environment. Empty values
    /// count as absent.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            networks: default_networks(),
            named_accounts: default_named_accounts(),
            helper: HelperConfig::default(),
            database: DatabaseConfig::default(),
            artifacts: ArtifactsConfig::default(),
            rpc: RpcConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

impl Config {
    /// Resolves a network name into the immutable `Network` used for a run.
    pub fn network(&self, name: &str) -> Result<Network> {
        let settings = self.networks.get(name).ok_or_else(|| {
            DeployError::ConfigurationError(format!("network '{}' is not configured", name))
        })?;
        Ok(Network {
            name: name.to_string(),
            chain_id: settings.chain_id,
            url: settings.url.clone(),
            block_confirmations: settings.block_confirmations,
        })
    }

    /// Named accounts in effect on `network`: the top-level table with the
    /// network's overrides applied.
    pub fn named_accounts_for(&self, network: &str) -> HashMap<String, NamedAccount> {
        let mut accounts = self.named_accounts.clone();
        if let Some(settings) = self.networks.get(network) {
            accounts.extend(settings.named_accounts.clone());
        }
        accounts
    }

    /// Local signers of every private key account in effect on `network`.
    pub fn local_signers(&self, network: &str) -> Result<Vec<PrivateKeySigner>> {
        let mut signers = Vec::new();
        for account in self.named_accounts_for(network).values() {
            if let Some(signer) = account.load_signer()? {
                signers.push(signer);
            }
        }
        Ok(signers)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.is_empty() {
            return Err(DeployError::ConfigurationError(
                "database.path must be set".to_string(),
            ));
        }
        if !self.named_accounts.contains_key("deployer") {
            return Err(DeployError::ConfigurationError(
                "named_accounts.deployer must be set".to_string(),
            ));
        }
        for (name, settings) in &self.networks {
            if settings.chain_id == 0 {
                return Err(DeployError::ConfigurationError(format!(
                    "networks.{}.chain_id must be non-zero",
                    name
                )));
            }
        }
        if self.verification.command.is_empty() {
            return Err(DeployError::ConfigurationError(
                "verification.command must name a program".to_string(),
            ));
        }
        self.helper.network_table()?;
        Ok(())
    }
}

/// Parses configuration from a TOML string and validates it.
pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `path`. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let config_str = match fs::read_to_string(path.as_ref()) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if config_str.trim().is_empty() {
        // Provide sane defaults when the config file is absent
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }
    parse_config(&config_str)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

fn default_networks() -> HashMap<String, NetworkSettings> {
    let mut networks = HashMap::new();
    networks.insert(
        "hardhat".to_string(),
        NetworkSettings {
            chain_id: 31337,
            url: None,
            block_confirmations: None,
            named_accounts: HashMap::new(),
        },
    );
    networks.insert(
        "localhost".to_string(),
        NetworkSettings {
            chain_id: 31337,
            url: Some("http://127.0.0.1:8545".to_string()),
            block_confirmations: None,
            named_accounts: HashMap::new(),
        },
    );
    networks
}

fn default_named_accounts() -> HashMap<String, NamedAccount> {
    let mut accounts = HashMap::new();
    accounts.insert("deployer".to_string(), NamedAccount::Index(0));
    accounts
}

fn default_development_chains() -> Vec<String> {
    vec!["hardhat".to_string(), "localhost".to_string()]
}

fn default_network_config() -> BTreeMap<String, NetworkEntry> {
    let mut table = BTreeMap::new();
    table.insert(
        SEPOLIA_CHAIN_ID.to_string(),
        NetworkEntry {
            name: "sepolia".to_string(),
            eth_usd_price_feed: Some(SEPOLIA_ETH_USD_PRICE_FEED),
        },
    );
    table
}

fn default_decimals() -> u8 {
    DECIMALS
}

fn default_initial_answer() -> i64 {
    INITIAL_ANSWER
}

fn default_database_path() -> String {
    "./deployments/deployments.db".to_string()
}

fn default_artifacts_path() -> String {
    "./artifacts".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_receipt_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_api_key_env() -> String {
    "ETHERSCAN_API_KEY".to_string()
}

fn default_verify_command() -> Vec<String> {
    vec!["npx".to_string(), "hardhat".to_string(), "verify".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[networks.hardhat]
chain_id = 31337

[networks.sepolia]
chain_id = 11155111
url = "https://rpc.sepolia.example"
block_confirmations = 6

[named_accounts]
deployer = 0
user = "0x00000000000000000000000000000000000000aa"

[helper]
development_chains = ["hardhat"]
decimals = 8
initial_answer = 200000000000

[helper.network_config.11155111]
name = "sepolia"
eth_usd_price_feed = "0x694AA1769357215DE4FAC081bf1f309aDC325306"

[rpc]
poll_interval = "250ms"
receipt_timeout = "2m"

[verification]
policy = "strict"
"#;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert!(config.helper.development_networks().contains_name("hardhat"));
        assert!(config.helper.development_networks().contains_name("localhost"));
        assert_eq!(config.helper.mock_params(), MockParams::default());
        assert_eq!(config.helper.decimals, 8);
        assert_eq!(config.helper.initial_answer, 200_000_000_000);
        assert_eq!(config.verification.policy, VerificationPolicy::Tolerate);
        let table = config.helper.network_table().unwrap();
        assert_eq!(
            table.price_feed(SEPOLIA_CHAIN_ID).unwrap(),
            SEPOLIA_ETH_USD_PRICE_FEED
        );
    }

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        let sepolia = config.network("sepolia").unwrap();
        assert_eq!(sepolia.chain_id, 11155111);
        assert_eq!(sepolia.confirmations(), 6);
        assert_eq!(config.network("hardhat").unwrap().confirmations(), 1);
        assert_eq!(config.named_accounts["deployer"], NamedAccount::Index(0));
        assert!(matches!(config.named_accounts["user"], NamedAccount::Address(_)));
        assert_eq!(config.rpc.poll_interval, Duration::from_millis(250));
        assert_eq!(config.rpc.receipt_timeout, Duration::from_secs(120));
        assert_eq!(config.verification.policy, VerificationPolicy::Strict);
        assert!(!config.helper.development_networks().contains_name("localhost"));
    }

    #[test]
    fn test_unknown_network_is_configuration_error() {
        let config = Config::default();
        assert!(matches!(
            config.network("mainnet"),
            Err(DeployError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_rejects_non_numeric_chain_key() {
        let err = parse_config(
            r#"
[helper.network_config.sepolia]
name = "sepolia"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::ConfigurationError(_)));
    }

    #[test]
    fn test_requires_deployer_account() {
        let err = parse_config(
            r#"
[named_accounts]
user = 1
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("deployer"));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = parse_config(include_str!("../fundme.toml")).unwrap();
        let sepolia = config.network("sepolia").unwrap();
        assert_eq!(sepolia.confirmations(), 6);
        assert_eq!(config.verification.policy, VerificationPolicy::Tolerate);
        assert_eq!(
            config.helper.network_table().unwrap().price_feed(SEPOLIA_CHAIN_ID).unwrap(),
            SEPOLIA_ETH_USD_PRICE_FEED
        );
        assert_eq!(
            config.named_accounts_for("sepolia")["deployer"],
            NamedAccount::PrivateKey {
                private_key_env: "PRIVATE_KEY".to_string()
            }
        );
        assert_eq!(config.named_accounts_for("hardhat")["deployer"], NamedAccount::Index(0));
    }

    #[test]
    fn test_network_named_account_overrides() {
        let config = parse_config(
            r#"
[networks.hardhat]
chain_id = 31337

[networks.sepolia]
chain_id = 11155111
url = "https://rpc.sepolia.example"

[networks.sepolia.named_accounts]
deployer = { private_key_env = "FUNDME_CONFIG_TEST_OVERRIDE_KEY" }

[named_accounts]
deployer = 0
user = 1
"#,
        )
        .unwrap();
        let sepolia = config.named_accounts_for("sepolia");
        assert!(matches!(sepolia["deployer"], NamedAccount::PrivateKey { .. }));
        assert_eq!(sepolia["user"], NamedAccount::Index(1));
        assert_eq!(config.named_accounts_for("hardhat")["deployer"], NamedAccount::Index(0));
        assert!(config.local_signers("hardhat").unwrap().is_empty());
    }

    #[test]
    fn test_private_key_account_loads_signer() {
        // First anvil/hardhat development key
        std::env::set_var(
            "FUNDME_CONFIG_TEST_SIGNER_KEY",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        );
        let account = NamedAccount::PrivateKey {
            private_key_env: "FUNDME_CONFIG_TEST_SIGNER_KEY".to_string(),
        };
        let signer = account.load_signer().unwrap().unwrap();
        assert_eq!(
            signer.address(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );

        let missing = NamedAccount::PrivateKey {
            private_key_env: "FUNDME_CONFIG_TEST_UNSET_KEY".to_string(),
        };
        assert!(matches!(
            missing.load_signer(),
            Err(DeployError::ConfigurationError(_))
        ));

        std::env::set_var("FUNDME_CONFIG_TEST_BAD_KEY", "not-a-key");
        let invalid = NamedAccount::PrivateKey {
            private_key_env: "FUNDME_CONFIG_TEST_BAD_KEY".to_string(),
        };
        let err = invalid.load_signer().unwrap_err();
        assert!(matches!(err, DeployError::ConfigurationError(_)));
        assert!(!err.to_string().contains("not-a-key"));

        assert!(NamedAccount::Index(0).load_signer().unwrap().is_none());
    }

    #[test]
    fn test_whitespace_api_key_is_present() {
        std::env::set_var("FUNDME_CONFIG_TEST_SPACES_API_KEY", "  ");
        std::env::set_var("FUNDME_CONFIG_TEST_EMPTY_API_KEY", "");
        let config = |env: &str| VerificationConfig {
            api_key_env: env.to_string(),
            ..VerificationConfig::default()
        };
        assert_eq!(
            config("FUNDME_CONFIG_TEST_SPACES_API_KEY").api_key().as_deref(),
            Some("  ")
        );
        assert_eq!(config("FUNDME_CONFIG_TEST_EMPTY_API_KEY").api_key(), None);
        assert_eq!(config("FUNDME_CONFIG_TEST_UNSET_API_KEY").api_key(), None);
    }
}
