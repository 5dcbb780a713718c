//! Price-feed resolution and the FundMe deployment

use super::{DeployContext, DeployScript, StepReport, MOCK_CONTRACT};
use crate::abi::ConstructorArg;
use crate::deployments::{DeployOptions, DeploymentRecord, Deployments};
use crate::error::Result;
use crate::network::{DevelopmentNetworks, NetworkConfigTable};
use crate::verify::{verify_with_policy, VerificationOutcome, VerificationRequest};
use alloy::primitives::Address;
use async_trait::async_trait;

pub const FUND_ME_CONTRACT: &str = "FundMe";

/// Where the price feed handed to FundMe comes from. Exactly one source is
/// selected per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceFeedSource {
    /// The mock deployed on this development network.
    Development { mock: DeploymentRecord },
    /// The statically configured feed of a public network.
    Public { chain_id: u64, configured_address: Address },
}

impl PriceFeedSource {
    pub fn address(&self) -> Address {
        match self {
            PriceFeedSource::Development { mock } => mock.address,
            PriceFeedSource::Public {
                configured_address, ..
            } => *configured_address,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, PriceFeedSource::Development { .. })
    }
}

/// Selects the price feed for the current network.
///
/// Development networks use the most recent `MockV3Aggregator` deployment
/// (`LookupError` when there is none). Other networks use the configured
/// feed of their chain id (`ConfigurationError` when the chain or its feed
/// is not configured).
pub fn resolve_price_feed(
    deployments: &Deployments,
    development_networks: &DevelopmentNetworks,
    network_table: &NetworkConfigTable,
) -> Result<PriceFeedSource> {
    let network = deployments.network();
    if development_networks.contains(network) {
        let mock = deployments.get(MOCK_CONTRACT)?;
        Ok(PriceFeedSource::Development { mock })
    } else {
        let configured_address = network_table.price_feed(network.chain_id)?;
        Ok(PriceFeedSource::Public {
            chain_id: network.chain_id,
            configured_address,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundMeDeployment {
    pub record: DeploymentRecord,
    pub price_feed: PriceFeedSource,
    pub verification: VerificationOutcome,
}

pub struct FundMeDeployer;

impl FundMeDeployer {
    pub async fn deploy(ctx: &DeployContext) -> Result<FundMeDeployment> {
        let deployments = &ctx.deployments;
        let network = deployments.network();

        // Resolve before anything is submitted
        let price_feed =
            resolve_price_feed(deployments, &ctx.development_networks, &ctx.network_table)?;
        if price_feed.is_mock() {
            deployments.log(&format!("Using mock price feed at {}", price_feed.address()));
        } else {
            deployments.log(&format!(
                "Using configured price feed {} of chain {}",
                price_feed.address(),
                network.chain_id
            ));
        }
        let deployer = deployments.named_account("deployer").await?;
        let args = vec![ConstructorArg::Address(price_feed.address())];

        let record = deployments
            .deploy(
                FUND_ME_CONTRACT,
                DeployOptions::new(deployer)
                    .args(args.clone())
                    .log(true)
                    .wait_confirmations(network.confirmations()),
            )
            .await?;

        let verification = match (&ctx.api_key, ctx.is_development()) {
            (Some(api_key), false) => {
                let request = VerificationRequest {
                    network: network.clone(),
                    address: record.address,
                    constructor_args: args,
                    api_key: api_key.clone(),
                };
                verify_with_policy(ctx.verifier.as_ref(), ctx.verification_policy, &request).await?
            }
            _ => VerificationOutcome::Skipped,
        };

        deployments.log("--------------------------------------------------------------");
        Ok(FundMeDeployment {
            record,
            price_feed,
            verification,
        })
    }
}

#[async_trait]
impl DeployScript for FundMeDeployer {
    fn id(&self) -> &'static str {
        "fundme"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "fundme"]
    }

    async fn run(&self, ctx: &DeployContext) -> Result<StepReport> {
        let deployment = Self::deploy(ctx).await?;
        let mut report = StepReport::new(self.id());
        report.deployments.push(deployment.record);
        report.verification = Some(deployment.verification);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Artifacts, ContractArtifact};
    use crate::config::NamedAccount;
    use crate::error::DeployError;
    use crate::network::{Network, NetworkEntry};
    use crate::persistence::InMemoryStore;
    use crate::testing::InMemoryChain;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn framework(network: Network) -> Deployments {
        let backend = Arc::new(InMemoryChain::with_chain_id(network.chain_id));
        let artifacts = Artifacts::new().with(ContractArtifact::new(MOCK_CONTRACT, &[0x60, 0x80]));
        let mut named = HashMap::new();
        named.insert("deployer".to_string(), NamedAccount::Index(0));
        Deployments::new(network, backend, Arc::new(InMemoryStore::new()), artifacts, named)
    }

    fn development() -> DevelopmentNetworks {
        DevelopmentNetworks::new(["hardhat", "localhost"])
    }

    fn sepolia_table() -> NetworkConfigTable {
        let mut table = NetworkConfigTable::default();
        table.insert(
            11155111,
            NetworkEntry {
                name: "sepolia".to_string(),
                eth_usd_price_feed: Some(Address::repeat_byte(0x69)),
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

    #[tokio::test]
    async fn test_development_uses_mock() {
        let deployments = framework(Network::new("hardhat", 31337));
        let deployer = deployments.named_account("deployer").await.unwrap();
        let mock = deployments
            .deploy(MOCK_CONTRACT, DeployOptions::new(deployer))
            .await
            .unwrap();

        let source = resolve_price_feed(&deployments, &development(), &sepolia_table()).unwrap();
        assert!(source.is_mock());
        assert_eq!(source.address(), mock.address);
    }

    #[test]
    fn test_development_without_mock_is_lookup_error() {
        let deployments = framework(Network::new("localhost", 31337));
        let err = resolve_price_feed(&deployments, &development(), &sepolia_table()).unwrap_err();
        assert!(matches!(err, DeployError::LookupError(_)));
    }

    #[test]
    fn test_public_uses_configured_feed() {
        let deployments = framework(Network::new("sepolia", 11155111));
        let source = resolve_price_feed(&deployments, &development(), &sepolia_table()).unwrap();
        assert!(!source.is_mock());
        assert_eq!(
            source,
            PriceFeedSource::Public {
                chain_id: 11155111,
                configured_address: Address::repeat_byte(0x69),
            }
        );
    }

    #[test]
    fn test_public_without_feed_is_configuration_error() {
        let table = sepolia_table();
        for network in [Network::new("goerli", 5), Network::new("mainnet", 1)] {
            let deployments = framework(network);
            let err = resolve_price_feed(&deployments, &development(), &table).unwrap_err();
            assert!(matches!(err, DeployError::ConfigurationError(_)));
        }
    }
}
