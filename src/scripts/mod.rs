//! Deploy steps run by the runner, in registration order.

pub mod fund_me;
pub mod mocks;

use crate::config::{MockParams, VerificationPolicy};
use crate::deployments::{DeploymentRecord, Deployments};
use crate::error::Result;
use crate::network::{DevelopmentNetworks, NetworkConfigTable};
use crate::verify::{VerificationOutcome, Verifier};
use async_trait::async_trait;
use std::sync::Arc;

pub use fund_me::{resolve_price_feed, FundMeDeployer, FundMeDeployment, PriceFeedSource, FUND_ME_CONTRACT};
pub use mocks::{MockProvisioner, MOCK_CONTRACT};

/// Everything a deploy step may read during one run.
pub struct DeployContext {
    pub deployments: Deployments,
    pub development_networks: DevelopmentNetworks,
    pub network_table: NetworkConfigTable,
    pub mock_params: MockParams,
    pub verifier: Arc<dyn Verifier>,
    pub verification_policy: VerificationPolicy,
    /// Explorer API credential, if present in the environment.
    pub api_key: Option<String>,
}

impl DeployContext {
    pub fn is_development(&self) -> bool {
        self.development_networks.contains(self.deployments.network())
    }
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: &'static str,
    pub deployments: Vec<DeploymentRecord>,
    pub verification: Option<VerificationOutcome>,
}

impl StepReport {
    pub fn new(step: &'static str) -> Self {
        Self {
            step,
            deployments: Vec::new(),
            verification: None,
        }
    }
}

#[async_trait]
pub trait DeployScript: Send + Sync {
    fn id(&self) -> &'static str;

    fn tags(&self) -> &'static [&'static str];

    async fn run(&self, ctx: &DeployContext) -> Result<StepReport>;
}
