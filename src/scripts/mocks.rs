//! Mock price feed for development networks

use super::{DeployContext, DeployScript, StepReport};
use crate::abi::ConstructorArg;
use crate::deployments::{DeployOptions, DeploymentRecord};
use crate::error::{DeployError, Result};
use alloy::primitives::I256;
use async_trait::async_trait;

pub const MOCK_CONTRACT: &str = "MockV3Aggregator";

pub struct MockProvisioner;

impl MockProvisioner {
    /// Deploys the mock price feed on development networks. Does nothing on
    /// any other network.
    pub async fn provision(ctx: &DeployContext) -> Result<Option<DeploymentRecord>> {
        if !ctx.is_development() {
            return Ok(None);
        }

        let deployments = &ctx.deployments;
        let deployer = deployments.named_account("deployer").await?;
        let initial_answer = I256::try_from(ctx.mock_params.initial_answer).map_err(|e| {
            DeployError::AbiError(format!(
                "initial answer {} is not an int256: {}",
                ctx.mock_params.initial_answer, e
            ))
        })?;

        deployments.log("Development network detected, deploying mocks");
        let record = deployments
            .deploy(
                MOCK_CONTRACT,
                DeployOptions::new(deployer)
                    .args(vec![
                        ConstructorArg::Uint8(ctx.mock_params.decimals),
                        ConstructorArg::Int256(initial_answer),
                    ])
                    .log(true),
            )
            .await?;
        deployments.log("Mocks deployed");
        deployments.log("---------------------------------------------------");
        Ok(Some(record))
    }
}

#[async_trait]
impl DeployScript for MockProvisioner {
    fn id(&self) -> &'static str {
        "mocks"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "mocks"]
    }

    async fn run(&self, ctx: &DeployContext) -> Result<StepReport> {
        let mut report = StepReport::new(self.id());
        if let Some(record) = Self::provision(ctx).await? {
            report.deployments.push(record);
        }
        Ok(report)
    }
}
