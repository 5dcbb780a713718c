//! Runs registered deploy steps selected by tag.

use crate::config::Config;
use crate::deployments::{DeploymentRecord, Deployments};
use crate::error::Result;
use crate::scripts::{DeployContext, DeployScript, FundMeDeployer, MockProvisioner, StepReport};
use crate::verify::Verifier;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_TAG: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub network: String,
    pub steps: Vec<StepReport>,
}

impl RunSummary {
    pub fn deployments(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.steps.iter().flat_map(|s| s.deployments.iter())
    }

    pub fn step(&self, id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == id)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Default)]
pub struct DeployRunner {
    scripts: Vec<Box<dyn DeployScript>>,
}

impl DeployRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The project's steps: mocks first, then FundMe.
    pub fn with_default_scripts() -> Self {
        let mut runner = Self::new();
        runner.register(Box::new(MockProvisioner));
        runner.register(Box::new(FundMeDeployer));
        runner
    }

    pub fn register(&mut self, script: Box<dyn DeployScript>) {
        self.scripts.push(script);
    }

    /// Steps carrying any of `tags`, in registration order. No tags means
    /// `all`.
    pub fn scripts_for(&self, tags: &[String]) -> Vec<&dyn DeployScript> {
        let default_tags = [DEFAULT_TAG.to_string()];
        let tags = if tags.is_empty() { &default_tags[..] } else { tags };
        self.scripts
            .iter()
            .filter(|script| script.tags().iter().any(|t| tags.iter().any(|w| w == t)))
            .map(|script| script.as_ref())
            .collect()
    }

    /// Runs the selected steps one after another. The first error aborts the run.
    pub async fn run(&self, ctx: &DeployContext, tags: &[String]) -> Result<RunSummary> {
        let network = ctx.deployments.network().name.clone();
        let selected = self.scripts_for(tags);
        info!(
            "Running {} deploy step(s) on network '{}'",
            selected.len(),
            network
        );

        let mut steps = Vec::with_capacity(selected.len());
        for script in selected {
            info!("Step '{}'", script.id());
            steps.push(script.run(ctx).await?);
        }
        Ok(RunSummary { network, steps })
    }
}

/// Builds the context of a run from configuration. The API credential is read
/// from the environment variable named in `verification.api_key_env`.
pub fn context_from_config(
    config: &Config,
    deployments: Deployments,
    verifier: Arc<dyn Verifier>,
) -> Result<DeployContext> {
    Ok(DeployContext {
        deployments,
        development_networks: config.helper.development_networks(),
        network_table: config.helper.network_table()?,
        mock_params: config.helper.mock_params(),
        verifier,
        verification_policy: config.verification.policy,
        api_key: config.verification.api_key(),
    })
}
