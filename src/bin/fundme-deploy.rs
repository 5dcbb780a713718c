#![forbid(unsafe_code)]
//! Runs the FundMe deploy steps against a network

use clap::Parser;
use colored::*;
use fundme_deploy::cli::{init_logging, open_deployments};
use fundme_deploy::config::{load_config, VerificationPolicy, DEFAULT_CONFIG_PATH};
use fundme_deploy::runner::{context_from_config, DeployRunner};
use fundme_deploy::verify::{CommandVerifier, VerificationOutcome};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deploy the FundMe contract and its price feed", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Network to deploy to
    #[arg(long, default_value = "hardhat")]
    network: String,

    /// Only run steps carrying one of these tags (all, mocks, fundme)
    #[arg(long, value_delimiter = ',', default_value = "all")]
    tags: Vec<String>,

    /// Forget stored deployments of the network before running
    #[arg(long, default_value_t = false)]
    reset: bool,

    /// Abort when source verification fails
    #[arg(long, default_value_t = false)]
    strict_verify: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if cli.strict_verify {
        config.verification.policy = VerificationPolicy::Strict;
    }

    let deployments = open_deployments(&config, &cli.network).await?;
    if cli.reset {
        let removed = deployments.reset()?;
        println!("{}", format!("Forgot {} stored deployment(s)", removed).yellow());
    }

    let verifier = Arc::new(CommandVerifier::from_config(&config.verification)?);
    let ctx = context_from_config(&config, deployments, verifier)?;
    let runner = DeployRunner::with_default_scripts();

    let summary = match runner.run(&ctx, &cli.tags).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("{}", format!("Deployment aborted: {}", e).red().bold());
            return Err(e.into());
        }
    };

    if summary.is_empty() {
        println!(
            "{}",
            format!("No deploy step matches tags {:?}", cli.tags).yellow()
        );
        return Ok(());
    }

    println!();
    println!(
        "{}",
        format!("Deployments on '{}'", summary.network).bright_green().bold()
    );
    for (name, account) in ctx.deployments.named_accounts().await? {
        println!("  {:<18} {}", name.bright_white(), account.to_string().dimmed());
    }
    for record in summary.deployments() {
        let state = if record.newly_deployed {
            "deployed".bright_green()
        } else {
            "reused".bright_yellow()
        };
        println!(
            "  {:<18} {} {}",
            record.name.bright_white(),
            record.address.to_string().cyan(),
            state
        );
    }
    for step in &summary.steps {
        match &step.verification {
            Some(VerificationOutcome::Verified) => println!("  {}", "source verified".green()),
            Some(VerificationOutcome::AlreadyVerified) => {
                println!("  {}", "source already verified".green())
            }
            Some(VerificationOutcome::Failed(reason)) => {
                println!("  {}", format!("verification failed: {}", reason).red())
            }
            Some(VerificationOutcome::Skipped) | None => {}
        }
    }

    Ok(())
}
