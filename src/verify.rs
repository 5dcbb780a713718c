//! Source verification with a block explorer.
//!
//! The explorer client itself lives outside this crate. `CommandVerifier`
//! delegates to an external program (by default `npx hardhat verify`) and
//! interprets its exit status and output.

use crate::abi::ConstructorArg;
use crate::config::{VerificationConfig, VerificationPolicy};
use crate::error::{DeployError, Result};
use crate::network::Network;
use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub network: Network,
    pub address: Address,
    pub constructor_args: Vec<ConstructorArg>,
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Verified,
    AlreadyVerified,
}

/// What happened to the verification step of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Development network or no API credential.
    Skipped,
    Verified,
    AlreadyVerified,
    /// Failed and tolerated by policy.
    Failed(String),
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerifyStatus>;
}

pub struct CommandVerifier {
    program: String,
    base_args: Vec<String>,
    api_key_env: String,
}

impl CommandVerifier {
    pub fn new(program: impl Into<String>, base_args: Vec<String>, api_key_env: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
            api_key_env: api_key_env.into(),
        }
    }

    pub fn from_config(config: &VerificationConfig) -> Result<Self> {
        let (program, rest) = config.command.split_first().ok_or_else(|| {
            DeployError::ConfigurationError("verification.command must name a program".to_string())
        })?;
        Ok(Self::new(program.clone(), rest.to_vec(), config.api_key_env.clone()))
    }

    fn command_args(&self, request: &VerificationRequest) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("--network".to_string());
        args.push(request.network.name.clone());
        args.push(request.address.to_string());
        args.extend(request.constructor_args.iter().map(ToString::to_string));
        args
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerifyStatus> {
        let args = self.command_args(request);
        info!("Verifying contract at {}...", request.address);
        let output = Command::new(&self.program)
            .args(&args)
            .env(&self.api_key_env, &request.api_key)
            .output()
            .await
            .map_err(|e| {
                DeployError::VerificationError(format!("failed to run {}: {}", self.program, e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}\n{}", stdout, stderr).to_lowercase();

        if combined.contains("already verified") {
            return Ok(VerifyStatus::AlreadyVerified);
        }
        if output.status.success() {
            return Ok(VerifyStatus::Verified);
        }
        let detail = stderr
            .lines()
            .chain(stdout.lines())
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no output")
            .trim()
            .to_string();
        Err(DeployError::VerificationError(format!(
            "{} exited with {}: {}",
            self.program, output.status, detail
        )))
    }
}

/// Runs `verifier` and applies `policy` to failures: tolerated failures are
/// logged and reported as `Failed`, strict failures propagate.
pub async fn verify_with_policy(
    verifier: &dyn Verifier,
    policy: VerificationPolicy,
    request: &VerificationRequest,
) -> Result<VerificationOutcome> {
    match verifier.verify(request).await {
        Ok(VerifyStatus::Verified) => {
            info!("Verified {}", request.address);
            Ok(VerificationOutcome::Verified)
        }
        Ok(VerifyStatus::AlreadyVerified) => {
            info!("{} is already verified", request.address);
            Ok(VerificationOutcome::AlreadyVerified)
        }
        Err(err) => match policy {
            VerificationPolicy::Tolerate => {
                warn!("Verification of {} failed: {}", request.address, err);
                Ok(VerificationOutcome::Failed(err.to_string()))
            }
            VerificationPolicy::Strict => Err(match err {
                DeployError::VerificationError(_) => err,
                other => DeployError::VerificationError(other.to_string()),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingVerifier;

    #[async_trait]
    impl Verifier for FailingVerifier {
        async fn verify(&self, _request: &VerificationRequest) -> Result<VerifyStatus> {
            Err(DeployError::VerificationError("explorer unavailable".into()))
        }
    }

    fn request() -> VerificationRequest {
        VerificationRequest {
            network: Network::new("sepolia", 11155111),
            address: Address::repeat_byte(0x42),
            constructor_args: vec![ConstructorArg::Address(Address::repeat_byte(0x11))],
            api_key: "key".into(),
        }
    }

    #[tokio::test]
    async fn test_tolerate_policy_swallows_failure() {
        let outcome = verify_with_policy(&FailingVerifier, VerificationPolicy::Tolerate, &request())
            .await
            .unwrap();
        assert!(matches!(outcome, VerificationOutcome::Failed(msg) if msg.contains("explorer unavailable")));
    }

    #[tokio::test]
    async fn test_strict_policy_propagates_failure() {
        let err = verify_with_policy(&FailingVerifier, VerificationPolicy::Strict, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::VerificationError(_)));
    }

    #[test]
    fn test_command_arguments() {
        let verifier = CommandVerifier::from_config(&VerificationConfig::default()).unwrap();
        assert_eq!(
            verifier.command_args(&request()),
            vec![
                "hardhat".to_string(),
                "verify".to_string(),
                "--network".to_string(),
                "sepolia".to_string(),
                format!("0x{}", "42".repeat(20)),
                format!("0x{}", "11".repeat(20)),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status_is_interpreted() {
        let ok = CommandVerifier::new("true", Vec::new(), "ETHERSCAN_API_KEY");
        assert_eq!(ok.verify(&request()).await.unwrap(), VerifyStatus::Verified);

        let failing = CommandVerifier::new("false", Vec::new(), "ETHERSCAN_API_KEY");
        assert!(matches!(
            failing.verify(&request()).await,
            Err(DeployError::VerificationError(_))
        ));

        let missing = CommandVerifier::new("/nonexistent/verify-bin", Vec::new(), "ETHERSCAN_API_KEY");
        assert!(matches!(
            missing.verify(&request()).await,
            Err(DeployError::VerificationError(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_already_verified_output() {
        let verifier = CommandVerifier::new(
            "sh",
            vec!["-c".to_string(), "echo 'Contract source code already verified'; exit 1".to_string()],
            "ETHERSCAN_API_KEY",
        );
        assert_eq!(
            verifier.verify(&request()).await.unwrap(),
            VerifyStatus::AlreadyVerified
        );
    }
}
