//! Error types for fundme-deploy

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// A deployment record that a step depends on does not exist.
    LookupError(String),
    /// Static configuration is missing an entry or field.
    ConfigurationError(String),
    /// A transaction reverted or never confirmed.
    TransactionError(String),
    /// The external verification collaborator failed.
    VerificationError(String),
    RpcError(String),
    DatabaseError(String),
    ArtifactError(String),
    AbiError(String),
    IoError(String),
    SerializationError(String),
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeployError::LookupError(msg) => write!(f, "No deployment found: {}", msg),
            DeployError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            DeployError::TransactionError(msg) => write!(f, "Transaction failed: {}", msg),
            DeployError::VerificationError(msg) => write!(f, "Verification failed: {}", msg),
            DeployError::RpcError(msg) => write!(f, "RPC error: {}", msg),
            DeployError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            DeployError::ArtifactError(msg) => write!(f, "Artifact error: {}", msg),
            DeployError::AbiError(msg) => write!(f, "ABI error: {}", msg),
            DeployError::IoError(msg) => write!(f, "IO error: {}", msg),
            DeployError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for DeployError {}

impl DeployError {
    /// Errors that abort a deployment run. Verification failures are
    /// subject to the configured verification policy instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeployError::VerificationError(_))
    }
}

impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        DeployError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        DeployError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for DeployError {
    fn from(err: toml::de::Error) -> Self {
        DeployError::ConfigurationError(err.to_string())
    }
}

impl From<alloy::transports::TransportError> for DeployError {
    fn from(err: alloy::transports::TransportError) -> Self {
        DeployError::RpcError(err.to_string())
    }
}

impl From<rusqlite::Error> for DeployError {
    fn from(err: rusqlite::Error) -> Self {
        DeployError::DatabaseError(err.to_string())
    }
}

impl From<alloy::sol_types::Error> for DeployError {
    fn from(err: alloy::sol_types::Error) -> Self {
        DeployError::AbiError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, DeployError>;
