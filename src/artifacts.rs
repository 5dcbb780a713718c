//! Compiled contract artifacts.
//!
//! Artifacts use the Hardhat JSON layout (`contractName`, `abi`, `bytecode`).
//! `Artifacts::load_dir` walks a directory recursively and indexes every
//! artifact by contract name; debug files (`*.dbg.json`) are skipped.

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(default)]
    pub abi: serde_json::Value,
    pub bytecode: String,
}

impl ContractArtifact {
    pub fn new(contract_name: impl Into<String>, bytecode: &[u8]) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi: serde_json::Value::Array(Vec::new()),
            bytecode: format!("0x{}", hex::encode(bytecode)),
        }
    }

    pub fn bytecode_bytes(&self) -> Result<Vec<u8>> {
        let stripped = self.bytecode.strip_prefix("0x").unwrap_or(&self.bytecode);
        let bytes = hex::decode(stripped).map_err(|e| {
            DeployError::ArtifactError(format!(
                "artifact '{}' has invalid bytecode: {}",
                self.contract_name, e
            ))
        })?;
        if bytes.is_empty() {
            return Err(DeployError::ArtifactError(format!(
                "artifact '{}' has no bytecode (abstract contract or interface?)",
                self.contract_name
            )));
        }
        Ok(bytes)
    }

    /// Hex SHA-256 of the creation bytecode, used to detect changed contracts.
    pub fn bytecode_hash(&self) -> Result<String> {
        Ok(hex::encode(Sha256::digest(self.bytecode_bytes()?)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    by_name: HashMap<String, ContractArtifact>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: ContractArtifact) {
        self.by_name.insert(artifact.contract_name.clone(), artifact);
    }

    pub fn with(mut self, artifact: ContractArtifact) -> Self {
        self.insert(artifact);
        self
    }

    pub fn get(&self, name: &str) -> Result<&ContractArtifact> {
        self.by_name.get(name).ok_or_else(|| {
            DeployError::ArtifactError(format!("no artifact for contract '{}'", name))
        })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self> {
        let mut artifacts = Self::new();
        let root = path.as_ref();
        if !root.is_dir() {
            return Err(DeployError::ArtifactError(format!(
                "artifacts directory {} does not exist, compile the contracts first",
                root.display()
            )));
        }
        artifacts.scan(root)?;
        tracing::debug!("Loaded {} artifacts from {}", artifacts.len(), root.display());
        Ok(artifacts)
    }

    fn scan(&mut self, dir: &Path) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.scan(&path)?;
                continue;
            }
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if !file_name.ends_with(".json") || file_name.ends_with(".dbg.json") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            // Build-info and other JSON files lack the artifact fields
            match serde_json::from_str::<ContractArtifact>(&contents) {
                Ok(artifact) => self.insert(artifact),
                Err(e) => tracing::trace!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}
