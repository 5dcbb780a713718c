//! Deployment record store

use crate::deployments::DeploymentRecord;
use crate::error::{DeployError, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Key-value store of the most recent deployment per `(network, name)`.
/// Implementations must replace older records atomically.
pub trait DeploymentStore: Send + Sync {
    fn save(&self, network: &str, record: &DeploymentRecord) -> Result<()>;
    fn get(&self, network: &str, name: &str) -> Result<Option<DeploymentRecord>>;
    fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>>;
    /// Deletes every record of `network`, returning how many were removed.
    fn clear(&self, network: &str) -> Result<usize>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| DeployError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DeployError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS deployments (
                network TEXT NOT NULL,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                deployed_at TEXT NOT NULL,
                record TEXT NOT NULL,
                PRIMARY KEY (network, name)
            )",
            [],
        )
        .map_err(|e| {
            DeployError::DatabaseError(format!("Failed to create deployments table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS deployment_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                network TEXT NOT NULL,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                deployed_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| {
            DeployError::DatabaseError(format!("Failed to create deployment_history table: {}", e))
        })?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Every address ever recorded for `(network, name)`, oldest first.
    pub fn history(&self, network: &str, name: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT address FROM deployment_history
                 WHERE network = ?1 AND name = ?2 ORDER BY id ASC",
            )
            .map_err(|e| DeployError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(params![network, name], |row| row.get::<_, String>(0))
            .map_err(|e| DeployError::DatabaseError(format!("Failed to query history: {}", e)))?;
        let mut addresses = Vec::new();
        for row in rows {
            addresses.push(
                row.map_err(|e| DeployError::DatabaseError(format!("Failed to read row: {}", e)))?,
            );
        }
        Ok(addresses)
    }
}

impl DeploymentStore for Database {
    fn save(&self, network: &str, record: &DeploymentRecord) -> Result<()> {
        let record_json = serde_json::to_string(record).map_err(|e| {
            DeployError::DatabaseError(format!("Failed to serialize deployment: {}", e))
        })?;
        let deployed_at = record.deployed_at.to_rfc3339();

        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction().map_err(|e| {
            DeployError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;
        tx.execute(
            "INSERT OR REPLACE INTO deployments (network, name, address, deployed_at, record)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![network, record.name, record.address.to_string(), deployed_at, record_json],
        )
        .map_err(|e| DeployError::DatabaseError(format!("Failed to save deployment: {}", e)))?;
        tx.execute(
            "INSERT INTO deployment_history (network, name, address, deployed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![network, record.name, record.address.to_string(), deployed_at],
        )
        .map_err(|e| DeployError::DatabaseError(format!("Failed to save history: {}", e)))?;
        tx.commit().map_err(|e| {
            DeployError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;
        Ok(())
    }

    fn get(&self, network: &str, name: &str) -> Result<Option<DeploymentRecord>> {
        let conn = self.conn.lock();
        let record_json: Option<String> = conn
            .query_row(
                "SELECT record FROM deployments WHERE network = ?1 AND name = ?2",
                params![network, name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DeployError::DatabaseError(format!("Failed to load deployment: {}", e)))?;

        record_json
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    DeployError::DatabaseError(format!("Failed to deserialize deployment: {}", e))
                })
            })
            .transpose()
    }

    fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT record FROM deployments WHERE network = ?1 ORDER BY deployed_at ASC, name ASC")
            .map_err(|e| DeployError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(params![network], |row| row.get::<_, String>(0))
            .map_err(|e| DeployError::DatabaseError(format!("Failed to query deployments: {}", e)))?;

        let mut records = Vec::new();
        for row in rows {
            let json =
                row.map_err(|e| DeployError::DatabaseError(format!("Failed to read row: {}", e)))?;
            let record: DeploymentRecord = serde_json::from_str(&json).map_err(|e| {
                DeployError::DatabaseError(format!("Failed to deserialize deployment: {}", e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn clear(&self, network: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .execute("DELETE FROM deployments WHERE network = ?1", params![network])
            .map_err(|e| DeployError::DatabaseError(format!("Failed to clear deployments: {}", e)))?;
        Ok(removed)
    }
}

/// In-memory store for ephemeral networks and tests.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<BTreeMap<(String, String), DeploymentRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeploymentStore for InMemoryStore {
    fn save(&self, network: &str, record: &DeploymentRecord) -> Result<()> {
        let mut stored = record.clone();
        stored.newly_deployed = false;
        self.records
            .lock()
            .insert((network.to_string(), record.name.clone()), stored);
        Ok(())
    }

    fn get(&self, network: &str, name: &str) -> Result<Option<DeploymentRecord>> {
        Ok(self
            .records
            .lock()
            .get(&(network.to_string(), name.to_string()))
            .cloned())
    }

    fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>> {
        let mut records: Vec<DeploymentRecord> = self
            .records
            .lock()
            .iter()
            .filter(|((net, _), _)| net == network)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| a.deployed_at.cmp(&b.deployed_at).then(a.name.cmp(&b.name)));
        Ok(records)
    }

    fn clear(&self, network: &str) -> Result<usize> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|(net, _), _| net != network);
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::ConstructorArg;
    use alloy::primitives::{Address, TxHash};

    fn record(name: &str, byte: u8) -> DeploymentRecord {
        DeploymentRecord {
            name: name.to_string(),
            address: Address::repeat_byte(byte),
            args: vec![ConstructorArg::Address(Address::repeat_byte(0x22))],
            deployer: Address::repeat_byte(0x01),
            transaction_hash: Some(TxHash::repeat_byte(0xab)),
            block_number: Some(1),
            gas_used: Some(21_000),
            bytecode_hash: "00".repeat(32),
            deployed_at: chrono::Utc::now(),
            newly_deployed: true,
        }
    }

    fn exercise_store(store: &dyn DeploymentStore) {
        assert!(store.get("hardhat", "FundMe").unwrap().is_none());

        store.save("hardhat", &record("FundMe", 0xaa)).unwrap();
        store.save("hardhat", &record("FundMe", 0xbb)).unwrap();
        store.save("sepolia", &record("FundMe", 0xcc)).unwrap();

        let latest = store.get("hardhat", "FundMe").unwrap().unwrap();
        assert_eq!(latest.address, Address::repeat_byte(0xbb));
        assert!(!latest.newly_deployed);
        assert_eq!(latest.args, vec![ConstructorArg::Address(Address::repeat_byte(0x22))]);

        assert_eq!(store.list("hardhat").unwrap().len(), 1);
        assert_eq!(store.clear("hardhat").unwrap(), 1);
        assert!(store.get("hardhat", "FundMe").unwrap().is_none());
        assert!(store.get("sepolia", "FundMe").unwrap().is_some());
    }

    #[test]
    fn test_database_store() {
        let db = Database::open_in_memory().unwrap();
        exercise_store(&db);
        assert_eq!(db.history("hardhat", "FundMe").unwrap().len(), 2);
    }

    #[test]
    fn test_in_memory_store() {
        exercise_store(&InMemoryStore::new());
    }

    #[test]
    fn test_database_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/deployments.db");
        {
            let db = Database::open(&path).unwrap();
            db.save("sepolia", &record("MockV3Aggregator", 0x42)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        let loaded = db.get("sepolia", "MockV3Aggregator").unwrap().unwrap();
        assert_eq!(loaded.address, Address::repeat_byte(0x42));
    }
}
