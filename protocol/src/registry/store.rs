//! # Deployed-Token Store
//!
//! Tokens the user deployed themselves are remembered locally and merged
//! into resolution after the static registry. The store is a plain
//! load/save contract so the host decides where the list lives: in memory
//! for tests, in a `sled` tree for the CLI.
//!
//! The whole list is read and written as one JSON document under a single
//! key. It holds a handful of entries; anything fancier is wasted effort.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::Address;

/// Key under which the deployed-token list is persisted.
pub const DEPLOYED_TOKENS_KEY: &str = "deployedContracts";

/// Errors raised by a [`DeployedTokenStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("stored token list is corrupt: {0}")]
    Corrupt(String),
}

/// A confidential-token contract deployed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedToken {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub decimals: u8,
    pub network_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    pub deployed_at: DateTime<Utc>,
}

/// Get/set persistence for the deployed-token list.
pub trait DeployedTokenStore: Send + Sync {
    fn load(&self) -> Result<Vec<DeployedToken>, StoreError>;

    fn save(&self, tokens: &[DeployedToken]) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Volatile store. Forgets everything on drop.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Vec<DeployedToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeployedTokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Vec<DeployedToken>, StoreError> {
        Ok(self.tokens.read().clone())
    }

    fn save(&self, tokens: &[DeployedToken]) -> Result<(), StoreError> {
        *self.tokens.write() = tokens.to_vec();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// sled
// ---------------------------------------------------------------------------

/// Persistent store backed by an embedded `sled` database.
#[derive(Debug, Clone)]
pub struct SledTokenStore {
    db: sled::Db,
}

impl SledTokenStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// A throwaway database, removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }
}

impl DeployedTokenStore for SledTokenStore {
    fn load(&self) -> Result<Vec<DeployedToken>, StoreError> {
        let raw = self
            .db
            .get(DEPLOYED_TOKENS_KEY)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match raw {
            None => Ok(Vec::new()),
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
            }
        }
    }

    fn save(&self, tokens: &[DeployedToken]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(tokens).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.db
            .insert(DEPLOYED_TOKENS_KEY, bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(symbol: &str) -> DeployedToken {
        DeployedToken {
            symbol: symbol.to_string(),
            name: format!("{symbol} token"),
            address: Address::from_bytes([9u8; 20]),
            decimals: 18,
            network_id: 11_155_111,
            deployer: None,
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_empty());
        store.save(&[sample("zGOLD")]).unwrap();
        assert_eq!(store.load().unwrap()[0].symbol, "zGOLD");
    }

    #[test]
    fn sled_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens");
        {
            let store = SledTokenStore::open(&path).unwrap();
            store.save(&[sample("zGOLD"), sample("zSILVER")]).unwrap();
        }
        let reopened = SledTokenStore::open(&path).unwrap();
        let tokens = reopened.load().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].symbol, "zSILVER");
    }

    #[test]
    fn sled_store_reports_corruption() {
        let store = SledTokenStore::temporary().unwrap();
        store.db.insert(DEPLOYED_TOKENS_KEY, b"not json".to_vec()).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }
}
