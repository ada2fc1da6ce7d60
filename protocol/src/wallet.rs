//! Signing wallet contract.
//!
//! The engine needs exactly two things from a wallet: the account address
//! it signs for, and a typed-data signature over a decryption consent.
//! Transaction signing is the chain client's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::fhe::ConsentPayload;
use crate::types::Address;

/// Wallet failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The user dismissed or declined the prompt.
    #[error("signature request rejected by the user")]
    Rejected,

    /// No wallet connected, or it is locked.
    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// A signature over a consent payload, as raw bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSignature(Vec<u8>);

impl ConsentSignature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `0x`-prefixed hex, the way wallets return it.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    /// Bare hex without the `0x` prefix, the way the decryption oracle
    /// wants it.
    pub fn to_oracle_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for ConsentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_oracle_hex();
        write!(f, "ConsentSignature({}…)", &hex[..hex.len().min(16)])
    }
}

/// The account holder's signing wallet.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// The account this wallet signs for.
    fn address(&self) -> Address;

    /// Prompts the holder to sign `payload` as structured typed data.
    async fn sign_typed_data(&self, payload: &ConsentPayload) -> Result<ConsentSignature, WalletError>;
}
