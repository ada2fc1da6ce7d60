//! Decryption oracle contract.
//!
//! The oracle takes a batch of `(handle, contract)` pairs plus a signed
//! consent and answers with the cleartext for every handle it was allowed
//! to open. The request shape is the wire shape: strings where the oracle
//! wants strings, no `0x` on the signature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{Address, ClearValue, Handle};

/// Oracle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The consent signature did not verify against the account.
    #[error("consent signature rejected")]
    BadSignature,

    /// The validity window has not started or has lapsed.
    #[error("consent outside its validity window")]
    Expired,

    /// The account is not allowed to decrypt this handle.
    #[error("handle {0} is not decryptable by the requesting account")]
    NotAuthorized(Handle),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// One handle to open, and the contract it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiphertextRequest {
    pub handle: Handle,
    pub contract_address: Address,
}

/// A user-decryption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptRequest {
    pub ciphertext_requests: Vec<CiphertextRequest>,
    pub ephemeral_private_key: String,
    pub ephemeral_public_key: String,
    /// Hex, no `0x` prefix.
    pub consent_signature: String,
    pub contract_addresses: Vec<Address>,
    pub account: Address,
    /// Unix seconds, as a decimal string.
    pub validity_start: String,
    pub validity_duration_days: String,
}

/// The decryption oracle.
#[async_trait]
pub trait DecryptionOracle: Send + Sync {
    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<HashMap<Handle, ClearValue>, OracleError>;
}
