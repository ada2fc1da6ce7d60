//! Error types for the confidential-token engine.
//!
//! Every engine operation that can fail returns an [`EngineError`]. The
//! collaborator error types (chain, wallet, encryption, oracle, store)
//! convert into it with `?`, so component code never matches on transport
//! details it cannot act on.
//!
//! None of these are fatal. After any failure the engine accepts the next
//! operation on the same or another token; retrying is the caller's call.

use thiserror::Error;

use crate::chain::{ChainError, ContractMethod};
use crate::fhe::{EncryptionError, OracleError};
use crate::registry::{StoreError, TokenSymbol};
use crate::types::Address;
use crate::wallet::WalletError;

/// Errors surfaced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The symbol is in neither the static registry nor the deployed-token store.
    #[error("unknown token symbol: {0}")]
    UnknownSymbol(String),

    /// The token has no contract on the current network.
    #[error("{symbol} is not deployed on network {network_id}")]
    NotDeployed {
        symbol: TokenSymbol,
        network_id: u64,
    },

    /// The encryption service is missing, not initialized, or failed.
    #[error("encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// Batch recipients and amounts differ in length.
    #[error("recipients and amounts length mismatch: {recipients} recipients, {amounts} amounts")]
    ArityMismatch { recipients: usize, amounts: usize },

    /// The token binding changed while the operation was suspended. Never
    /// shown to the user; the operation just stops.
    #[error("binding for {symbol} changed mid-flight, continuation abandoned")]
    Stale { symbol: TokenSymbol },

    /// The faucet was already claimed by this account.
    #[error("{account} has already claimed {symbol}; each token can only be claimed once")]
    AlreadyClaimed {
        account: Address,
        symbol: TokenSymbol,
    },

    /// The user declined a wallet prompt.
    #[error("request rejected in wallet")]
    UserRejected,

    /// The transaction reverted on-chain.
    #[error("transaction reverted: {reason}")]
    TransactionReverted {
        tx_hash: Option<String>,
        reason: String,
    },

    /// The oracle answered with the wrong type for the handle.
    #[error("invalid decryption result: {0}")]
    InvalidResult(String),

    /// The oracle refused or failed the request.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The amount cannot be represented once scaled.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The bound contract does not expose the method the operation needs.
    #[error("{symbol} contract does not support {method}")]
    UnsupportedOperation {
        symbol: TokenSymbol,
        method: ContractMethod,
    },

    /// An operation was asked to act for an account other than the wallet's.
    #[error("account mismatch: wallet is {expected}, request names {got}")]
    AccountMismatch { expected: Address, got: Address },

    /// A disclosure handshake for this (account, token) is already running.
    #[error("a balance reveal for {account} on {symbol} is already in progress")]
    HandshakeInProgress {
        account: Address,
        symbol: TokenSymbol,
    },

    /// Wallet unavailable or failed for reasons other than rejection.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Chain transport, node, or timeout failure.
    #[error("chain error: {0}")]
    Chain(String),

    /// Deployed-token store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration or registry data.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Errors the presentation layer should not display.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

impl From<ChainError> for EngineError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::UserRejected => Self::UserRejected,
            ChainError::Reverted { tx_hash, reason } => Self::TransactionReverted {
                tx_hash: tx_hash.map(|h| h.to_hex()),
                reason,
            },
            ChainError::Timeout(msg) | ChainError::Rpc(msg) => Self::Chain(msg),
        }
    }
}

impl From<WalletError> for EngineError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected => Self::UserRejected,
            WalletError::Unavailable(msg) | WalletError::SigningFailed(msg) => Self::Wallet(msg),
        }
    }
}

impl From<EncryptionError> for EngineError {
    fn from(err: EncryptionError) -> Self {
        Self::EncryptionUnavailable(err.to_string())
    }
}

impl From<OracleError> for EngineError {
    fn from(err: OracleError) -> Self {
        Self::DecryptionFailed(err.to_string())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}
