//! # Chain Client Contract
//!
//! The engine never talks JSON-RPC itself. It describes the contract call it
//! wants as a typed [`ContractCall`] and hands it to a
//! [`ConfidentialTokenChain`] implementation, which owns signing, nonce
//! management, gas, retries at the transport level and timeouts.
//!
//! ```text
//!   engine ──ContractCall──► send_transaction ──TxHash──► wait_for_receipt ──► TxReceipt
//!   engine ──────────────► confidential_balance_of / has_claimed (views)
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::fhe::InputProof;
use crate::types::{Address, Handle, TxHash, TxReceipt};

// ---------------------------------------------------------------------------
// Methods & Calls
// ---------------------------------------------------------------------------

/// Every confidential-token contract entry point the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractMethod {
    MintConfidential,
    BurnConfidential,
    BatchMintConfidential,
    BatchConfidentialTransfer,
    Faucet,
    ConfidentialBalanceOf,
    DiscloseEncryptedAmount,
    HasClaimed,
    AllowSelfBalanceDecrypt,
}

impl ContractMethod {
    /// All methods, in ABI declaration order.
    pub const ALL: [ContractMethod; 9] = [
        Self::MintConfidential,
        Self::BurnConfidential,
        Self::BatchMintConfidential,
        Self::BatchConfidentialTransfer,
        Self::Faucet,
        Self::ConfidentialBalanceOf,
        Self::DiscloseEncryptedAmount,
        Self::HasClaimed,
        Self::AllowSelfBalanceDecrypt,
    ];

    /// The Solidity function name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MintConfidential => "mintConfidential",
            Self::BurnConfidential => "burnConfidential",
            Self::BatchMintConfidential => "batchMintConfidential",
            Self::BatchConfidentialTransfer => "batchConfidentialTransfer",
            Self::Faucet => "faucet",
            Self::ConfidentialBalanceOf => "confidentialBalanceOf",
            Self::DiscloseEncryptedAmount => "discloseEncryptedAmount",
            Self::HasClaimed => "hasClaimed",
            Self::AllowSelfBalanceDecrypt => "allowSelfBalanceDecrypt",
        }
    }
}

impl fmt::Display for ContractMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A state-changing call against a confidential-token contract.
///
/// Batch variants carry parallel arrays. The orchestrator guarantees they
/// are the same length before one of these is ever constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    MintConfidential {
        to: Address,
        handle: Handle,
        proof: InputProof,
    },
    BurnConfidential {
        from: Address,
        handle: Handle,
        proof: InputProof,
    },
    BatchMintConfidential {
        recipients: Vec<Address>,
        handles: Vec<Handle>,
        proofs: Vec<InputProof>,
    },
    BatchConfidentialTransfer {
        recipients: Vec<Address>,
        handles: Vec<Handle>,
        proofs: Vec<InputProof>,
    },
    Faucet {
        handle: Handle,
        proof: InputProof,
    },
    DiscloseEncryptedAmount {
        handle: Handle,
    },
    AllowSelfBalanceDecrypt,
}

impl ContractCall {
    pub fn method(&self) -> ContractMethod {
        match self {
            Self::MintConfidential { .. } => ContractMethod::MintConfidential,
            Self::BurnConfidential { .. } => ContractMethod::BurnConfidential,
            Self::BatchMintConfidential { .. } => ContractMethod::BatchMintConfidential,
            Self::BatchConfidentialTransfer { .. } => ContractMethod::BatchConfidentialTransfer,
            Self::Faucet { .. } => ContractMethod::Faucet,
            Self::DiscloseEncryptedAmount { .. } => ContractMethod::DiscloseEncryptedAmount,
            Self::AllowSelfBalanceDecrypt => ContractMethod::AllowSelfBalanceDecrypt,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported by a chain client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The wallet declined to sign the transaction.
    #[error("transaction rejected by the user")]
    UserRejected,

    /// The call reverted, either at simulation time or once mined.
    #[error("transaction reverted: {reason}")]
    Reverted {
        tx_hash: Option<TxHash>,
        reason: String,
    },

    /// The client gave up waiting.
    #[error("chain request timed out: {0}")]
    Timeout(String),

    /// Transport or node failure.
    #[error("chain rpc error: {0}")]
    Rpc(String),
}

// ---------------------------------------------------------------------------
// Client Trait
// ---------------------------------------------------------------------------

/// Access to deployed confidential-token contracts on one network.
#[async_trait]
pub trait ConfidentialTokenChain: Send + Sync {
    /// `confidentialBalanceOf(account)`.
    async fn confidential_balance_of(
        &self,
        contract: Address,
        account: Address,
    ) -> Result<Handle, ChainError>;

    /// `hasClaimed(account)`.
    async fn has_claimed(&self, contract: Address, account: Address) -> Result<bool, ChainError>;

    /// Signs and broadcasts `call` from `from`. Returns once the transaction
    /// is in the mempool, not once it is mined.
    async fn send_transaction(
        &self,
        contract: Address,
        from: Address,
        call: ContractCall,
    ) -> Result<TxHash, ChainError>;

    /// Waits until `tx_hash` is mined and returns its receipt.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_match_abi() {
        assert_eq!(ContractMethod::Faucet.name(), "faucet");
        assert_eq!(
            ContractMethod::BatchConfidentialTransfer.to_string(),
            "batchConfidentialTransfer"
        );
    }

    #[test]
    fn call_reports_its_method() {
        let call = ContractCall::DiscloseEncryptedAmount {
            handle: Handle::ZERO,
        };
        assert_eq!(call.method(), ContractMethod::DiscloseEncryptedAmount);
        assert_eq!(
            ContractCall::AllowSelfBalanceDecrypt.method(),
            ContractMethod::AllowSelfBalanceDecrypt
        );
    }
}
