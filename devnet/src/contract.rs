//! # Confidential Token Contract (simulated)
//!
//! The on-chain half of a confidential token: encrypted balances, a
//! one-shot faucet, owner-gated minting, and a per-handle decryption ACL.
//!
//! ## Rules
//!
//! - Every encrypted input must carry a proof issued for this contract and
//!   the transaction sender.
//! - `mintConfidential`, `batchMintConfidential` and `burnConfidential` are
//!   owner-only.
//! - `faucet` works once per account, ever.
//! - Every balance change produces a fresh handle with an empty ACL. The
//!   holder has to disclose it before the oracle will open it.
//! - Arithmetic is checked; a burn or transfer beyond the balance reverts.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use ctoken_protocol::chain::ContractCall;
use ctoken_protocol::fhe::InputProof;
use ctoken_protocol::types::{Address, Handle};

use crate::coprocessor::{Coprocessor, CoprocessorError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Revert reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("caller is not the owner")]
    NotOwner,

    #[error("invalid input proof")]
    InvalidProof,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("already claimed")]
    AlreadyClaimed,

    #[error("array length mismatch")]
    LengthMismatch,

    #[error("handle is not the caller's current balance")]
    NotBalanceHandle,

    #[error("caller has no balance to disclose")]
    NoBalance,

    #[error("balance overflow")]
    Overflow,

    #[error("coprocessor: {0}")]
    Coprocessor(#[from] CoprocessorError),
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Public metadata of a deployed token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub address: Address,
    pub owner: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// One deployed confidential token.
#[derive(Debug, Clone)]
pub struct ConfidentialTokenContract {
    info: ContractInfo,
    balances: HashMap<Address, Handle>,
    claimed: HashSet<Address>,
    acl: HashMap<Handle, HashSet<Address>>,
}

impl ConfidentialTokenContract {
    pub fn new(info: ContractInfo) -> Self {
        Self {
            info,
            balances: HashMap::new(),
            claimed: HashSet::new(),
            acl: HashMap::new(),
        }
    }

    pub fn info(&self) -> &ContractInfo {
        &self.info
    }

    /// `confidentialBalanceOf(account)`. Zero handle if never credited.
    pub fn balance_of(&self, account: &Address) -> Handle {
        self.balances.get(account).copied().unwrap_or(Handle::ZERO)
    }

    /// `hasClaimed(account)`.
    pub fn has_claimed(&self, account: &Address) -> bool {
        self.claimed.contains(account)
    }

    /// Whether `account` may user-decrypt `handle`.
    pub fn is_allowed(&self, handle: &Handle, account: &Address) -> bool {
        self.acl
            .get(handle)
            .map(|allowed| allowed.contains(account))
            .unwrap_or(false)
    }

    /// Executes a state-changing call from `sender`. On error nothing has
    /// changed.
    pub fn execute(
        &mut self,
        sender: Address,
        call: ContractCall,
        cop: &Coprocessor,
    ) -> Result<(), ContractError> {
        let checkpoint = self.balances.clone();
        let result = self.apply(sender, call, cop);
        if result.is_err() {
            self.balances = checkpoint;
        }
        result
    }

    fn apply(
        &mut self,
        sender: Address,
        call: ContractCall,
        cop: &Coprocessor,
    ) -> Result<(), ContractError> {
        match call {
            ContractCall::MintConfidential { to, handle, proof } => {
                self.require_owner(&sender)?;
                let amount = self.verified_amount(cop, sender, &handle, &proof)?;
                self.credit(cop, to, amount)
            }
            ContractCall::BurnConfidential {
                from,
                handle,
                proof,
            } => {
                self.require_owner(&sender)?;
                let amount = self.verified_amount(cop, sender, &handle, &proof)?;
                self.debit(cop, from, amount)
            }
            ContractCall::BatchMintConfidential {
                recipients,
                handles,
                proofs,
            } => {
                self.require_owner(&sender)?;
                let amounts = self.verified_batch(cop, sender, &recipients, &handles, &proofs)?;
                self.credit_all(cop, &recipients, &amounts)
            }
            ContractCall::BatchConfidentialTransfer {
                recipients,
                handles,
                proofs,
            } => {
                let amounts = self.verified_batch(cop, sender, &recipients, &handles, &proofs)?;
                let total = amounts
                    .iter()
                    .try_fold(0u64, |acc, a| acc.checked_add(*a))
                    .ok_or(ContractError::InsufficientBalance)?;
                self.debit(cop, sender, total)?;
                self.credit_all(cop, &recipients, &amounts)
            }
            ContractCall::Faucet { handle, proof } => {
                if self.claimed.contains(&sender) {
                    return Err(ContractError::AlreadyClaimed);
                }
                let amount = self.verified_amount(cop, sender, &handle, &proof)?;
                self.credit(cop, sender, amount)?;
                self.claimed.insert(sender);
                Ok(())
            }
            ContractCall::DiscloseEncryptedAmount { handle } => {
                if self.balance_of(&sender) != handle || handle.is_zero() {
                    return Err(ContractError::NotBalanceHandle);
                }
                self.allow(handle, sender);
                Ok(())
            }
            ContractCall::AllowSelfBalanceDecrypt => {
                let handle = self.balance_of(&sender);
                if handle.is_zero() {
                    return Err(ContractError::NoBalance);
                }
                self.allow(handle, sender);
                Ok(())
            }
        }
    }

    fn require_owner(&self, sender: &Address) -> Result<(), ContractError> {
        if *sender != self.info.owner {
            return Err(ContractError::NotOwner);
        }
        Ok(())
    }

    fn verified_amount(
        &self,
        cop: &Coprocessor,
        sender: Address,
        handle: &Handle,
        proof: &InputProof,
    ) -> Result<u64, ContractError> {
        if !cop.verify_input(handle, proof, &self.info.address, &sender) {
            return Err(ContractError::InvalidProof);
        }
        Ok(cop.unseal(handle)?)
    }

    fn verified_batch(
        &self,
        cop: &Coprocessor,
        sender: Address,
        recipients: &[Address],
        handles: &[Handle],
        proofs: &[InputProof],
    ) -> Result<Vec<u64>, ContractError> {
        if recipients.len() != handles.len() || handles.len() != proofs.len() {
            return Err(ContractError::LengthMismatch);
        }
        handles
            .iter()
            .zip(proofs)
            .map(|(handle, proof)| self.verified_amount(cop, sender, handle, proof))
            .collect()
    }

    fn current(&self, cop: &Coprocessor, account: &Address) -> Result<u64, ContractError> {
        let handle = self.balance_of(account);
        if handle.is_zero() {
            return Ok(0);
        }
        Ok(cop.unseal(&handle)?)
    }

    fn credit(&mut self, cop: &Coprocessor, account: Address, amount: u64) -> Result<(), ContractError> {
        let next = self
            .current(cop, &account)?
            .checked_add(amount)
            .ok_or(ContractError::Overflow)?;
        let handle = cop.seal(next)?;
        self.balances.insert(account, handle);
        Ok(())
    }

    fn debit(&mut self, cop: &Coprocessor, account: Address, amount: u64) -> Result<(), ContractError> {
        let next = self
            .current(cop, &account)?
            .checked_sub(amount)
            .ok_or(ContractError::InsufficientBalance)?;
        let handle = cop.seal(next)?;
        self.balances.insert(account, handle);
        Ok(())
    }

    fn credit_all(
        &mut self,
        cop: &Coprocessor,
        recipients: &[Address],
        amounts: &[u64],
    ) -> Result<(), ContractError> {
        for (to, amount) in recipients.iter().zip(amounts) {
            self.credit(cop, *to, *amount)?;
        }
        Ok(())
    }

    fn allow(&mut self, handle: Handle, account: Address) {
        self.acl.entry(handle).or_default().insert(account);
    }
}
