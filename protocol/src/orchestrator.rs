//! # Transaction Orchestrator
//!
//! Runs every state-changing confidential-token operation through the same
//! pipeline:
//!
//! ```text
//! acquire minting guard
//!   → snapshot binding
//!   → validate arguments            (ArityMismatch, UnsupportedOperation, NotDeployed)
//!   → [faucet only] re-read hasClaimed on-chain
//!   → encrypt one input per amount
//!   → re-check snapshot             (Stale → abandon, nothing submitted)
//!   → send transaction
//!   → await receipt                 (revert → TransactionReverted)
//!   → re-check snapshot             (Stale → keep receipt, skip refresh)
//!   → refresh balance
//! release guard
//! ```
//!
//! The guard is a [`GuardTicket`](crate::guard::GuardTicket) held for the
//! whole pipeline, so it is released on every exit path. A call that finds
//! the guard taken returns [`Outcome::Busy`] without touching anything.
//!
//! Failures are terminal and reported once. Nothing here retries.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::{ConfidentialTokenChain, ContractCall, ContractMethod};
use crate::claim;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EventKind, Notifier};
use crate::fhe::{EncryptedInput, InputBuilder, InputProof};
use crate::guard::{GuardKind, OperationGuards};
use crate::registry::{LiveBindings, TokenBinding, TokenSymbol};
use crate::types::{Address, Handle, TxReceipt};
use crate::wallet::Wallet;

// ---------------------------------------------------------------------------
// Operations & Outcomes
// ---------------------------------------------------------------------------

/// A state-changing operation on one token. Amounts are whole units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Mint { to: Address, amount: u64 },
    Burn { from: Address, amount: u64 },
    /// Single-recipient transfer, sent through the batch entry point.
    Transfer { to: Address, amount: u64 },
    BatchTransfer {
        recipients: Vec<Address>,
        amounts: Vec<u64>,
    },
    BatchMint {
        recipients: Vec<Address>,
        amounts: Vec<u64>,
    },
    /// Faucet claim by the wallet's own account.
    FaucetClaim { amount: u64 },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Burn { .. } => "burn",
            Self::Transfer { .. } => "transfer",
            Self::BatchTransfer { .. } => "batch_transfer",
            Self::BatchMint { .. } => "batch_mint",
            Self::FaucetClaim { .. } => "faucet_claim",
        }
    }

    /// The contract entry point this operation calls.
    pub fn method(&self) -> ContractMethod {
        match self {
            Self::Mint { .. } => ContractMethod::MintConfidential,
            Self::Burn { .. } => ContractMethod::BurnConfidential,
            Self::Transfer { .. } | Self::BatchTransfer { .. } => {
                ContractMethod::BatchConfidentialTransfer
            }
            Self::BatchMint { .. } => ContractMethod::BatchMintConfidential,
            Self::FaucetClaim { .. } => ContractMethod::Faucet,
        }
    }

    /// One amount per encrypted input, in submission order.
    pub fn amounts(&self) -> Vec<u64> {
        match self {
            Self::Mint { amount, .. }
            | Self::Burn { amount, .. }
            | Self::Transfer { amount, .. }
            | Self::FaucetClaim { amount } => vec![*amount],
            Self::BatchTransfer { amounts, .. } | Self::BatchMint { amounts, .. } => amounts.clone(),
        }
    }

    /// Argument checks that need no network.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Self::BatchTransfer {
                recipients,
                amounts,
            }
            | Self::BatchMint {
                recipients,
                amounts,
            } => {
                if recipients.len() != amounts.len() {
                    return Err(EngineError::ArityMismatch {
                        recipients: recipients.len(),
                        amounts: amounts.len(),
                    });
                }
                if recipients.is_empty() {
                    return Err(EngineError::InvalidAmount(
                        "batch has no recipients".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Assembles the contract call from one input per amount.
    fn into_call(self, inputs: Vec<EncryptedInput>) -> Result<ContractCall, EngineError> {
        let expected = self.amounts().len();
        if inputs.len() != expected {
            return Err(EngineError::EncryptionUnavailable(format!(
                "expected {expected} encrypted inputs, got {}",
                inputs.len()
            )));
        }
        let (mut handles, mut proofs): (Vec<Handle>, Vec<InputProof>) =
            inputs.into_iter().map(|i| (i.handle, i.proof)).unzip();

        let call = match self {
            Self::Mint { to, .. } => ContractCall::MintConfidential {
                to,
                handle: handles.remove(0),
                proof: proofs.remove(0),
            },
            Self::Burn { from, .. } => ContractCall::BurnConfidential {
                from,
                handle: handles.remove(0),
                proof: proofs.remove(0),
            },
            Self::FaucetClaim { .. } => ContractCall::Faucet {
                handle: handles.remove(0),
                proof: proofs.remove(0),
            },
            Self::Transfer { to, .. } => ContractCall::BatchConfidentialTransfer {
                recipients: vec![to],
                handles,
                proofs,
            },
            Self::BatchTransfer { recipients, .. } => ContractCall::BatchConfidentialTransfer {
                recipients,
                handles,
                proofs,
            },
            Self::BatchMint { recipients, .. } => ContractCall::BatchMintConfidential {
                recipients,
                handles,
                proofs,
            },
        };
        Ok(call)
    }
}

/// How a guarded task ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    /// The guard was held by another task. Nothing was done.
    Busy,
    /// The binding changed mid-flight. The continuation was dropped.
    Abandoned,
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned)
    }
}

pub type OperationOutcome = Outcome<TxReceipt>;

/// The wallet account's balance handle for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceStatus {
    pub token: TokenSymbol,
    pub account: Address,
    pub handle: Handle,
    /// `false` when the handle is zero: nothing has ever been credited.
    pub has_balance: bool,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sequences encryption, chain submission, and refresh for every
/// state-changing operation.
pub struct Orchestrator {
    live: Arc<LiveBindings>,
    inputs: Arc<InputBuilder>,
    chain: Arc<dyn ConfidentialTokenChain>,
    wallet: Arc<dyn Wallet>,
    guards: OperationGuards,
    notifier: Notifier,
    config: EngineConfig,
    balances: DashMap<TokenSymbol, BalanceStatus>,
}

impl Orchestrator {
    pub fn new(
        live: Arc<LiveBindings>,
        inputs: Arc<InputBuilder>,
        chain: Arc<dyn ConfidentialTokenChain>,
        wallet: Arc<dyn Wallet>,
        notifier: Notifier,
        config: EngineConfig,
    ) -> Self {
        Self {
            live,
            inputs,
            chain,
            wallet,
            guards: OperationGuards::new(),
            notifier,
            config,
            balances: DashMap::new(),
        }
    }

    pub fn live(&self) -> &Arc<LiveBindings> {
        &self.live
    }

    pub fn chain(&self) -> &Arc<dyn ConfidentialTokenChain> {
        &self.chain
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    pub fn guards(&self) -> &OperationGuards {
        &self.guards
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// The last balance handle a refresh observed for `token`.
    pub fn last_balance(&self, token: &TokenSymbol) -> Option<BalanceStatus> {
        self.balances.get(token).map(|b| b.clone())
    }

    /// Runs `op` on `token` and returns the confirmed receipt.
    ///
    /// `Ok(Busy)` if another operation holds the token's minting guard;
    /// `Ok(Abandoned)` if the binding changed before submission. Every
    /// other failure is an error, reported once on the event channel.
    pub async fn submit(
        &self,
        token: &TokenSymbol,
        op: Operation,
    ) -> Result<OperationOutcome, EngineError> {
        let Some(_ticket) = self.guards.try_acquire(token, GuardKind::Minting) else {
            debug!(%token, op = op.name(), "minting guard held, ignoring request");
            return Ok(Outcome::Busy);
        };

        let op_id = Uuid::new_v4();
        let op_name = op.name();
        info!(%op_id, %token, op = op_name, "operation started");

        match self.run(op_id, token, op).await {
            Ok(receipt) => {
                info!(%op_id, %token, tx = %receipt.tx_hash, block = receipt.block_number, "operation confirmed");
                self.notifier
                    .succeeded(op_id, token, format!("{op_name} confirmed in block {}", receipt.block_number));
                Ok(Outcome::Completed(receipt))
            }
            Err(EngineError::Stale { .. }) => {
                debug!(%op_id, %token, "binding changed mid-flight, operation abandoned");
                Ok(Outcome::Abandoned)
            }
            Err(err) => {
                warn!(%op_id, %token, op = op_name, error = %err, "operation failed");
                self.notifier.failed(op_id, token, err.to_string());
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        op_id: Uuid,
        token: &TokenSymbol,
        op: Operation,
    ) -> Result<TxReceipt, EngineError> {
        let snapshot = self.live.snapshot(token)?;
        op.validate()?;
        snapshot.require_method(op.method())?;
        let contract = snapshot.require_address()?;
        let submitter = self.wallet.address();

        if matches!(op, Operation::FaucetClaim { .. }) {
            self.notifier.progress(op_id, token, "checking_claim");
            claim::verify_unclaimed(self.chain.as_ref(), contract, submitter, token).await?;
            self.live.ensure_current(&snapshot)?;
        }

        self.notifier.progress(op_id, token, "encrypting");
        let inputs = self
            .inputs
            .build_many(&op.amounts(), &snapshot, submitter)
            .await?;

        self.live.ensure_current(&snapshot)?;

        let call = op.into_call(inputs)?;
        debug!(%op_id, %contract, method = %call.method(), "sending transaction");
        self.notifier.progress(op_id, token, "submitting");
        let tx_hash = self.chain.send_transaction(contract, submitter, call).await?;
        self.notifier.emit(op_id, token, EventKind::Submitted { tx_hash });

        let receipt = self.chain.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(EngineError::TransactionReverted {
                tx_hash: Some(receipt.tx_hash.to_hex()),
                reason: receipt
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "execution reverted".to_string()),
            });
        }

        self.after_confirmation(op_id, token, &snapshot).await;
        Ok(receipt)
    }

    /// The transaction is final whatever happens here. A stale binding only
    /// means the refresh would read the wrong contract, so it is skipped.
    async fn after_confirmation(&self, op_id: Uuid, token: &TokenSymbol, snapshot: &TokenBinding) {
        if !self.config.refresh_after_confirm {
            return;
        }
        if !self.live.is_current(snapshot) {
            debug!(%op_id, %token, "binding changed after confirmation, skipping refresh");
            return;
        }
        if let Err(err) = self.refresh_balance(token).await {
            warn!(%op_id, %token, error = %err, "post-confirmation balance refresh failed");
        }
    }

    /// Re-reads the wallet account's balance handle for `token`.
    pub async fn refresh_balance(
        &self,
        token: &TokenSymbol,
    ) -> Result<Outcome<BalanceStatus>, EngineError> {
        let Some(_ticket) = self.guards.try_acquire(token, GuardKind::Refreshing) else {
            debug!(%token, "refresh already running");
            return Ok(Outcome::Busy);
        };

        let snapshot = self.live.snapshot(token)?;
        let contract = snapshot.require_address()?;
        let account = self.wallet.address();
        let handle = self.chain.confidential_balance_of(contract, account).await?;
        if !self.live.is_current(&snapshot) {
            debug!(%token, "binding changed during refresh, dropping result");
            return Ok(Outcome::Abandoned);
        }

        let status = BalanceStatus {
            token: token.clone(),
            account,
            handle,
            has_balance: !handle.is_zero(),
        };
        debug!(%token, %account, has_balance = status.has_balance, "balance refreshed");
        self.balances.insert(token.clone(), status.clone());
        Ok(Outcome::Completed(status))
    }
}
