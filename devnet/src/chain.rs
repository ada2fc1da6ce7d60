//! # Devnet Chain
//!
//! A single-process chain holding any number of confidential-token
//! contracts. Every transaction is mined on submission, one block per
//! transaction; reverted transactions still get a receipt.
//!
//! Every RPC suspends before it touches state (a yield, or a sleep when a
//! latency is configured), so concurrent client tasks interleave the way
//! they would against a real node.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use ctoken_protocol::chain::{ChainError, ConfidentialTokenChain, ContractCall, ContractMethod};
use ctoken_protocol::types::{Address, Handle, TxHash, TxReceipt, TxStatus};

use crate::contract::{ConfidentialTokenContract, ContractInfo};
use crate::coprocessor::Coprocessor;

#[derive(Default)]
struct ChainState {
    contracts: HashMap<Address, ConfidentialTokenContract>,
    receipts: HashMap<TxHash, TxReceipt>,
    block_number: u64,
    nonce: u64,
}

/// The devnet chain.
pub struct DevnetChain {
    coprocessor: Arc<Coprocessor>,
    state: RwLock<ChainState>,
    sent: DashMap<ContractMethod, usize>,
    reject_next: AtomicBool,
    latency: RwLock<Duration>,
}

impl DevnetChain {
    pub fn new(coprocessor: Arc<Coprocessor>) -> Self {
        Self {
            coprocessor,
            state: RwLock::new(ChainState::default()),
            sent: DashMap::new(),
            reject_next: AtomicBool::new(false),
            latency: RwLock::new(Duration::ZERO),
        }
    }

    pub fn coprocessor(&self) -> &Arc<Coprocessor> {
        &self.coprocessor
    }

    /// Per-RPC delay. Zero means a bare yield.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// The next `send_transaction` fails as if the user declined it.
    pub fn reject_next_transaction(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// Deploys a token contract owned by `owner` and returns its address.
    pub fn deploy(&self, symbol: &str, name: &str, decimals: u8, owner: Address) -> Address {
        let mut state = self.state.write();
        state.nonce += 1;

        let mut hasher = blake3::Hasher::new();
        hasher.update(owner.as_bytes());
        hasher.update(&state.nonce.to_be_bytes());
        hasher.update(symbol.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[12..]);
        let address = Address::from_bytes(bytes);

        let info = ContractInfo {
            address,
            owner,
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
        };
        state
            .contracts
            .insert(address, ConfidentialTokenContract::new(info));
        info!(%symbol, %address, %owner, "contract deployed");
        address
    }

    pub fn contract_info(&self, address: &Address) -> Option<ContractInfo> {
        self.state
            .read()
            .contracts
            .get(address)
            .map(|c| c.info().clone())
    }

    /// Transactions sent for `method`, reverted ones included.
    pub fn transactions(&self, method: ContractMethod) -> usize {
        self.sent.get(&method).map(|n| *n).unwrap_or(0)
    }

    pub fn total_transactions(&self) -> usize {
        self.sent.iter().map(|entry| *entry.value()).sum()
    }

    pub fn block_number(&self) -> u64 {
        self.state.read().block_number
    }

    /// Whether `account` may user-decrypt `handle` on `contract`.
    pub fn is_allowed(&self, contract: &Address, handle: &Handle, account: &Address) -> bool {
        self.state
            .read()
            .contracts
            .get(contract)
            .map(|c| c.is_allowed(handle, account))
            .unwrap_or(false)
    }

    async fn pause(&self) {
        let latency = *self.latency.read();
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }
    }

    fn no_contract(address: &Address) -> ChainError {
        ChainError::Rpc(format!("no contract deployed at {address}"))
    }
}

#[async_trait]
impl ConfidentialTokenChain for DevnetChain {
    async fn confidential_balance_of(
        &self,
        contract: Address,
        account: Address,
    ) -> Result<Handle, ChainError> {
        self.pause().await;
        let state = self.state.read();
        let c = state
            .contracts
            .get(&contract)
            .ok_or_else(|| Self::no_contract(&contract))?;
        Ok(c.balance_of(&account))
    }

    async fn has_claimed(&self, contract: Address, account: Address) -> Result<bool, ChainError> {
        self.pause().await;
        let state = self.state.read();
        let c = state
            .contracts
            .get(&contract)
            .ok_or_else(|| Self::no_contract(&contract))?;
        Ok(c.has_claimed(&account))
    }

    async fn send_transaction(
        &self,
        contract: Address,
        from: Address,
        call: ContractCall,
    ) -> Result<TxHash, ChainError> {
        self.pause().await;
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(ChainError::UserRejected);
        }

        let method = call.method();
        let mut state = self.state.write();
        if !state.contracts.contains_key(&contract) {
            return Err(Self::no_contract(&contract));
        }
        state.nonce += 1;
        state.block_number += 1;
        let block_number = state.block_number;

        let mut hasher = blake3::Hasher::new();
        hasher.update(contract.as_bytes());
        hasher.update(from.as_bytes());
        hasher.update(&state.nonce.to_be_bytes());
        let tx_hash = TxHash::from_bytes(*hasher.finalize().as_bytes());

        let outcome = match state.contracts.get_mut(&contract) {
            Some(c) => c.execute(from, call, &self.coprocessor),
            None => return Err(Self::no_contract(&contract)),
        };
        let receipt = match outcome {
            Ok(()) => TxReceipt {
                tx_hash,
                block_number,
                status: TxStatus::Success,
                revert_reason: None,
            },
            Err(err) => {
                debug!(%tx_hash, %method, reason = %err, "transaction reverted");
                TxReceipt {
                    tx_hash,
                    block_number,
                    status: TxStatus::Reverted,
                    revert_reason: Some(err.to_string()),
                }
            }
        };
        state.receipts.insert(tx_hash, receipt);
        drop(state);

        *self.sent.entry(method).or_insert(0) += 1;
        debug!(%tx_hash, %method, %from, block = block_number, "transaction mined");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ChainError> {
        self.pause().await;
        self.state
            .read()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::Rpc(format!("unknown transaction {tx_hash}")))
    }
}
