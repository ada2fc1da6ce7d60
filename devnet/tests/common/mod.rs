//! Shared fixtures for the devnet integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use ctoken_devnet::{Coprocessor, Devnet, DevnetWallet};
use ctoken_protocol::config::{NETWORK_ID_HARDHAT, NETWORK_ID_SEPOLIA};
use ctoken_protocol::fhe::{EncryptedInput, EncryptionError, EncryptionService};
use ctoken_protocol::types::Address;
use ctoken_protocol::ConfidentialTokenClient;

pub const NETWORK: u64 = NETWORK_ID_HARDHAT;
pub const OTHER_NETWORK: u64 = NETWORK_ID_SEPOLIA;

pub fn devnet() -> Devnet {
    Devnet::with_builtin_tokens(NETWORK)
}

/// A client signing as the devnet owner, who may mint and burn.
pub fn owner_client(devnet: &Devnet) -> Arc<ConfidentialTokenClient> {
    Arc::new(devnet.client(devnet.owner().clone(), devnet.config()).unwrap())
}

/// A fresh user wallet and a client for it.
pub fn user_client(devnet: &Devnet) -> (Arc<DevnetWallet>, Arc<ConfidentialTokenClient>) {
    let wallet = Arc::new(DevnetWallet::generate());
    let client = Arc::new(devnet.client(wallet.clone(), devnet.config()).unwrap());
    (wallet, client)
}

pub fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

type Hook = Box<dyn FnOnce() + Send>;

/// Encrypts through the coprocessor, running a one-shot hook while the
/// request is in flight.
pub struct HookedEncryptor {
    inner: Arc<Coprocessor>,
    hook: Mutex<Option<Hook>>,
}

impl HookedEncryptor {
    pub fn new(inner: Arc<Coprocessor>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            hook: Mutex::new(None),
        })
    }

    pub fn on_next_encrypt(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }
}

#[async_trait]
impl EncryptionService for HookedEncryptor {
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    async fn encrypt_u64(
        &self,
        contract: Address,
        submitter: Address,
        value: u64,
    ) -> Result<EncryptedInput, EncryptionError> {
        let input = self.inner.encrypt_u64(contract, submitter, value).await?;
        let hook = self.hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(input)
    }
}
