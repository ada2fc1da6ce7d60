//! Devnet wallets.
//!
//! Ed25519 keys with an address derived from the verifying key. A consent
//! signature is `verifying_key ‖ signature` (96 bytes) so the oracle can
//! check it against the claimed account without a key registry.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ctoken_protocol::fhe::ConsentPayload;
use ctoken_protocol::types::Address;
use ctoken_protocol::wallet::{ConsentSignature, Wallet, WalletError};

const SIGNATURE_LENGTH: usize = 32 + 64;

/// The account address controlled by `key`: the last 20 bytes of its
/// BLAKE3 digest.
pub fn address_of(key: &VerifyingKey) -> Address {
    let digest = blake3::hash(key.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

/// Checks a devnet consent signature for `account` over `payload`.
pub fn verify_consent(account: &Address, payload: &ConsentPayload, signature: &[u8]) -> bool {
    if signature.len() != SIGNATURE_LENGTH {
        return false;
    }
    let (key_bytes, sig_bytes) = signature.split_at(32);
    let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(sig_bytes) else {
        return false;
    };
    address_of(&key) == *account && key.verify(&payload.digest(), &sig).is_ok()
}

/// A devnet account with an interactive-ish signing prompt.
pub struct DevnetWallet {
    key: SigningKey,
    address: Address,
    reject_next: AtomicBool,
    prompts: AtomicUsize,
}

impl DevnetWallet {
    pub fn generate() -> Self {
        Self::from_key(SigningKey::generate(&mut OsRng))
    }

    /// Deterministic wallet, for reproducible demos.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_key(SigningKey::from_bytes(&seed))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_of(&key.verifying_key());
        Self {
            key,
            address,
            reject_next: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        }
    }

    /// The next signing prompt is declined.
    pub fn reject_next_prompt(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// Signing prompts shown so far, declined ones included.
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Wallet for DevnetWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_typed_data(
        &self,
        payload: &ConsentPayload,
    ) -> Result<ConsentSignature, WalletError> {
        tokio::task::yield_now().await;
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(WalletError::Rejected);
        }

        let sig = self.key.sign(&payload.digest());
        let mut bytes = Vec::with_capacity(SIGNATURE_LENGTH);
        bytes.extend_from_slice(self.key.verifying_key().as_bytes());
        bytes.extend_from_slice(&sig.to_bytes());
        Ok(ConsentSignature::new(bytes))
    }
}
