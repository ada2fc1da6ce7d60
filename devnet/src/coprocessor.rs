//! # FHE Coprocessor (simulated)
//!
//! Stands in for the network's FHE key and ciphertext store. Values are
//! sealed with AES-256-GCM under a network key that only the coprocessor
//! and the oracle can reach, so nothing outside this module sees a
//! cleartext amount.
//!
//! - A **handle** is the BLAKE3 digest of the sealed bytes.
//! - An **input proof** is a keyed BLAKE3 MAC over
//!   `handle ‖ contract ‖ submitter`, so a proof only verifies for the pair
//!   it was issued to.
//!
//! Contracts "compute" on ciphertexts by unsealing, doing the arithmetic,
//! and sealing the result under a fresh handle.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;

use ctoken_protocol::fhe::{EncryptedInput, EncryptionError, EncryptionService, InputProof};
use ctoken_protocol::types::{Address, Handle};

const NONCE_LENGTH: usize = 12;

/// Coprocessor failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoprocessorError {
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(Handle),

    #[error("sealing failed")]
    SealFailed,

    #[error("unsealing failed: corrupted ciphertext or wrong network key")]
    UnsealFailed,
}

/// The devnet's FHE key holder and ciphertext store.
pub struct Coprocessor {
    network_key: [u8; 32],
    proof_key: [u8; 32],
    ciphertexts: DashMap<Handle, Vec<u8>>,
    ready: AtomicBool,
    encryptions: AtomicUsize,
}

impl Default for Coprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Coprocessor {
    /// Fresh random network and proof keys.
    pub fn new() -> Self {
        let mut network_key = [0u8; 32];
        let mut proof_key = [0u8; 32];
        OsRng.fill_bytes(&mut network_key);
        OsRng.fill_bytes(&mut proof_key);
        Self {
            network_key,
            proof_key,
            ciphertexts: DashMap::new(),
            ready: AtomicBool::new(true),
            encryptions: AtomicUsize::new(0),
        }
    }

    /// Toggles whether client encryption requests are served.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Client encryption requests served so far.
    pub fn encryptions(&self) -> usize {
        self.encryptions.load(Ordering::SeqCst)
    }

    /// Seals `value` and returns its handle.
    pub fn seal(&self, value: u64) -> Result<Handle, CoprocessorError> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.network_key).map_err(|_| CoprocessorError::SealFailed)?;
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), value.to_le_bytes().as_slice())
            .map_err(|_| CoprocessorError::SealFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        let handle = Handle::from_bytes(*blake3::hash(&sealed).as_bytes());
        self.ciphertexts.insert(handle, sealed);
        Ok(handle)
    }

    /// The cleartext behind `handle`.
    pub fn unseal(&self, handle: &Handle) -> Result<u64, CoprocessorError> {
        let sealed = self
            .ciphertexts
            .get(handle)
            .ok_or(CoprocessorError::UnknownHandle(*handle))?;
        if sealed.len() < NONCE_LENGTH {
            return Err(CoprocessorError::UnsealFailed);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
        let cipher = Aes256Gcm::new_from_slice(&self.network_key)
            .map_err(|_| CoprocessorError::UnsealFailed)?;
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoprocessorError::UnsealFailed)?;
        let bytes: [u8; 8] = plain
            .as_slice()
            .try_into()
            .map_err(|_| CoprocessorError::UnsealFailed)?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn proof_mac(&self, handle: &Handle, contract: &Address, submitter: &Address) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(handle.as_bytes());
        hasher.update(contract.as_bytes());
        hasher.update(submitter.as_bytes());
        hasher.finalize()
    }

    /// Issues a proof binding `handle` to `(contract, submitter)`.
    pub fn prove(&self, handle: &Handle, contract: &Address, submitter: &Address) -> InputProof {
        InputProof::new(self.proof_mac(handle, contract, submitter).as_bytes().to_vec())
    }

    /// Checks an input proof the way a contract's input verifier would.
    pub fn verify_input(
        &self,
        handle: &Handle,
        proof: &InputProof,
        contract: &Address,
        submitter: &Address,
    ) -> bool {
        let Ok(bytes) = <[u8; 32]>::try_from(proof.as_bytes()) else {
            return false;
        };
        // blake3::Hash equality is constant-time.
        blake3::Hash::from(bytes) == self.proof_mac(handle, contract, submitter)
            && self.ciphertexts.contains_key(handle)
    }
}

#[async_trait]
impl EncryptionService for Coprocessor {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn encrypt_u64(
        &self,
        contract: Address,
        submitter: Address,
        value: u64,
    ) -> Result<EncryptedInput, EncryptionError> {
        tokio::task::yield_now().await;
        if !self.is_ready() {
            return Err(EncryptionError::NotInitialized);
        }
        let handle = self
            .seal(value)
            .map_err(|e| EncryptionError::Failed(e.to_string()))?;
        self.encryptions.fetch_add(1, Ordering::SeqCst);
        Ok(EncryptedInput {
            handle,
            proof: self.prove(&handle, &contract, &submitter),
            contract,
            submitter,
        })
    }
}
