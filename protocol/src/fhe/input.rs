//! # Encrypted Input Builder
//!
//! Turns a cleartext amount into the `(handle, proof)` pair a
//! confidential-token contract accepts.
//!
//! The proof is bound to the exact `(contract, submitter)` pair the input
//! was built for. Submit it to another contract, or from another account,
//! and on-chain verification rejects it. The builder doesn't police that;
//! it just makes sure the pair it encrypts for comes from a binding
//! snapshot the caller will re-check before submitting.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::error::EngineError;
use crate::registry::TokenBinding;
use crate::types::{Address, Handle};
use crate::units;

/// Failures reported by an [`EncryptionService`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    /// The service has no session (public key not fetched, relayer not
    /// connected, …).
    #[error("encryption session not initialized")]
    NotInitialized,

    /// The service was reachable but refused or failed the request.
    #[error("encryption request failed: {0}")]
    Failed(String),
}

/// Opaque validity proof accompanying an encrypted input.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InputProof(Vec<u8>);

impl InputProof {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputProof({} bytes)", self.0.len())
    }
}

impl Serialize for InputProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for InputProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// A ciphertext handle and its proof, scoped to one contract and submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: Handle,
    pub proof: InputProof,
    /// Contract the proof is bound to.
    pub contract: Address,
    /// Account the proof is bound to.
    pub submitter: Address,
}

impl EncryptedInput {
    pub fn is_bound_to(&self, contract: Address, submitter: Address) -> bool {
        self.contract == contract && self.submitter == submitter
    }
}

/// The FHE encryption service: encrypts a 64-bit value for a contract and
/// returns a handle plus a proof of correct encryption.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// `false` until the service has a usable session.
    fn is_ready(&self) -> bool;

    async fn encrypt_u64(
        &self,
        contract: Address,
        submitter: Address,
        value: u64,
    ) -> Result<EncryptedInput, EncryptionError>;
}

/// Builds encrypted inputs from whole-unit amounts.
///
/// The service can be attached after construction, mirroring an FHE session
/// that finishes initializing after the wallet connects. Until then every
/// build fails with [`EngineError::EncryptionUnavailable`].
#[derive(Default)]
pub struct InputBuilder {
    service: RwLock<Option<Arc<dyn EncryptionService>>>,
}

impl InputBuilder {
    pub fn new(service: Arc<dyn EncryptionService>) -> Self {
        Self {
            service: RwLock::new(Some(service)),
        }
    }

    /// A builder with no session yet.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn attach(&self, service: Arc<dyn EncryptionService>) {
        *self.service.write() = Some(service);
    }

    pub fn detach(&self) {
        *self.service.write() = None;
    }

    fn ready_service(&self) -> Result<Arc<dyn EncryptionService>, EngineError> {
        let service = self.service.read().clone().ok_or_else(|| {
            EngineError::EncryptionUnavailable("no encryption session attached".to_string())
        })?;
        if !service.is_ready() {
            return Err(EncryptionError::NotInitialized.into());
        }
        Ok(service)
    }

    /// Encrypts `amount × 10^decimals` for the binding's contract and
    /// `submitter`.
    pub async fn build(
        &self,
        amount: u64,
        binding: &TokenBinding,
        submitter: Address,
    ) -> Result<EncryptedInput, EngineError> {
        let contract = binding.require_address()?;
        let scaled = units::scale(amount, binding.decimals)?;
        let service = self.ready_service()?;

        debug!(token = %binding.symbol, %contract, %submitter, "encrypting input");
        let input = service.encrypt_u64(contract, submitter, scaled).await?;
        if !input.is_bound_to(contract, submitter) {
            return Err(EngineError::EncryptionUnavailable(format!(
                "service returned an input bound to {} / {}",
                input.contract, input.submitter
            )));
        }
        Ok(input)
    }

    /// One independent input per amount, in order. Inputs are never shared
    /// between recipients.
    pub async fn build_many(
        &self,
        amounts: &[u64],
        binding: &TokenBinding,
        submitter: Address,
    ) -> Result<Vec<EncryptedInput>, EngineError> {
        let mut inputs = Vec::with_capacity(amounts.len());
        for amount in amounts {
            inputs.push(self.build(*amount, binding, submitter).await?);
        }
        Ok(inputs)
    }
}
