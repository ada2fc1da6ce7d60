//! Devnet decryption oracle.
//!
//! Checks a user-decryption request the way the real relayer does before
//! opening anything: the consent signature must verify against the
//! requesting account over the consent rebuilt from the request, the
//! validity window must be open, every handle's contract must be in scope,
//! and the account must be on the handle's ACL.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use ctoken_protocol::fhe::{
    ConsentPayload, DecryptionOracle, OracleError, UserDecryptRequest, ValidityWindow,
};
use ctoken_protocol::types::{ClearValue, Handle};

use crate::chain::DevnetChain;
use crate::wallet::verify_consent;

/// The devnet's decryption oracle.
pub struct DevnetOracle {
    networks: RwLock<Vec<u64>>,
    chain: Arc<DevnetChain>,
    boolean_answers: AtomicBool,
    requests: AtomicUsize,
}

impl DevnetOracle {
    pub fn new(network_id: u64, chain: Arc<DevnetChain>) -> Self {
        Self {
            networks: RwLock::new(vec![network_id]),
            chain,
            boolean_answers: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }

    /// Also accept consents signed for `network_id`.
    pub fn accept_network(&self, network_id: u64) {
        let mut networks = self.networks.write();
        if !networks.contains(&network_id) {
            networks.push(network_id);
        }
    }

    /// Answer every handle with a boolean instead of its number.
    pub fn answer_with_booleans(&self, enabled: bool) {
        self.boolean_answers.store(enabled, Ordering::SeqCst);
    }

    /// Requests received so far, rejected ones included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// The consent the request claims to carry, rebuilt for `network_id`.
    fn consent_from(
        &self,
        request: &UserDecryptRequest,
        network_id: u64,
    ) -> Result<ConsentPayload, OracleError> {
        let key_hex = request
            .ephemeral_public_key
            .strip_prefix("0x")
            .unwrap_or(&request.ephemeral_public_key);
        let public_key: [u8; 32] = hex::decode(key_hex)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| OracleError::Unavailable("malformed ephemeral public key".into()))?;
        let start: u64 = request
            .validity_start
            .parse()
            .map_err(|_| OracleError::Unavailable("malformed validity start".into()))?;
        let days: u32 = request
            .validity_duration_days
            .parse()
            .map_err(|_| OracleError::Unavailable("malformed validity duration".into()))?;

        Ok(ConsentPayload::new(
            network_id,
            public_key,
            request.contract_addresses.clone(),
            ValidityWindow::new(start, days),
        ))
    }
}

#[async_trait]
impl DecryptionOracle for DevnetOracle {
    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<HashMap<Handle, ClearValue>, OracleError> {
        tokio::task::yield_now().await;
        self.requests.fetch_add(1, Ordering::SeqCst);

        if request.consent_signature.starts_with("0x") {
            return Err(OracleError::BadSignature);
        }
        let signature =
            hex::decode(&request.consent_signature).map_err(|_| OracleError::BadSignature)?;
        let networks = self.networks.read().clone();
        let mut verified = None;
        for network_id in networks {
            let consent = self.consent_from(request, network_id)?;
            if verify_consent(&request.account, &consent, &signature) {
                verified = Some(consent);
                break;
            }
        }
        let consent = verified.ok_or(OracleError::BadSignature)?;

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        if !consent.message.validity.contains(now) {
            return Err(OracleError::Expired);
        }

        let coprocessor = self.chain.coprocessor();
        let booleans = self.boolean_answers.load(Ordering::SeqCst);
        let mut out = HashMap::with_capacity(request.ciphertext_requests.len());
        for item in &request.ciphertext_requests {
            if !consent.covers(item.contract_address)
                || !self
                    .chain
                    .is_allowed(&item.contract_address, &item.handle, &request.account)
            {
                return Err(OracleError::NotAuthorized(item.handle));
            }
            let value = coprocessor
                .unseal(&item.handle)
                .map_err(|e| OracleError::Unavailable(e.to_string()))?;
            let clear = if booleans {
                ClearValue::Bool(value != 0)
            } else {
                ClearValue::Number(value)
            };
            out.insert(item.handle, clear);
        }

        debug!(account = %request.account, handles = out.len(), "user decryption served");
        Ok(out)
    }
}
