//! Typed decryption consent.
//!
//! Before the oracle re-encrypts anything for an ephemeral key, the account
//! holder signs a domain-separated structure saying *this key may decrypt
//! handles from these contracts, for this many days, starting now*. The
//! layout follows typed-data signing: a domain, one message type, and a
//! digest of `0x1901 ‖ domain_hash ‖ message_hash`. Hashing is SHA-256
//! throughout.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{
    CONSENT_DOMAIN_NAME, CONSENT_DOMAIN_VERSION, CONSENT_MESSAGE_TYPE,
};
use crate::types::Address;

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const MESSAGE_TYPE: &str = "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 startTimestamp,uint256 durationDays)";

/// Seconds in one validity day.
const SECONDS_PER_DAY: u64 = 86_400;

/// How long an ephemeral key's authorization is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// Unix seconds.
    pub start: u64,
    pub duration_days: u32,
}

impl ValidityWindow {
    pub fn new(start: u64, duration_days: u32) -> Self {
        Self {
            start,
            duration_days,
        }
    }

    /// First second the authorization is no longer honored.
    pub fn expires_at(&self) -> u64 {
        self.start
            .saturating_add(u64::from(self.duration_days) * SECONDS_PER_DAY)
    }

    pub fn contains(&self, unix_seconds: u64) -> bool {
        unix_seconds >= self.start && unix_seconds < self.expires_at()
    }
}

/// Signing domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Option<Address>,
}

impl ConsentDomain {
    pub fn for_network(chain_id: u64) -> Self {
        Self {
            name: CONSENT_DOMAIN_NAME.to_string(),
            version: CONSENT_DOMAIN_VERSION.to_string(),
            chain_id,
            verifying_contract: None,
        }
    }

    fn hash(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(Sha256::digest(DOMAIN_TYPE.as_bytes()));
        h.update(Sha256::digest(self.name.as_bytes()));
        h.update(Sha256::digest(self.version.as_bytes()));
        h.update(u256_be(self.chain_id));
        let mut contract = [0u8; 32];
        if let Some(addr) = self.verifying_contract {
            contract[12..].copy_from_slice(addr.as_bytes());
        }
        h.update(contract);
        h.finalize().into()
    }
}

/// The single message type the holder signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentMessage {
    /// Ephemeral X25519 public key.
    pub public_key: [u8; 32],
    pub contract_addresses: Vec<Address>,
    pub validity: ValidityWindow,
}

impl ConsentMessage {
    fn hash(&self) -> [u8; 32] {
        let mut addrs = Sha256::new();
        for addr in &self.contract_addresses {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr.as_bytes());
            addrs.update(word);
        }

        let mut h = Sha256::new();
        h.update(Sha256::digest(MESSAGE_TYPE.as_bytes()));
        h.update(Sha256::digest(self.public_key));
        h.update(addrs.finalize());
        h.update(u256_be(self.validity.start));
        h.update(u256_be(u64::from(self.validity.duration_days)));
        h.finalize().into()
    }
}

/// A complete typed consent payload: domain, primary type, message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPayload {
    pub domain: ConsentDomain,
    pub primary_type: String,
    pub message: ConsentMessage,
}

impl ConsentPayload {
    pub fn new(
        chain_id: u64,
        public_key: [u8; 32],
        contract_addresses: Vec<Address>,
        validity: ValidityWindow,
    ) -> Self {
        Self {
            domain: ConsentDomain::for_network(chain_id),
            primary_type: CONSENT_MESSAGE_TYPE.to_string(),
            message: ConsentMessage {
                public_key,
                contract_addresses,
                validity,
            },
        }
    }

    /// The 32-byte digest a wallet signs.
    pub fn digest(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update([0x19, 0x01]);
        h.update(self.domain.hash());
        h.update(self.message.hash());
        h.finalize().into()
    }

    pub fn covers(&self, contract: Address) -> bool {
        self.message.contract_addresses.contains(&contract)
    }
}

fn u256_be(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}
