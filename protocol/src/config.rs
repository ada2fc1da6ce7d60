//! # Engine Configuration & Constants
//!
//! Every magic number the engine depends on lives here, together with the
//! [`EngineConfig`] knobs a host application is allowed to turn.
//!
//! The constants mirror what the deployed confidential-token contracts and
//! the decryption oracle expect on the wire. Changing them does not make
//! the contracts agree with you, so don't.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Sepolia, the public testnet the confidential tokens are deployed on.
pub const NETWORK_ID_SEPOLIA: u64 = 11_155_111;

/// Local Hardhat node. Addresses here change on every restart.
pub const NETWORK_ID_HARDHAT: u64 = 31_337;

// ---------------------------------------------------------------------------
// Wire Sizes
// ---------------------------------------------------------------------------

/// EVM account/contract address length in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Ciphertext handle length in bytes. Handles are 32-byte words on-chain.
pub const HANDLE_LENGTH: usize = 32;

/// Transaction hash length in bytes.
pub const TX_HASH_LENGTH: usize = 32;

/// The all-zero handle the contract returns for an account that has never
/// held a balance.
pub const ZERO_HANDLE: [u8; HANDLE_LENGTH] = [0u8; HANDLE_LENGTH];

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Encrypted amounts are 64-bit unsigned integers (`euint64`). Anything that
/// scales past this cannot be encrypted.
pub const MAX_ENCRYPTED_AMOUNT: u64 = u64::MAX;

/// Largest decimal count we accept for a token. `10^19` already overflows
/// `u64`, so a token with more decimals could never hold even one unit.
pub const MAX_TOKEN_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Decryption
// ---------------------------------------------------------------------------

/// Default lifetime of a user-decryption authorization, in days.
pub const DEFAULT_DECRYPT_DURATION_DAYS: u32 = 10;

/// The oracle refuses authorizations longer than a year.
pub const MAX_DECRYPT_DURATION_DAYS: u32 = 365;

/// Name of the single typed-data message type in the consent payload.
pub const CONSENT_MESSAGE_TYPE: &str = "UserDecryptRequestVerification";

/// Domain name used for consent payload separation.
pub const CONSENT_DOMAIN_NAME: &str = "Decryption";

/// Domain version used for consent payload separation.
pub const CONSENT_DOMAIN_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Default capacity of the notification broadcast channel. Lagging
/// subscribers lose the oldest events, not the engine.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Which on-chain entry point authorizes the holder to decrypt their balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureMode {
    /// `discloseEncryptedAmount(handle)`: authorizes the specific handle
    /// that was just fetched.
    #[default]
    DiscloseHandle,
    /// `allowSelfBalanceDecrypt()`: authorizes the caller's current balance
    /// without naming a handle.
    AllowSelf,
}

/// Tunables for a [`crate::client::ConfidentialTokenClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Network the client starts on.
    pub network_id: u64,
    /// Validity window of a decryption consent, in days.
    pub decrypt_duration_days: u32,
    /// Disclosure entry point used by the handshake.
    pub disclosure_mode: DisclosureMode,
    /// Refresh the balance handle after a confirmed operation.
    pub refresh_after_confirm: bool,
    /// Capacity of the notification channel.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network_id: NETWORK_ID_SEPOLIA,
            decrypt_duration_days: DEFAULT_DECRYPT_DURATION_DAYS,
            disclosure_mode: DisclosureMode::default(),
            refresh_after_confirm: true,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Rejects values the oracle or the channel would choke on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.decrypt_duration_days == 0 || self.decrypt_duration_days > MAX_DECRYPT_DURATION_DAYS
        {
            return Err(EngineError::Config(format!(
                "decrypt_duration_days must be within 1..={MAX_DECRYPT_DURATION_DAYS}, got {}",
                self.decrypt_duration_days
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(EngineError::Config(
                "event_channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns a friendly name for a network id, mainly for logging.
pub fn network_name(network_id: u64) -> String {
    match network_id {
        NETWORK_ID_SEPOLIA => "sepolia".to_string(),
        NETWORK_ID_HARDHAT => "hardhat".to_string(),
        other => format!("chain-{other}"),
    }
}
