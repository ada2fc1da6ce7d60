//! # Wire Types
//!
//! Fixed-width byte identifiers shared by every component: account and
//! contract [`Address`]es, ciphertext [`Handle`]s, and transaction hashes.
//! All of them render as `0x`-prefixed lowercase hex and serialize as hex
//! strings, because that is what every JSON-RPC endpoint and block explorer
//! speaks.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::config::{ADDRESS_LENGTH, HANDLE_LENGTH, TX_HASH_LENGTH};

/// Error returned when parsing a hex identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| ParseIdError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseIdError::WrongLength {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Declares a fixed-width hex identifier newtype with the usual trimmings.
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Wraps raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Returns `true` for the all-zero value.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Lowercase hex with a `0x` prefix.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// A 20-byte EVM account or contract address.
    Address,
    ADDRESS_LENGTH
);

hex_id!(
    /// An opaque 32-byte reference to a ciphertext held by the FHE
    /// coprocessor. Meaningless to anyone without a decryption
    /// authorization for it.
    Handle,
    HANDLE_LENGTH
);

hex_id!(
    /// A 32-byte transaction hash.
    TxHash,
    TX_HASH_LENGTH
);

impl Address {
    /// The zero address. Registries use it as "not deployed here".
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);
}

impl Handle {
    /// The zero handle, returned for accounts that never held a balance.
    pub const ZERO: Handle = Handle(crate::config::ZERO_HANDLE);
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Final status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Reverted,
}

/// What the chain hands back once a transaction is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: TxStatus,
    /// Revert reason, when the chain reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Decrypted Values
// ---------------------------------------------------------------------------

/// A cleartext value returned by the decryption oracle.
///
/// Encrypted booleans and encrypted integers share the same handle space,
/// so the oracle's answer is typed. Balances must come back as numbers,
/// and encrypted amounts are 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClearValue {
    Bool(bool),
    Number(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_hex_roundtrip_accepts_both_prefixes() {
        let a: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let b: Address = "00000000000000000000000000000000000000aa".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0x00000000000000000000000000000000000000aa");
    }

    #[test]
    fn wrong_length_is_reported() {
        let err = "0xdead".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            ParseIdError::WrongLength {
                expected: ADDRESS_LENGTH,
                got: 2
            }
        );
    }

    #[test]
    fn zero_handle_is_zero() {
        assert!(Handle::ZERO.is_zero());
        assert!(!Handle::from_bytes([1u8; HANDLE_LENGTH]).is_zero());
    }

    #[test]
    fn handle_serializes_as_hex_string() {
        let h = Handle::from_bytes([0xab; HANDLE_LENGTH]);
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.starts_with("\"0xabab"));
        let back: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn clear_value_untagged_decoding() {
        let n: ClearValue = serde_json::from_str("1000").unwrap();
        let b: ClearValue = serde_json::from_str("true").unwrap();
        assert_eq!(n, ClearValue::Number(1000));
        assert_eq!(b, ClearValue::Bool(true));

        let max: ClearValue = serde_json::from_str(&u64::MAX.to_string()).unwrap();
        assert_eq!(max, ClearValue::Number(u64::MAX));
    }

    #[test]
    fn oracle_answer_map_decodes_by_handle() {
        let h = Handle::from_bytes([0x11; HANDLE_LENGTH]);
        let json = format!("{{\"{}\": 1000000000}}", h.to_hex());
        let values: std::collections::HashMap<Handle, ClearValue> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(values.get(&h), Some(&ClearValue::Number(1_000_000_000)));
    }
}
