//! # FHE Client Plumbing
//!
//! Everything the engine touches on the encrypted side, and nothing it
//! computes itself. Encryption happens in an [`EncryptionService`],
//! decryption in a [`DecryptionOracle`]; this module only shapes what goes
//! in and out of them.
//!
//! - [`input`]: encrypted inputs and the [`InputBuilder`].
//! - [`keypair`]: per-reveal [`EphemeralKeypair`]s.
//! - [`consent`]: the typed [`ConsentPayload`] the holder signs.
//! - [`oracle`]: the user-decryption request and oracle contract.

pub mod consent;
pub mod input;
pub mod keypair;
pub mod oracle;

pub use consent::{ConsentDomain, ConsentMessage, ConsentPayload, ValidityWindow};
pub use input::{EncryptedInput, EncryptionError, EncryptionService, InputBuilder, InputProof};
pub use keypair::EphemeralKeypair;
pub use oracle::{CiphertextRequest, DecryptionOracle, OracleError, UserDecryptRequest};
