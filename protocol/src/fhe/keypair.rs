//! Ephemeral X25519 keypairs for user decryption.
//!
//! The oracle re-encrypts the cleartext under this public key, and the
//! client unseals it with the private half. One keypair per reveal; it is
//! never persisted and never reused.

use rand::rngs::OsRng;
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};

/// A fresh X25519 keypair scoped to a single disclosure handshake.
pub struct EphemeralKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    pub fn private_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// `0x`-prefixed public key, as it appears in the consent payload.
    pub fn public_hex(&self) -> String {
        format!("0x{}", hex::encode(self.public.as_bytes()))
    }

    /// `0x`-prefixed private key, as the oracle request carries it.
    pub fn private_hex(&self) -> String {
        format!("0x{}", hex::encode(self.secret.to_bytes()))
    }
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public", &self.public_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keypair_is_fresh() {
        let a = EphemeralKeypair::generate();
        let b = EphemeralKeypair::generate();
        assert_ne!(a.public_bytes(), b.public_bytes());
    }

    #[test]
    fn public_matches_private() {
        let kp = EphemeralKeypair::generate();
        let derived = PublicKey::from(&StaticSecret::from(kp.private_bytes()));
        assert_eq!(derived.as_bytes(), &kp.public_bytes());
        assert_eq!(kp.public_hex().len(), 66);
    }

    #[test]
    fn debug_hides_private_key() {
        let kp = EphemeralKeypair::generate();
        let dbg = format!("{kp:?}");
        assert!(!dbg.contains(&hex::encode(kp.private_bytes())));
    }
}
