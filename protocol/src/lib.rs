// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Confidential Token Client: Protocol Engine
//!
//! Client-side engine for fungible tokens whose balances and amounts live
//! on-chain as FHE ciphertexts. The chain never sees a number; the engine
//! never does any FHE math. What it does do is the choreography: encrypt
//! the right amount for the right contract, submit it before the world
//! changes under it, and walk the owner through the handshake that turns a
//! ciphertext handle back into a balance they can read.
//!
//! ## Architecture
//!
//! - **registry**: token symbols, per-network bindings, deployed tokens.
//! - **fhe**: encrypted inputs, ephemeral keys, consent, oracle contract.
//! - **chain**: the confidential-token contract surface.
//! - **wallet**: account address and typed-data signing.
//! - **orchestrator**: guarded, staleness-checked submission pipeline.
//! - **claim**: one faucet claim per account per token.
//! - **disclosure**: the disclose → sign → decrypt handshake.
//! - **events**: progress and outcome notifications.
//! - **client**: the facade that wires it all together.
//! - **config** / **error** / **types** / **units**: the usual suspects.
//!
//! ## Ground Rules
//!
//! 1. A token binding captured at task start is a snapshot. Check it after
//!    every await, and walk away quietly if it moved.
//! 2. Claim status is read from the chain, never from a cache.
//! 3. Guards are scoped values. No boolean is ever reset by hand.
//! 4. Nothing retries on its own. The caller decides.

pub mod chain;
pub mod claim;
pub mod client;
pub mod config;
pub mod disclosure;
pub mod error;
pub mod events;
pub mod fhe;
pub mod guard;
pub mod orchestrator;
pub mod registry;
pub mod types;
pub mod units;
pub mod wallet;

pub use client::{Collaborators, ConfidentialTokenClient};
pub use config::{DisclosureMode, EngineConfig};
pub use error::EngineError;
pub use orchestrator::{Operation, OperationOutcome, Outcome};
pub use registry::TokenSymbol;
