//! # Token Registry & Resolution
//!
//! Answers one question for the rest of the engine: *which contract is
//! `zUSD` on this network, and how many decimals does it have?*
//!
//! - [`symbol`]: the closed [`TokenSymbol`] set plus user deployments.
//! - [`binding`]: [`TokenBinding`] values and the [`StaticRegistry`].
//! - [`store`]: the [`DeployedTokenStore`] persistence contract.
//! - [`resolver`]: [`TokenResolver`] and the [`LiveBindings`] snapshot source.

pub mod binding;
pub mod resolver;
pub mod store;
pub mod symbol;

pub use binding::{InterfaceDescriptor, RegistryEntry, StaticRegistry, TokenBinding};
pub use resolver::{LiveBindings, TokenResolver};
pub use store::{DeployedToken, DeployedTokenStore, MemoryTokenStore, SledTokenStore, StoreError};
pub use symbol::TokenSymbol;
