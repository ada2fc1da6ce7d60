//! Token bindings and the static registry they are resolved from.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::chain::ContractMethod;
use crate::config::MAX_TOKEN_DECIMALS;
use crate::error::EngineError;
use crate::types::Address;

use super::TokenSymbol;

// ---------------------------------------------------------------------------
// Interface Descriptor
// ---------------------------------------------------------------------------

/// What a deployed contract can be asked to do.
///
/// Every token shipped today exposes the full confidential-token ABI, but
/// user-deployed contracts are free to leave out the faucet, so the
/// orchestrator checks before it encrypts anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub methods: BTreeSet<ContractMethod>,
}

impl InterfaceDescriptor {
    /// The full confidential-token ABI.
    pub fn confidential_token() -> Self {
        Self {
            name: "ConfidentialToken".to_string(),
            methods: ContractMethod::ALL.into_iter().collect(),
        }
    }

    pub fn supports(&self, method: ContractMethod) -> bool {
        self.methods.contains(&method)
    }
}

impl Default for InterfaceDescriptor {
    fn default() -> Self {
        Self::confidential_token()
    }
}

// ---------------------------------------------------------------------------
// Token Binding
// ---------------------------------------------------------------------------

/// A token resolved against one network.
///
/// Bindings are values. Code that captured one earlier holds a snapshot and
/// must compare it against the live binding before acting on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBinding {
    pub symbol: TokenSymbol,
    pub network_id: u64,
    /// `None` when the token has no deployment on `network_id`.
    pub contract_address: Option<Address>,
    pub interface: InterfaceDescriptor,
    pub decimals: u8,
}

impl TokenBinding {
    pub fn is_deployed(&self) -> bool {
        self.contract_address.is_some()
    }

    /// The contract address, or [`EngineError::NotDeployed`].
    pub fn require_address(&self) -> Result<Address, EngineError> {
        self.contract_address.ok_or_else(|| EngineError::NotDeployed {
            symbol: self.symbol.clone(),
            network_id: self.network_id,
        })
    }

    /// Fails with [`EngineError::UnsupportedOperation`] if the contract
    /// does not expose `method`.
    pub fn require_method(&self, method: ContractMethod) -> Result<(), EngineError> {
        if self.interface.supports(method) {
            Ok(())
        } else {
            Err(EngineError::UnsupportedOperation {
                symbol: self.symbol.clone(),
                method,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Static Registry
// ---------------------------------------------------------------------------

/// Static metadata for one token plus its per-network address table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub symbol: TokenSymbol,
    pub name: String,
    pub decimals: u8,
    #[serde(default)]
    pub interface: InterfaceDescriptor,
    /// network id → contract address.
    #[serde(default)]
    pub deployments: BTreeMap<u64, Address>,
}

impl RegistryEntry {
    fn new(symbol: TokenSymbol, name: &str, decimals: u8) -> Self {
        Self {
            symbol,
            name: name.to_string(),
            decimals,
            interface: InterfaceDescriptor::confidential_token(),
            deployments: BTreeMap::new(),
        }
    }

    /// Binds this entry to a network. A zero address in the table means
    /// the token was never deployed there.
    pub fn bind(&self, network_id: u64) -> TokenBinding {
        let contract_address = self
            .deployments
            .get(&network_id)
            .copied()
            .filter(|addr| !addr.is_zero());
        TokenBinding {
            symbol: self.symbol.clone(),
            network_id,
            contract_address,
            interface: self.interface.clone(),
            decimals: self.decimals,
        }
    }
}

/// Compile-time token metadata keyed by the closed symbol set.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    entries: HashMap<TokenSymbol, RegistryEntry>,
}

impl StaticRegistry {
    /// zUSD, zBTC and zETH with their on-chain decimal counts and no
    /// deployments. Hosts attach addresses with [`Self::with_deployment`]
    /// or [`Self::with_deployments_json`].
    pub fn builtin() -> Self {
        let entries = [
            RegistryEntry::new(TokenSymbol::ZUsd, "Zama Confidential USD", 6),
            RegistryEntry::new(TokenSymbol::ZBtc, "Zama Confidential Bitcoin", 6),
            RegistryEntry::new(TokenSymbol::ZEth, "Zama Confidential Ethereum", 6),
        ]
        .into_iter()
        .map(|e| (e.symbol.clone(), e))
        .collect();
        Self { entries }
    }

    /// Records the contract address of a builtin token on a network.
    pub fn with_deployment(mut self, symbol: TokenSymbol, network_id: u64, address: Address) -> Self {
        if let Some(entry) = self.entries.get_mut(&symbol) {
            entry.deployments.insert(network_id, address);
        }
        self
    }

    /// Merges an address table shaped like the generated deployment files:
    ///
    /// ```json
    /// { "zUSD": { "11155111": "0x…" }, "zBTC": { "11155111": "0x…" } }
    /// ```
    ///
    /// Symbols outside the builtin set are rejected; deployed tokens go
    /// through the deployed-token store instead.
    pub fn with_deployments_json(mut self, json: &str) -> Result<Self, EngineError> {
        let table: BTreeMap<String, BTreeMap<u64, Address>> = serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("invalid deployment table: {e}")))?;
        for (raw_symbol, networks) in table {
            let symbol = TokenSymbol::parse(&raw_symbol);
            let entry = self
                .entries
                .get_mut(&symbol)
                .ok_or_else(|| EngineError::UnknownSymbol(raw_symbol.clone()))?;
            entry.deployments.extend(networks);
        }
        Ok(self)
    }

    pub fn get(&self, symbol: &TokenSymbol) -> Option<&RegistryEntry> {
        self.entries.get(symbol)
    }

    /// Entries in builtin declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        TokenSymbol::BUILTIN
            .iter()
            .filter_map(|symbol| self.entries.get(symbol))
    }
}

/// Checks that a decimal count is something we can scale by.
pub(crate) fn validate_decimals(decimals: u8) -> Result<(), EngineError> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(EngineError::InvalidAmount(format!(
            "token decimals {decimals} exceed the supported maximum of {MAX_TOKEN_DECIMALS}"
        )));
    }
    Ok(())
}
