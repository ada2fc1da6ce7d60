//! # Token Resolver
//!
//! Two sources feed resolution: the [`StaticRegistry`] of builtin tokens and
//! the [`DeployedTokenStore`] of user deployments. [`TokenResolver`] merges
//! them behind one accessor and [`LiveBindings`] keeps the bindings for the
//! currently selected network.
//!
//! ## Snapshots
//!
//! `LiveBindings` is the only writer of "the current binding". Everyone else
//! takes a [`TokenBinding`] snapshot when a task starts and asks
//! [`LiveBindings::ensure_current`] at every resumption point. A network
//! switch or a re-registration flips the answer to [`EngineError::Stale`]
//! and the task drops its own continuation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config;
use crate::error::EngineError;

use super::binding::{validate_decimals, InterfaceDescriptor, StaticRegistry, TokenBinding};
use super::store::{DeployedToken, DeployedTokenStore};
use super::TokenSymbol;

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Maps `(symbol, network)` to a [`TokenBinding`].
pub struct TokenResolver {
    registry: StaticRegistry,
    store: Arc<dyn DeployedTokenStore>,
}

impl TokenResolver {
    pub fn new(registry: StaticRegistry, store: Arc<dyn DeployedTokenStore>) -> Self {
        Self { registry, store }
    }

    /// Resolves `symbol` on `network_id`.
    ///
    /// Builtin symbols always resolve, with no address when the token is not
    /// deployed on that network. Deployed symbols resolve when the store
    /// knows them on any network; otherwise the symbol is unknown.
    pub fn resolve(
        &self,
        symbol: &TokenSymbol,
        network_id: u64,
    ) -> Result<TokenBinding, EngineError> {
        if let Some(entry) = self.registry.get(symbol) {
            return Ok(entry.bind(network_id));
        }

        let deployed = self.store.load()?;
        let matches: Vec<&DeployedToken> = deployed
            .iter()
            .filter(|t| t.symbol == symbol.as_str())
            .collect();
        if matches.is_empty() {
            return Err(EngineError::UnknownSymbol(symbol.to_string()));
        }

        let on_network = matches
            .iter()
            .rev()
            .find(|t| t.network_id == network_id && !t.address.is_zero());
        let decimals = on_network.unwrap_or(&matches[0]).decimals;

        Ok(TokenBinding {
            symbol: symbol.clone(),
            network_id,
            contract_address: on_network.map(|t| t.address),
            interface: InterfaceDescriptor::confidential_token(),
            decimals,
        })
    }

    /// Persists a user deployment. A later registration of the same symbol
    /// on the same network replaces the earlier one.
    pub fn register(&self, mut token: DeployedToken) -> Result<(), EngineError> {
        let symbol = TokenSymbol::parse(&token.symbol);
        if symbol.as_str().is_empty() {
            return Err(EngineError::Config(
                "deployed token symbol must not be empty".to_string(),
            ));
        }
        if symbol.is_builtin() {
            return Err(EngineError::Config(format!(
                "{symbol} is a builtin token and cannot be re-registered"
            )));
        }
        if token.address.is_zero() {
            return Err(EngineError::Config(
                "deployed token address must not be the zero address".to_string(),
            ));
        }
        validate_decimals(token.decimals)?;
        // Stored the way `resolve` will look it up.
        token.symbol = symbol.as_str().to_string();

        let mut tokens = self.store.load()?;
        tokens.retain(|t| !(t.symbol == token.symbol && t.network_id == token.network_id));
        info!(
            symbol = %token.symbol,
            address = %token.address,
            network = %config::network_name(token.network_id),
            "registering deployed token"
        );
        tokens.push(token);
        self.store.save(&tokens)?;
        Ok(())
    }

    /// Every token known on `network_id`: builtins first, then deployments.
    pub fn list(&self, network_id: u64) -> Result<Vec<TokenBinding>, EngineError> {
        let mut out: Vec<TokenBinding> = self
            .registry
            .entries()
            .map(|entry| entry.bind(network_id))
            .collect();

        let mut seen = Vec::new();
        for token in self.store.load()? {
            if token.network_id == network_id && !seen.contains(&token.symbol) {
                seen.push(token.symbol.clone());
                out.push(self.resolve(&TokenSymbol::parse(&token.symbol), network_id)?);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Live Bindings
// ---------------------------------------------------------------------------

struct LiveState {
    network_id: u64,
    bindings: HashMap<TokenSymbol, TokenBinding>,
}

/// The bindings for the currently selected network, resolved lazily.
pub struct LiveBindings {
    resolver: Arc<TokenResolver>,
    state: RwLock<LiveState>,
}

impl LiveBindings {
    pub fn new(resolver: Arc<TokenResolver>, network_id: u64) -> Self {
        Self {
            resolver,
            state: RwLock::new(LiveState {
                network_id,
                bindings: HashMap::new(),
            }),
        }
    }

    pub fn resolver(&self) -> &Arc<TokenResolver> {
        &self.resolver
    }

    pub fn network_id(&self) -> u64 {
        self.state.read().network_id
    }

    /// The current binding for `symbol`, resolving it on first use.
    ///
    /// The returned value is a snapshot. Keep it, and check it with
    /// [`Self::ensure_current`] after every await.
    pub fn snapshot(&self, symbol: &TokenSymbol) -> Result<TokenBinding, EngineError> {
        let network_id = {
            let state = self.state.read();
            if let Some(binding) = state.bindings.get(symbol) {
                return Ok(binding.clone());
            }
            state.network_id
        };

        let binding = self.resolver.resolve(symbol, network_id)?;
        let mut state = self.state.write();
        if state.network_id != network_id {
            // The network moved while we were resolving; what we hold is
            // already stale, so don't cache it.
            return Ok(binding);
        }
        let cached = state
            .bindings
            .entry(symbol.clone())
            .or_insert(binding)
            .clone();
        debug!(token = %symbol, network_id, address = ?cached.contract_address, "resolved binding");
        Ok(cached)
    }

    /// Switches the active network. Every binding captured before this call
    /// becomes stale.
    pub fn switch_network(&self, network_id: u64) {
        let mut state = self.state.write();
        if state.network_id == network_id {
            return;
        }
        info!(
            from = %config::network_name(state.network_id),
            to = %config::network_name(network_id),
            "switching network, invalidating bindings"
        );
        state.network_id = network_id;
        state.bindings.clear();
    }

    /// Drops the cached binding for `symbol` so the next snapshot
    /// re-resolves it (e.g. after a registration).
    pub fn invalidate(&self, symbol: &TokenSymbol) {
        self.state.write().bindings.remove(symbol);
    }

    /// Registers a deployment and invalidates the affected binding.
    pub fn register(&self, token: DeployedToken) -> Result<(), EngineError> {
        let symbol = TokenSymbol::parse(&token.symbol);
        self.resolver.register(token)?;
        self.invalidate(&symbol);
        Ok(())
    }

    /// `true` if `snapshot` still equals the live binding for its symbol.
    pub fn is_current(&self, snapshot: &TokenBinding) -> bool {
        if self.network_id() != snapshot.network_id {
            return false;
        }
        match self.snapshot(&snapshot.symbol) {
            Ok(live) => live == *snapshot,
            Err(_) => false,
        }
    }

    /// [`EngineError::Stale`] unless `snapshot` is still current.
    pub fn ensure_current(&self, snapshot: &TokenBinding) -> Result<(), EngineError> {
        if self.is_current(snapshot) {
            Ok(())
        } else {
            Err(EngineError::Stale {
                symbol: snapshot.symbol.clone(),
            })
        }
    }
}
