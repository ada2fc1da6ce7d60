//! Per-token operation guards.
//!
//! Two flags per token, `minting` and `refreshing`. State-changing
//! operations take `minting`; balance refreshes take `refreshing`. A guard
//! is acquired with [`OperationGuards::try_acquire`] and released when the
//! returned [`GuardTicket`] drops, on every exit path including `?` and
//! panics.
//!
//! Acquisition never waits. If the flag is already set the caller gets
//! `None` and is expected to do nothing at all.
//!
//! Disclosure handshakes use a separate [`InFlight`] set keyed by
//! `(account, token)`.

use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::trace;

use crate::registry::TokenSymbol;

/// Which flag to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardKind {
    Minting,
    Refreshing,
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minting => f.write_str("minting"),
            Self::Refreshing => f.write_str("refreshing"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct GuardFlags {
    minting: bool,
    refreshing: bool,
}

impl GuardFlags {
    fn get(&self, kind: GuardKind) -> bool {
        match kind {
            GuardKind::Minting => self.minting,
            GuardKind::Refreshing => self.refreshing,
        }
    }

    fn slot(&mut self, kind: GuardKind) -> &mut bool {
        match kind {
            GuardKind::Minting => &mut self.minting,
            GuardKind::Refreshing => &mut self.refreshing,
        }
    }
}

/// Guard flags for every token the engine has touched.
#[derive(Debug, Clone, Default)]
pub struct OperationGuards {
    flags: Arc<DashMap<TokenSymbol, GuardFlags>>,
}

impl OperationGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `kind` on `token` if it is clear. `None` if it was already set.
    pub fn try_acquire(&self, token: &TokenSymbol, kind: GuardKind) -> Option<GuardTicket> {
        let mut entry = self.flags.entry(token.clone()).or_default();
        let slot = entry.slot(kind);
        if *slot {
            trace!(%token, %kind, "guard busy");
            return None;
        }
        *slot = true;
        drop(entry);

        Some(GuardTicket {
            flags: Arc::clone(&self.flags),
            token: token.clone(),
            kind,
        })
    }

    pub fn is_held(&self, token: &TokenSymbol, kind: GuardKind) -> bool {
        self.flags
            .get(token)
            .map(|f| f.get(kind))
            .unwrap_or(false)
    }
}

/// Proof of holding one guard flag. Clears it on drop.
#[must_use = "the guard is released as soon as the ticket is dropped"]
pub struct GuardTicket {
    flags: Arc<DashMap<TokenSymbol, GuardFlags>>,
    token: TokenSymbol,
    kind: GuardKind,
}

impl GuardTicket {
    pub fn token(&self) -> &TokenSymbol {
        &self.token
    }

    pub fn kind(&self) -> GuardKind {
        self.kind
    }
}

impl Drop for GuardTicket {
    fn drop(&mut self) {
        if let Some(mut flags) = self.flags.get_mut(&self.token) {
            *flags.slot(self.kind) = false;
        }
        trace!(token = %self.token, kind = %self.kind, "guard released");
    }
}

impl fmt::Debug for GuardTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardTicket")
            .field("token", &self.token)
            .field("kind", &self.kind)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// In-flight set
// ---------------------------------------------------------------------------

/// A set of keys with at most one active holder each.
#[derive(Debug)]
pub struct InFlight<K: Eq + Hash> {
    keys: Arc<DashMap<K, ()>>,
}

impl<K: Eq + Hash> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` active. `None` if it already is.
    pub fn try_enter(&self, key: K) -> Option<InFlightTicket<K>> {
        match self.keys.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightTicket {
                    keys: Arc::clone(&self.keys),
                    key,
                })
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains_key(key)
    }
}

/// Removes its key from the [`InFlight`] set on drop.
#[must_use = "the key leaves the in-flight set as soon as the ticket is dropped"]
pub struct InFlightTicket<K: Eq + Hash> {
    keys: Arc<DashMap<K, ()>>,
    key: K,
}

impl<K: Eq + Hash> Drop for InFlightTicket<K> {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused() {
        let guards = OperationGuards::new();
        let ticket = guards.try_acquire(&TokenSymbol::ZUsd, GuardKind::Minting);
        assert!(ticket.is_some());
        assert!(guards
            .try_acquire(&TokenSymbol::ZUsd, GuardKind::Minting)
            .is_none());
        assert!(guards.is_held(&TokenSymbol::ZUsd, GuardKind::Minting));
    }

    #[test]
    fn drop_releases() {
        let guards = OperationGuards::new();
        {
            let _ticket = guards
                .try_acquire(&TokenSymbol::ZUsd, GuardKind::Minting)
                .unwrap();
        }
        assert!(!guards.is_held(&TokenSymbol::ZUsd, GuardKind::Minting));
        assert!(guards
            .try_acquire(&TokenSymbol::ZUsd, GuardKind::Minting)
            .is_some());
    }

    #[test]
    fn release_on_error_path() {
        fn fails(guards: &OperationGuards) -> Result<(), &'static str> {
            let _ticket = guards
                .try_acquire(&TokenSymbol::ZBtc, GuardKind::Minting)
                .ok_or("busy")?;
            Err("reverted")
        }
        let guards = OperationGuards::new();
        assert_eq!(fails(&guards), Err("reverted"));
        assert!(!guards.is_held(&TokenSymbol::ZBtc, GuardKind::Minting));
    }

    #[test]
    fn flags_and_tokens_are_independent() {
        let guards = OperationGuards::new();
        let _mint = guards
            .try_acquire(&TokenSymbol::ZUsd, GuardKind::Minting)
            .unwrap();
        assert!(guards
            .try_acquire(&TokenSymbol::ZUsd, GuardKind::Refreshing)
            .is_some());
        assert!(guards
            .try_acquire(&TokenSymbol::ZEth, GuardKind::Minting)
            .is_some());
    }

    #[test]
    fn in_flight_is_exclusive_per_key() {
        let set: InFlight<(u8, TokenSymbol)> = InFlight::new();
        let a = set.try_enter((1, TokenSymbol::ZUsd)).unwrap();
        assert!(set.try_enter((1, TokenSymbol::ZUsd)).is_none());
        assert!(set.try_enter((2, TokenSymbol::ZUsd)).is_some());
        drop(a);
        assert!(!set.contains(&(1, TokenSymbol::ZUsd)));
        assert!(set.try_enter((1, TokenSymbol::ZUsd)).is_some());
    }
}
