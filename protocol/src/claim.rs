//! # Claim Guard
//!
//! One faucet claim per account per token, enforced on-chain by
//! `hasClaimed`. The client keeps a cached answer for display, but the
//! cache never gates a claim: the orchestrator re-reads `hasClaimed`
//! inside the minting guard, right before it encrypts the faucet input.
//! Another tab may have claimed a second ago.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::chain::ConfidentialTokenChain;
use crate::error::EngineError;
use crate::orchestrator::{Operation, OperationOutcome, Orchestrator, Outcome};
use crate::registry::TokenSymbol;
use crate::types::Address;

/// Fails with [`EngineError::AlreadyClaimed`] if `account` has claimed on
/// `contract`. Always hits the chain.
pub(crate) async fn verify_unclaimed(
    chain: &dyn ConfidentialTokenChain,
    contract: Address,
    account: Address,
    token: &TokenSymbol,
) -> Result<(), EngineError> {
    if chain.has_claimed(contract, account).await? {
        debug!(%token, %account, "faucet already claimed");
        return Err(EngineError::AlreadyClaimed {
            account,
            symbol: token.clone(),
        });
    }
    Ok(())
}

/// Faucet claims for the wallet account.
pub struct ClaimGuard {
    orchestrator: Arc<Orchestrator>,
    cache: DashMap<(Address, TokenSymbol), bool>,
}

impl ClaimGuard {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            cache: DashMap::new(),
        }
    }

    /// `Completed(true)` if `account` has not claimed `token` yet. Reads
    /// the chain and refreshes the cached answer. `Abandoned` if the
    /// binding changed while the chain was read; the cache is left alone.
    pub async fn can_claim(
        &self,
        account: Address,
        token: &TokenSymbol,
    ) -> Result<Outcome<bool>, EngineError> {
        let binding = self.orchestrator.live().snapshot(token)?;
        let contract = binding.require_address()?;
        let claimed = self
            .orchestrator
            .chain()
            .has_claimed(contract, account)
            .await?;
        if !self.orchestrator.live().is_current(&binding) {
            debug!(%token, %account, "binding changed during claim check, dropping result");
            return Ok(Outcome::Abandoned);
        }
        self.cache.insert((account, token.clone()), claimed);
        Ok(Outcome::Completed(!claimed))
    }

    /// Last observed claim status. Advisory only.
    pub fn cached(&self, account: Address, token: &TokenSymbol) -> Option<bool> {
        self.cache.get(&(account, token.clone())).map(|c| *c)
    }

    /// Claims `amount` whole units of `token` from its faucet.
    ///
    /// `account` must be the wallet's account. The claimed status is
    /// re-read on-chain before anything is encrypted; an account that has
    /// already claimed gets [`EngineError::AlreadyClaimed`] and no
    /// transaction is sent.
    pub async fn claim(
        &self,
        account: Address,
        token: &TokenSymbol,
        amount: u64,
    ) -> Result<OperationOutcome, EngineError> {
        let wallet = self.orchestrator.wallet().address();
        if account != wallet {
            return Err(EngineError::AccountMismatch {
                expected: wallet,
                got: account,
            });
        }

        let result = self
            .orchestrator
            .submit(token, Operation::FaucetClaim { amount })
            .await;

        match &result {
            Ok(OperationOutcome::Completed(receipt)) => {
                info!(%token, %account, tx = %receipt.tx_hash, "faucet claimed");
                self.cache.insert((account, token.clone()), true);
            }
            Err(EngineError::AlreadyClaimed { .. }) => {
                self.cache.insert((account, token.clone()), true);
            }
            _ => {}
        }
        result
    }
}
