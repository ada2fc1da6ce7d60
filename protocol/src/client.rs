//! The engine facade.
//!
//! [`ConfidentialTokenClient`] wires the resolver, input builder,
//! orchestrator, claim guard, and disclosure handshake to one chain
//! client, one wallet, and one decryption oracle. Presentation code talks
//! to this type and subscribes to its events; it never sees the parts.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::chain::ConfidentialTokenChain;
use crate::claim::ClaimGuard;
use crate::config::EngineConfig;
use crate::disclosure::{DisclosureHandshake, RevealOutcome};
use crate::error::EngineError;
use crate::events::{EngineEvent, Notifier};
use crate::fhe::{DecryptionOracle, EncryptionService, InputBuilder};
use crate::orchestrator::{BalanceStatus, Operation, OperationOutcome, Orchestrator, Outcome};
use crate::registry::{
    DeployedToken, DeployedTokenStore, LiveBindings, StaticRegistry, TokenBinding, TokenResolver,
    TokenSymbol,
};
use crate::types::Address;
use crate::wallet::Wallet;

/// External collaborators the engine drives.
pub struct Collaborators {
    pub chain: Arc<dyn ConfidentialTokenChain>,
    pub wallet: Arc<dyn Wallet>,
    pub oracle: Arc<dyn DecryptionOracle>,
    /// `None` until the FHE session is up; attach later with
    /// [`ConfidentialTokenClient::attach_encryption`].
    pub encryption: Option<Arc<dyn EncryptionService>>,
    pub store: Arc<dyn DeployedTokenStore>,
}

/// Client protocol engine for confidential tokens.
pub struct ConfidentialTokenClient {
    config: EngineConfig,
    live: Arc<LiveBindings>,
    inputs: Arc<InputBuilder>,
    orchestrator: Arc<Orchestrator>,
    claims: ClaimGuard,
    disclosure: DisclosureHandshake,
    notifier: Notifier,
}

impl ConfidentialTokenClient {
    pub fn new(
        config: EngineConfig,
        registry: StaticRegistry,
        parts: Collaborators,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let resolver = Arc::new(TokenResolver::new(registry, parts.store));
        let live = Arc::new(LiveBindings::new(resolver, config.network_id));
        let inputs = Arc::new(match parts.encryption {
            Some(service) => InputBuilder::new(service),
            None => InputBuilder::uninitialized(),
        });
        let notifier = Notifier::new(config.event_channel_capacity);

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&live),
            Arc::clone(&inputs),
            Arc::clone(&parts.chain),
            Arc::clone(&parts.wallet),
            notifier.clone(),
            config.clone(),
        ));
        let claims = ClaimGuard::new(Arc::clone(&orchestrator));
        let disclosure = DisclosureHandshake::new(
            Arc::clone(&live),
            parts.chain,
            parts.wallet,
            parts.oracle,
            notifier.clone(),
            config.clone(),
        );

        info!(
            network = %crate::config::network_name(config.network_id),
            disclosure = ?config.disclosure_mode,
            "confidential token client ready"
        );

        Ok(Self {
            config,
            live,
            inputs,
            orchestrator,
            claims,
            disclosure,
            notifier,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn account(&self) -> Address {
        self.orchestrator.wallet().address()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.notifier.subscribe()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn claims(&self) -> &ClaimGuard {
        &self.claims
    }

    pub fn disclosure(&self) -> &DisclosureHandshake {
        &self.disclosure
    }

    // -- session ------------------------------------------------------------

    pub fn attach_encryption(&self, service: Arc<dyn EncryptionService>) {
        self.inputs.attach(service);
    }

    pub fn detach_encryption(&self) {
        self.inputs.detach();
    }

    pub fn network_id(&self) -> u64 {
        self.live.network_id()
    }

    /// Switches network. In-flight operations on the old network abandon
    /// themselves at their next checkpoint.
    pub fn switch_network(&self, network_id: u64) {
        self.live.switch_network(network_id);
    }

    // -- registry -----------------------------------------------------------

    pub fn resolve(&self, token: &TokenSymbol) -> Result<TokenBinding, EngineError> {
        self.live.snapshot(token)
    }

    pub fn list_tokens(&self) -> Result<Vec<TokenBinding>, EngineError> {
        self.live.resolver().list(self.live.network_id())
    }

    pub fn register_token(&self, token: DeployedToken) -> Result<(), EngineError> {
        self.live.register(token)
    }

    // -- operations ---------------------------------------------------------

    pub async fn submit(
        &self,
        token: &TokenSymbol,
        op: Operation,
    ) -> Result<OperationOutcome, EngineError> {
        self.orchestrator.submit(token, op).await
    }

    pub async fn mint(
        &self,
        token: &TokenSymbol,
        to: Address,
        amount: u64,
    ) -> Result<OperationOutcome, EngineError> {
        self.submit(token, Operation::Mint { to, amount }).await
    }

    pub async fn burn(
        &self,
        token: &TokenSymbol,
        from: Address,
        amount: u64,
    ) -> Result<OperationOutcome, EngineError> {
        self.submit(token, Operation::Burn { from, amount }).await
    }

    pub async fn transfer(
        &self,
        token: &TokenSymbol,
        to: Address,
        amount: u64,
    ) -> Result<OperationOutcome, EngineError> {
        self.submit(token, Operation::Transfer { to, amount }).await
    }

    pub async fn batch_transfer(
        &self,
        token: &TokenSymbol,
        recipients: Vec<Address>,
        amounts: Vec<u64>,
    ) -> Result<OperationOutcome, EngineError> {
        self.submit(
            token,
            Operation::BatchTransfer {
                recipients,
                amounts,
            },
        )
        .await
    }

    pub async fn batch_mint(
        &self,
        token: &TokenSymbol,
        recipients: Vec<Address>,
        amounts: Vec<u64>,
    ) -> Result<OperationOutcome, EngineError> {
        self.submit(
            token,
            Operation::BatchMint {
                recipients,
                amounts,
            },
        )
        .await
    }

    pub async fn can_claim(&self, token: &TokenSymbol) -> Result<Outcome<bool>, EngineError> {
        self.claims.can_claim(self.account(), token).await
    }

    pub async fn claim(
        &self,
        token: &TokenSymbol,
        amount: u64,
    ) -> Result<OperationOutcome, EngineError> {
        self.claims.claim(self.account(), token, amount).await
    }

    pub async fn refresh_balance(
        &self,
        token: &TokenSymbol,
    ) -> Result<Outcome<BalanceStatus>, EngineError> {
        self.orchestrator.refresh_balance(token).await
    }

    /// Discloses and decrypts the wallet account's balance of `token`.
    pub async fn reveal_balance(&self, token: &TokenSymbol) -> Result<RevealOutcome, EngineError> {
        self.disclosure.reveal(self.account(), token).await
    }
}
