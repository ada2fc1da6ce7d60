//! # Disclosure & Decryption Handshake
//!
//! Revealing a confidential balance to its owner takes two round trips to
//! the chain, one to the wallet, and one to the decryption oracle:
//!
//! ```text
//! Idle → FetchingBalance → NoBalance                      (terminal)
//!                        → BalanceFetched
//!      → Disclosing → AwaitingDisclosureConfirm → Disclosed
//!      → GeneratingKeypair → ConstructingConsent → AwaitingSignature
//!      → RequestingDecryption → Decrypted                 (terminal)
//! any  → Failed                                           (terminal)
//! ```
//!
//! The disclose transaction runs before every decryption attempt, never
//! cached across reveals. The ephemeral keypair is generated per attempt and
//! dropped with the handshake.
//!
//! Only one handshake per `(account, token)` runs at a time. A second
//! `reveal` while one is in flight is rejected with
//! [`EngineError::HandshakeInProgress`].

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::{ConfidentialTokenChain, ContractCall, ContractMethod};
use crate::config::{DisclosureMode, EngineConfig};
use crate::error::EngineError;
use crate::events::{EventKind, Notifier};
use crate::fhe::{
    CiphertextRequest, ConsentPayload, DecryptionOracle, EphemeralKeypair, UserDecryptRequest,
    ValidityWindow,
};
use crate::guard::InFlight;
use crate::registry::{LiveBindings, TokenBinding, TokenSymbol};
use crate::types::{Address, ClearValue, Handle};
use crate::units;
use crate::wallet::Wallet;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Where a handshake is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    FetchingBalance,
    /// Terminal: the balance handle is zero.
    NoBalance,
    BalanceFetched,
    Disclosing,
    AwaitingDisclosureConfirm,
    Disclosed,
    GeneratingKeypair,
    ConstructingConsent,
    AwaitingSignature,
    RequestingDecryption,
    /// Terminal.
    Decrypted,
    /// Terminal.
    Failed(EngineError),
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NoBalance | Self::Decrypted | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition(&self, next: &HandshakeState) -> bool {
        use HandshakeState::*;
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed(_)) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, FetchingBalance)
                | (FetchingBalance, NoBalance)
                | (FetchingBalance, BalanceFetched)
                | (BalanceFetched, Disclosing)
                | (Disclosing, AwaitingDisclosureConfirm)
                | (AwaitingDisclosureConfirm, Disclosed)
                | (Disclosed, GeneratingKeypair)
                | (GeneratingKeypair, ConstructingConsent)
                | (ConstructingConsent, AwaitingSignature)
                | (AwaitingSignature, RequestingDecryption)
                | (RequestingDecryption, Decrypted)
        )
    }

    /// Short label used in progress events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingBalance => "fetching_balance",
            Self::NoBalance => "no_balance",
            Self::BalanceFetched => "balance_fetched",
            Self::Disclosing => "disclosing",
            Self::AwaitingDisclosureConfirm => "awaiting_disclosure_confirm",
            Self::Disclosed => "disclosed",
            Self::GeneratingKeypair => "generating_keypair",
            Self::ConstructingConsent => "constructing_consent",
            Self::AwaitingSignature => "awaiting_signature",
            Self::RequestingDecryption => "requesting_decryption",
            Self::Decrypted => "decrypted",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "failed: {err}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Tracks one handshake's state and every state it has been in.
#[derive(Debug)]
pub struct HandshakeMachine {
    state: HandshakeState,
    history: Vec<HandshakeState>,
}

impl Default for HandshakeMachine {
    fn default() -> Self {
        Self {
            state: HandshakeState::Idle,
            history: vec![HandshakeState::Idle],
        }
    }
}

impl HandshakeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn history(&self) -> &[HandshakeState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Moves to `next`. Illegal transitions leave the state untouched and
    /// return `false`; terminal states never change.
    pub fn advance(&mut self, next: HandshakeState) -> bool {
        if !self.state.can_transition(&next) {
            warn!(from = %self.state, to = %next, "ignoring illegal handshake transition");
            return false;
        }
        self.state = next.clone();
        self.history.push(next);
        true
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A decrypted balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearBalance {
    pub token: TokenSymbol,
    pub handle: Handle,
    /// Base units as the oracle returned them.
    pub raw: u128,
    pub decimals: u8,
    /// Whole units, fraction truncated.
    pub whole: u128,
    /// Full decimal rendering, e.g. `"1000"` or `"0.5"`.
    pub display: String,
}

/// How a reveal ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    /// The handle is zero. Nothing to decrypt.
    NoBalance,
    Decrypted(ClearBalance),
    /// The binding changed mid-flight. The continuation was dropped.
    Abandoned,
}

// ---------------------------------------------------------------------------
// Handshake Driver
// ---------------------------------------------------------------------------

/// Runs disclosure handshakes.
pub struct DisclosureHandshake {
    live: Arc<LiveBindings>,
    chain: Arc<dyn ConfidentialTokenChain>,
    wallet: Arc<dyn Wallet>,
    oracle: Arc<dyn DecryptionOracle>,
    notifier: Notifier,
    config: EngineConfig,
    in_flight: InFlight<(Address, TokenSymbol)>,
}

impl DisclosureHandshake {
    pub fn new(
        live: Arc<LiveBindings>,
        chain: Arc<dyn ConfidentialTokenChain>,
        wallet: Arc<dyn Wallet>,
        oracle: Arc<dyn DecryptionOracle>,
        notifier: Notifier,
        config: EngineConfig,
    ) -> Self {
        Self {
            live,
            chain,
            wallet,
            oracle,
            notifier,
            config,
            in_flight: InFlight::new(),
        }
    }

    pub fn is_in_flight(&self, account: Address, token: &TokenSymbol) -> bool {
        self.in_flight.contains(&(account, token.clone()))
    }

    /// Reveals `account`'s balance of `token`.
    pub async fn reveal(
        &self,
        account: Address,
        token: &TokenSymbol,
    ) -> Result<RevealOutcome, EngineError> {
        let wallet = self.wallet.address();
        if account != wallet {
            return Err(EngineError::AccountMismatch {
                expected: wallet,
                got: account,
            });
        }
        let Some(_ticket) = self.in_flight.try_enter((account, token.clone())) else {
            return Err(EngineError::HandshakeInProgress {
                account,
                symbol: token.clone(),
            });
        };

        let op_id = Uuid::new_v4();
        let mut machine = HandshakeMachine::new();
        info!(%op_id, %token, %account, "balance reveal started");

        let result = self.drive(op_id, account, token, &mut machine).await;
        match result {
            Ok(outcome) => {
                if let RevealOutcome::Decrypted(balance) = &outcome {
                    info!(%op_id, %token, "balance decrypted");
                    self.notifier.succeeded(
                        op_id,
                        token,
                        format!("decrypted {} {token}", balance.display),
                    );
                } else {
                    self.notifier.succeeded(op_id, token, "no balance");
                }
                Ok(outcome)
            }
            Err(EngineError::Stale { .. }) => {
                debug!(%op_id, %token, state = %machine.state(), "binding changed mid-handshake, abandoned");
                Ok(RevealOutcome::Abandoned)
            }
            Err(err) => {
                machine.advance(HandshakeState::Failed(err.clone()));
                warn!(%op_id, %token, error = %err, "balance reveal failed");
                self.notifier.failed(op_id, token, err.to_string());
                Err(err)
            }
        }
    }

    fn enter(
        &self,
        op_id: Uuid,
        token: &TokenSymbol,
        machine: &mut HandshakeMachine,
        state: HandshakeState,
    ) {
        self.notifier.progress(op_id, token, state.label());
        machine.advance(state);
    }

    async fn drive(
        &self,
        op_id: Uuid,
        account: Address,
        token: &TokenSymbol,
        machine: &mut HandshakeMachine,
    ) -> Result<RevealOutcome, EngineError> {
        let snapshot = self.live.snapshot(token)?;
        let contract = snapshot.require_address()?;

        self.enter(op_id, token, machine, HandshakeState::FetchingBalance);
        let handle = self.chain.confidential_balance_of(contract, account).await?;
        self.live.ensure_current(&snapshot)?;
        if handle.is_zero() {
            self.enter(op_id, token, machine, HandshakeState::NoBalance);
            return Ok(RevealOutcome::NoBalance);
        }
        self.enter(op_id, token, machine, HandshakeState::BalanceFetched);

        self.disclose(op_id, token, machine, &snapshot, contract, account, handle)
            .await?;

        self.enter(op_id, token, machine, HandshakeState::GeneratingKeypair);
        let keypair = EphemeralKeypair::generate();

        self.enter(op_id, token, machine, HandshakeState::ConstructingConsent);
        let validity = ValidityWindow::new(unix_now(), self.config.decrypt_duration_days);
        let payload = ConsentPayload::new(
            snapshot.network_id,
            keypair.public_bytes(),
            vec![contract],
            validity,
        );

        self.enter(op_id, token, machine, HandshakeState::AwaitingSignature);
        let signature = self.wallet.sign_typed_data(&payload).await?;
        self.live.ensure_current(&snapshot)?;

        self.enter(op_id, token, machine, HandshakeState::RequestingDecryption);
        let request = UserDecryptRequest {
            ciphertext_requests: vec![CiphertextRequest {
                handle,
                contract_address: contract,
            }],
            ephemeral_private_key: keypair.private_hex(),
            ephemeral_public_key: keypair.public_hex(),
            consent_signature: signature.to_oracle_hex(),
            contract_addresses: vec![contract],
            account,
            validity_start: validity.start.to_string(),
            validity_duration_days: validity.duration_days.to_string(),
        };
        let values = self.oracle.user_decrypt(&request).await?;
        self.live.ensure_current(&snapshot)?;

        let raw = match values.get(&handle) {
            Some(ClearValue::Number(raw)) => u128::from(*raw),
            Some(ClearValue::Bool(_)) => {
                return Err(EngineError::InvalidResult(format!(
                    "oracle returned a boolean for balance handle {handle}"
                )))
            }
            None => {
                return Err(EngineError::DecryptionFailed(format!(
                    "oracle returned no value for handle {handle}"
                )))
            }
        };

        let balance = ClearBalance {
            token: token.clone(),
            handle,
            raw,
            decimals: snapshot.decimals,
            whole: units::descale(raw, snapshot.decimals)?,
            display: units::format_units(raw, snapshot.decimals)?,
        };
        self.enter(op_id, token, machine, HandshakeState::Decrypted);
        Ok(RevealOutcome::Decrypted(balance))
    }

    /// Authorizes the holder to decrypt `handle` and waits for the
    /// authorization to be mined.
    #[allow(clippy::too_many_arguments)]
    async fn disclose(
        &self,
        op_id: Uuid,
        token: &TokenSymbol,
        machine: &mut HandshakeMachine,
        snapshot: &TokenBinding,
        contract: Address,
        account: Address,
        handle: Handle,
    ) -> Result<(), EngineError> {
        self.enter(op_id, token, machine, HandshakeState::Disclosing);
        let call = match self.config.disclosure_mode {
            DisclosureMode::DiscloseHandle => {
                snapshot.require_method(ContractMethod::DiscloseEncryptedAmount)?;
                ContractCall::DiscloseEncryptedAmount { handle }
            }
            DisclosureMode::AllowSelf => {
                snapshot.require_method(ContractMethod::AllowSelfBalanceDecrypt)?;
                ContractCall::AllowSelfBalanceDecrypt
            }
        };
        debug!(%op_id, method = %call.method(), "sending disclosure");
        let tx_hash = self.chain.send_transaction(contract, account, call).await?;
        self.notifier.emit(op_id, token, EventKind::Submitted { tx_hash });

        self.enter(op_id, token, machine, HandshakeState::AwaitingDisclosureConfirm);
        let receipt = self.chain.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(EngineError::TransactionReverted {
                tx_hash: Some(receipt.tx_hash.to_hex()),
                reason: receipt
                    .revert_reason
                    .unwrap_or_else(|| "disclosure reverted".to_string()),
            });
        }
        self.live.ensure_current(snapshot)?;
        self.enter(op_id, token, machine, HandshakeState::Disclosed);
        Ok(())
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
