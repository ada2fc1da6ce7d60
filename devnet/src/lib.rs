//! # Confidential Token Devnet
//!
//! Everything a confidential-token client talks to, in one process: a
//! chain with token contracts, an FHE coprocessor that encrypts inputs and
//! holds ciphertexts, a decryption oracle, and Ed25519 wallets.
//!
//! None of this is real FHE. Values are sealed with AES-GCM under a
//! network key and "computed on" by unsealing. What *is* faithful is the
//! protocol surface: proofs bound to `(contract, sender)`, owner-gated
//! minting, one faucet claim per account, fresh handles on every balance
//! change, per-handle ACLs, and an oracle that checks signed consent.
//!
//! - **coprocessor**: sealing, handles, input proofs.
//! - **contract**: one confidential token's on-chain rules.
//! - **chain**: contract host, receipts, transaction counters.
//! - **oracle**: user decryption behind consent and ACL checks.
//! - **wallet**: devnet accounts and consent signatures.

pub mod chain;
pub mod contract;
pub mod coprocessor;
pub mod oracle;
pub mod wallet;

use std::sync::Arc;

use ctoken_protocol::fhe::EncryptionService;
use ctoken_protocol::registry::{DeployedTokenStore, MemoryTokenStore, StaticRegistry};
use ctoken_protocol::{Collaborators, ConfidentialTokenClient, EngineConfig, TokenSymbol};
use ctoken_protocol::types::Address;
use ctoken_protocol::wallet::Wallet;

pub use chain::DevnetChain;
pub use coprocessor::Coprocessor;
pub use oracle::DevnetOracle;
pub use wallet::DevnetWallet;

/// Builtin token metadata deployed by [`Devnet::with_builtin_tokens`].
pub const BUILTIN_TOKENS: [(TokenSymbol, &str, u8); 3] = [
    (TokenSymbol::ZUsd, "Zama Confidential USD", 6),
    (TokenSymbol::ZBtc, "Zama Confidential Bitcoin", 6),
    (TokenSymbol::ZEth, "Zama Confidential Ethereum", 6),
];

/// One deployed contract and the network id it is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub symbol: TokenSymbol,
    pub network_id: u64,
    pub address: Address,
}

/// A running devnet plus the deployer account.
pub struct Devnet {
    network_id: u64,
    chain: Arc<DevnetChain>,
    oracle: Arc<DevnetOracle>,
    owner: Arc<DevnetWallet>,
    deployments: Vec<Deployment>,
}

impl Devnet {
    /// An empty devnet answering as `network_id`.
    pub fn new(network_id: u64) -> Self {
        let coprocessor = Arc::new(Coprocessor::new());
        let chain = Arc::new(DevnetChain::new(coprocessor));
        let oracle = Arc::new(DevnetOracle::new(network_id, Arc::clone(&chain)));
        Self {
            network_id,
            chain,
            oracle,
            owner: Arc::new(DevnetWallet::generate()),
            deployments: Vec::new(),
        }
    }

    /// A devnet with zUSD, zBTC and zETH deployed by the owner.
    pub fn with_builtin_tokens(network_id: u64) -> Self {
        let mut devnet = Self::new(network_id);
        for (symbol, name, decimals) in BUILTIN_TOKENS {
            devnet.deploy(&symbol, name, decimals, network_id);
        }
        devnet
    }

    pub fn network_id(&self) -> u64 {
        self.network_id
    }

    pub fn chain(&self) -> &Arc<DevnetChain> {
        &self.chain
    }

    pub fn coprocessor(&self) -> &Arc<Coprocessor> {
        self.chain.coprocessor()
    }

    pub fn oracle(&self) -> &Arc<DevnetOracle> {
        &self.oracle
    }

    /// The account that deployed, and owns, every contract.
    pub fn owner(&self) -> &Arc<DevnetWallet> {
        &self.owner
    }

    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }

    /// Address of `symbol` as registered under `network_id`.
    pub fn address_of(&self, symbol: &TokenSymbol, network_id: u64) -> Option<Address> {
        self.deployments
            .iter()
            .rev()
            .find(|d| &d.symbol == symbol && d.network_id == network_id)
            .map(|d| d.address)
    }

    /// Deploys a contract owned by [`Self::owner`] and records it under
    /// `network_id`. Registering the same symbol under two network ids
    /// gives two independent contracts on this one chain, which is how
    /// network switches are exercised.
    pub fn deploy(
        &mut self,
        symbol: &TokenSymbol,
        name: &str,
        decimals: u8,
        network_id: u64,
    ) -> Address {
        let address = self
            .chain
            .deploy(symbol.as_str(), name, decimals, self.owner.address());
        self.oracle.accept_network(network_id);
        self.deployments.push(Deployment {
            symbol: symbol.clone(),
            network_id,
            address,
        });
        address
    }

    /// Builtin registry with every builtin deployment filled in.
    pub fn registry(&self) -> StaticRegistry {
        self.deployments
            .iter()
            .filter(|d| d.symbol.is_builtin())
            .fold(StaticRegistry::builtin(), |registry, d| {
                registry.with_deployment(d.symbol.clone(), d.network_id, d.address)
            })
    }

    /// Collaborators wired to this devnet for `wallet`.
    pub fn collaborators(
        &self,
        wallet: Arc<dyn Wallet>,
        store: Arc<dyn DeployedTokenStore>,
    ) -> Collaborators {
        let encryption: Arc<dyn EncryptionService> = self.coprocessor().clone();
        Collaborators {
            chain: self.chain.clone(),
            wallet,
            oracle: self.oracle.clone(),
            encryption: Some(encryption),
            store,
        }
    }

    /// A client for `wallet` with an in-memory token store.
    pub fn client(
        &self,
        wallet: Arc<dyn Wallet>,
        config: EngineConfig,
    ) -> anyhow::Result<ConfidentialTokenClient> {
        self.client_with_store(wallet, config, Arc::new(MemoryTokenStore::new()))
    }

    pub fn client_with_store(
        &self,
        wallet: Arc<dyn Wallet>,
        config: EngineConfig,
        store: Arc<dyn DeployedTokenStore>,
    ) -> anyhow::Result<ConfidentialTokenClient> {
        let client =
            ConfidentialTokenClient::new(config, self.registry(), self.collaborators(wallet, store))?;
        Ok(client)
    }

    /// Default engine config pointed at this devnet.
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            network_id: self.network_id,
            ..EngineConfig::default()
        }
    }
}
