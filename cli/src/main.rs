// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ctoken
//!
//! Entry point for the `ctoken` binary.
//!
//! - `tokens`  : list the tokens known on a network
//! - `register`: persist a user-deployed token contract
//! - `demo`    : run mint, reveal and faucet claims against a devnet
//! - `version` : print build version information

mod cli;
mod logging;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use ctoken_devnet::{Devnet, DevnetWallet};
use ctoken_protocol::disclosure::RevealOutcome;
use ctoken_protocol::events::EventKind;
use ctoken_protocol::registry::{
    DeployedToken, SledTokenStore, StaticRegistry, TokenBinding, TokenResolver, TokenSymbol,
};
use ctoken_protocol::wallet::Wallet;
use ctoken_protocol::{EngineConfig, EngineError};

use cli::{Commands, CtokenCli};

const DEFAULT_LOG_FILTER: &str = "ctoken=info,ctoken_protocol=info,ctoken_devnet=info";

/// Seed of the demo holder's wallet, so repeated runs show the same account.
const DEMO_HOLDER_SEED: [u8; 32] = [0x5a; 32];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CtokenCli::parse();
    logging::init_logging(DEFAULT_LOG_FILTER, cli.log_format);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Tokens(args) => list_tokens(&cli.data_dir, args),
        Commands::Register(args) => register_token(&cli.data_dir, args),
        Commands::Demo(args) => run_demo(config, args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    Ok(config)
}

fn open_store(data_dir: &Path) -> Result<Arc<SledTokenStore>> {
    let path = data_dir.join("tokens");
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create data directory: {}", path.display()))?;
    let store = SledTokenStore::open(&path)
        .with_context(|| format!("failed to open token store at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "token store opened");
    Ok(Arc::new(store))
}

fn known_tokens(data_dir: &Path, args: &cli::TokensArgs) -> Result<Vec<TokenBinding>> {
    let mut registry = StaticRegistry::builtin();
    if let Some(path) = &args.deployments {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read deployments from {}", path.display()))?;
        registry = registry.with_deployments_json(&json)?;
    }

    let resolver = TokenResolver::new(registry, open_store(data_dir)?);
    Ok(resolver.list(args.network)?)
}

fn list_tokens(data_dir: &Path, args: cli::TokensArgs) -> Result<()> {
    let tokens = known_tokens(data_dir, &args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
        return Ok(());
    }

    println!(
        "Tokens on {}:",
        ctoken_protocol::config::network_name(args.network)
    );
    for token in tokens {
        let address = token
            .contract_address
            .map(|a| a.to_hex())
            .unwrap_or_else(|| "not deployed".to_string());
        println!(
            "  {:<8} {:>2} decimals  {}",
            token.symbol.as_str(),
            token.decimals,
            address
        );
    }
    Ok(())
}

fn register_token(data_dir: &Path, args: cli::RegisterArgs) -> Result<()> {
    let resolver = TokenResolver::new(StaticRegistry::builtin(), open_store(data_dir)?);
    let token = DeployedToken {
        symbol: args.symbol,
        name: args.name,
        address: args.address,
        decimals: args.decimals,
        network_id: args.network,
        deployer: args.deployer,
        deployed_at: Utc::now(),
    };
    let symbol = token.symbol.clone();
    resolver.register(token)?;

    println!(
        "Registered {symbol} at {} on {}.",
        args.address,
        ctoken_protocol::config::network_name(args.network)
    );
    Ok(())
}

/// Mints zUSD to a holder, reveals it, then claims zBTC twice.
async fn run_demo(config: EngineConfig, args: cli::DemoArgs) -> Result<()> {
    let devnet = Devnet::with_builtin_tokens(args.network);
    let config = EngineConfig {
        network_id: args.network,
        ..config
    };

    let owner = devnet
        .client(devnet.owner().clone(), config.clone())
        .context("failed to start owner client")?;
    let holder_wallet = Arc::new(DevnetWallet::from_seed(DEMO_HOLDER_SEED));
    let holder = devnet
        .client(holder_wallet.clone(), config)
        .context("failed to start holder client")?;
    let holder_address = holder_wallet.address();

    let mut events = holder.subscribe();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.kind {
                EventKind::Progress { step } => {
                    tracing::debug!(op_id = %event.op_id, token = %event.token, %step, "progress")
                }
                EventKind::Submitted { tx_hash } => {
                    tracing::info!(op_id = %event.op_id, token = %event.token, %tx_hash, "submitted")
                }
                EventKind::Succeeded { message } => {
                    tracing::info!(op_id = %event.op_id, token = %event.token, "{message}")
                }
                EventKind::Failed { message } => {
                    tracing::warn!(op_id = %event.op_id, token = %event.token, "{message}")
                }
            }
        }
    });

    println!("Devnet on {}", ctoken_protocol::config::network_name(args.network));
    println!("  owner  : {}", owner.account());
    println!("  holder : {holder_address}");

    let zusd = TokenSymbol::ZUsd;
    let receipt = owner
        .mint(&zusd, holder_address, args.amount)
        .await?
        .completed()
        .context("mint did not complete")?;
    println!(
        "Minted {} {zusd} to holder in block {} ({})",
        args.amount, receipt.block_number, receipt.tx_hash
    );

    match holder.reveal_balance(&zusd).await? {
        RevealOutcome::Decrypted(balance) => {
            println!("Holder balance: {} {zusd} (handle {})", balance.display, balance.handle)
        }
        RevealOutcome::NoBalance => println!("Holder has no {zusd}"),
        RevealOutcome::Abandoned => println!("Reveal abandoned"),
    }

    let zbtc = TokenSymbol::ZBtc;
    for attempt in 1..=2 {
        match holder.claim(&zbtc, args.faucet).await {
            Ok(outcome) => match outcome.completed() {
                Some(receipt) => println!(
                    "Claim #{attempt}: received {} {zbtc} in block {}",
                    args.faucet, receipt.block_number
                ),
                None => println!("Claim #{attempt}: skipped"),
            },
            Err(err @ EngineError::AlreadyClaimed { .. }) => {
                println!("Claim #{attempt}: refused, {err}")
            }
            Err(err) => return Err(err.into()),
        }
    }

    if let RevealOutcome::Decrypted(balance) = holder.reveal_balance(&zbtc).await? {
        println!("Holder balance: {} {zbtc}", balance.display);
    }

    println!(
        "{} transactions mined, last block {}",
        devnet.chain().total_transactions(),
        devnet.chain().block_number()
    );

    drop(holder);
    reporter.abort();
    Ok(())
}

fn print_version() {
    println!("ctoken   {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> CtokenCli {
        CtokenCli::try_parse_from(args).unwrap()
    }

    #[test]
    fn registered_token_is_listed_from_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        let cli = parse(&[
            "ctoken",
            "-d",
            data_dir,
            "register",
            "--symbol",
            "zGOLD",
            "--name",
            "Confidential Gold",
            "--address",
            "0x00000000000000000000000000000000000000aa",
            "--decimals",
            "2",
        ]);
        let Commands::Register(args) = cli.command else {
            panic!("expected register");
        };
        register_token(&cli.data_dir, args).unwrap();

        let cli = parse(&["ctoken", "-d", data_dir, "tokens"]);
        let Commands::Tokens(args) = cli.command else {
            panic!("expected tokens");
        };
        let tokens = known_tokens(&cli.data_dir, &args).unwrap();
        let symbols: Vec<&str> = tokens.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, ["zUSD", "zBTC", "zETH", "zGOLD"]);

        let gold = &tokens[3];
        assert_eq!(gold.decimals, 2);
        assert_eq!(
            gold.contract_address.map(|a| a.to_hex()).as_deref(),
            Some("0x00000000000000000000000000000000000000aa")
        );
    }

    #[test]
    fn registration_on_another_network_is_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        let cli = parse(&[
            "ctoken",
            "-d",
            data_dir,
            "register",
            "--symbol",
            "zGOLD",
            "--name",
            "Confidential Gold",
            "--address",
            "0x00000000000000000000000000000000000000aa",
            "--network",
            "31337",
        ]);
        let Commands::Register(args) = cli.command else {
            panic!("expected register");
        };
        register_token(&cli.data_dir, args).unwrap();

        let cli = parse(&["ctoken", "-d", data_dir, "tokens"]);
        let Commands::Tokens(args) = cli.command else {
            panic!("expected tokens");
        };
        assert_eq!(known_tokens(&cli.data_dir, &args).unwrap().len(), 3);
    }
}
