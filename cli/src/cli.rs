//! # CLI Interface
//!
//! `clap` derive definitions for the `ctoken` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use ctoken_protocol::config::{NETWORK_ID_HARDHAT, NETWORK_ID_SEPOLIA};
use ctoken_protocol::types::Address;

use crate::logging::LogFormat;

/// Confidential token client.
///
/// Lists and registers confidential-token contracts, and runs the full
/// mint / reveal / claim flow against an in-process devnet.
#[derive(Parser, Debug)]
#[command(
    name = "ctoken",
    about = "Confidential token client",
    version,
    propagate_version = true
)]
pub struct CtokenCli {
    /// Directory holding the deployed-token store.
    #[arg(long, short = 'd', env = "CTOKEN_DATA_DIR", default_value = ".ctoken", global = true)]
    pub data_dir: PathBuf,

    /// Engine configuration file (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', env = "CTOKEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "CTOKEN_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every token known on a network.
    Tokens(TokensArgs),
    /// Register a confidential-token contract you deployed.
    Register(RegisterArgs),
    /// Mint, reveal, and claim twice on an in-process devnet.
    Demo(DemoArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct TokensArgs {
    /// Network id.
    #[arg(long, short = 'n', default_value_t = NETWORK_ID_SEPOLIA)]
    pub network: u64,

    /// Builtin deployment table, `{ "zUSD": { "<network id>": "0x…" } }`.
    #[arg(long, env = "CTOKEN_DEPLOYMENTS")]
    pub deployments: Option<PathBuf>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub symbol: String,

    #[arg(long)]
    pub name: String,

    /// Contract address, `0x`-prefixed hex.
    #[arg(long)]
    pub address: Address,

    #[arg(long, default_value_t = 6)]
    pub decimals: u8,

    /// Network id the contract lives on.
    #[arg(long, short = 'n', default_value_t = NETWORK_ID_SEPOLIA)]
    pub network: u64,

    /// Account that deployed the contract.
    #[arg(long)]
    pub deployer: Option<Address>,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Whole zUSD units to mint.
    #[arg(long, default_value_t = 1000)]
    pub amount: u64,

    /// Whole zBTC units to request from the faucet.
    #[arg(long, default_value_t = 1)]
    pub faucet: u64,

    /// Network id the devnet answers as.
    #[arg(long, short = 'n', default_value_t = NETWORK_ID_HARDHAT)]
    pub network: u64,
}
