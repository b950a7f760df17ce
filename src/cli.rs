use clap::{Parser, Subcommand};

use hyperprime::{LogLevel, Side};

/// Prime-broker CLI: route orders across fragmented perp markets with
/// automatic collateral preparation.
#[derive(Parser)]
#[command(name = "hyperprime", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Use the testnet venue
    #[arg(long, global = true)]
    pub testnet: bool,

    /// Hex private key (discouraged; prefer --key-env)
    #[arg(long, global = true)]
    pub key: Option<String>,

    /// Environment variable holding the private key
    #[arg(long, global = true, default_value = "HP_PRIVATE_KEY")]
    pub key_env: String,

    /// Log level: debug, info, warn, error or silent
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LogLevel,

    /// Emit JSON instead of human-readable tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable the builder fee on submissions
    #[arg(long, global = true)]
    pub no_builder_fee: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every market trading an asset
    Markets {
        /// Base asset, e.g. TSLA
        asset: String,
    },

    /// Show the aggregated orderbook for an asset
    Book {
        asset: String,

        /// Levels to show per side
        #[arg(long, default_value = "10")]
        depth: usize,
    },

    /// Show funding rates across an asset's markets
    Funding { asset: String },

    /// Quote an order without executing
    Quote {
        asset: String,

        /// buy or sell
        side: Side,

        /// Order size in base units
        size: f64,
    },

    /// Open a long (routed buy with collateral preparation)
    Long { asset: String, size: f64 },

    /// Open a short (routed sell with collateral preparation)
    Short { asset: String, size: f64 },

    /// List open positions grouped by base asset
    Positions,

    /// Show perp margin and spot balances
    Balance,
}
