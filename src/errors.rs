use thiserror::Error;

use crate::client::ClientError;

/// Typed failures surfaced to SDK callers. CLI renders these as one-line
/// messages; library callers get the structured context.
#[derive(Error, Debug)]
pub enum PrimeError {
    #[error("not connected: run connect() before querying markets")]
    NotConnected,

    #[error("no wallet configured: trading requires a private key")]
    NoWallet,

    #[error("no perp markets found for '{0}'")]
    NoMarkets(String),

    #[error("market data unavailable for '{base_asset}': all book fetches failed ({})", failed_coins.join(", "))]
    MarketDataUnavailable {
        base_asset: String,
        failed_coins: Vec<String>,
    },

    #[error("insufficient liquidity for '{base_asset}': requested size {requested_size}")]
    InsufficientLiquidity {
        base_asset: String,
        requested_size: f64,
    },

    #[error("insufficient depth to fill {requested_size}")]
    InsufficientDepth { requested_size: f64 },

    #[error("order rejected: {message}")]
    Execution {
        message: String,
        /// Raw venue status payload, when the venue returned one.
        raw: Option<String>,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("collateral preparation failed: {0}")]
    Collateral(String),

    #[error("venue client error: {0}")]
    Client(#[from] ClientError),
}

impl PrimeError {
    pub fn execution(message: impl Into<String>) -> Self {
        PrimeError::Execution {
            message: message.into(),
            raw: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrimeError>;
