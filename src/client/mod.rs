//! Narrow interface to the venue. The core never talks HTTP directly: every
//! read and write goes through [`VenueClient`], so transports (and tests)
//! plug in behind one trait.

pub mod http;
pub mod types;

use alloy::primitives::Address;
use async_trait::async_trait;
use thiserror::Error;

use types::{
    AssetContext, BuilderInfo, CancelRequest, ClearinghouseState, ExchangeResponseStatus,
    FundingEntry, L2Book, OpenOrder, OrderRequest, PerpDex, PerpMeta, SpotBalances, SpotMeta,
    UserFill,
};

/// Transport-level failures. The core converts these into
/// [`PrimeError::Client`](crate::errors::PrimeError) at its boundary.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP error: status {status}, body: {body}")]
    Http { status: u16, body: String },

    #[error("json parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Typed read/write surface of the venue consumed by the core.
///
/// Read methods return snapshots; write methods submit signed exchange
/// actions. Implementations must be safe under concurrent reads and
/// serialize writes internally.
#[async_trait]
pub trait VenueClient: Send + Sync {
    // ---- metadata discovery ----

    /// First-party perp universe.
    async fn meta(&self) -> ClientResult<PerpMeta>;

    /// Perp universe plus per-asset contexts for one deployer
    /// (`None` = first-party markets).
    async fn meta_and_asset_ctxs(
        &self,
        dex: Option<&str>,
    ) -> ClientResult<(PerpMeta, Vec<AssetContext>)>;

    /// Deployer list. Slot 0 is `None` (first-party markets).
    async fn perp_dexs(&self) -> ClientResult<Vec<Option<PerpDex>>>;

    async fn spot_meta(&self) -> ClientResult<SpotMeta>;

    // ---- market data ----

    /// Orderbook snapshot for one market.
    async fn l2_book(&self, coin: &str) -> ClientResult<L2Book>;

    // ---- account reads ----

    async fn clearinghouse_state(&self, user: Address) -> ClientResult<ClearinghouseState>;

    async fn spot_clearinghouse_state(&self, user: Address) -> ClientResult<SpotBalances>;

    async fn open_orders(&self, user: Address) -> ClientResult<Vec<OpenOrder>>;

    async fn user_fills(&self, user: Address) -> ClientResult<Vec<UserFill>>;

    async fn funding_history(
        &self,
        coin: &str,
        start_ms: u64,
        end_ms: Option<u64>,
    ) -> ClientResult<Vec<FundingEntry>>;

    // ---- writes ----

    async fn place_order(
        &self,
        order: &OrderRequest,
        builder: Option<&BuilderInfo>,
    ) -> ClientResult<ExchangeResponseStatus>;

    /// Submit a group of orders as one logical batch.
    async fn batch_orders(
        &self,
        orders: &[OrderRequest],
        builder: Option<&BuilderInfo>,
    ) -> ClientResult<ExchangeResponseStatus>;

    async fn cancel_order(&self, cancel: &CancelRequest) -> ClientResult<ExchangeResponseStatus>;

    // ---- builder-fee lifecycle ----

    /// Currently approved max builder fee, in tenths of a basis point.
    async fn max_builder_fee(&self, user: Address, builder: Address) -> ClientResult<u64>;

    /// Approve a builder fee. `max_fee_rate` is a percent string, e.g. "0.05%".
    async fn approve_builder_fee(
        &self,
        builder: Address,
        max_fee_rate: &str,
    ) -> ClientResult<ExchangeResponseStatus>;

    // ---- collateral & account mode ----

    /// Move USDC between the perp and spot balances.
    async fn usd_class_transfer(
        &self,
        amount: f64,
        to_perp: bool,
    ) -> ClientResult<ExchangeResponseStatus>;

    /// Enable or disable dex abstraction (USDC markets draw margin from the
    /// perp balance, others from the spot balance of their token).
    async fn set_dex_abstraction(&self, enabled: bool) -> ClientResult<ExchangeResponseStatus>;

    async fn set_leverage(
        &self,
        coin: &str,
        leverage: u32,
        is_cross: bool,
    ) -> ClientResult<ExchangeResponseStatus>;
}
