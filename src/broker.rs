//! The `PrimeBroker` facade wires the registry, aggregator, router,
//! collateral manager and executor together and exposes the public
//! quote/execute/position surface.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use alloy::primitives::Address;
use serde::Serialize;
use tracing::{info, warn};

use crate::book::{AggregatedBook, BookAggregator};
use crate::client::VenueClient;
use crate::client::http::HttpVenueClient;
use crate::client::types::FundingEntry;
use crate::collateral::CollateralManager;
use crate::config::{ResolvedConfig, SdkConfig};
use crate::errors::{PrimeError, Result};
use crate::executor::{ExecutionReceipt, Executor, SplitExecutionReceipt};
use crate::positions::{LogicalPosition, PositionManager};
use crate::registry::{MarketGroup, MarketRegistry, NATIVE_COLLATERAL, PerpMarket};
use crate::routing::{Quote, Router, SplitQuote};
use crate::types::Side;

#[derive(Debug, Clone, Serialize)]
pub struct SpotTokenBalance {
    pub token: String,
    pub total: f64,
    pub hold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceSummary {
    pub account_value: f64,
    pub total_margin_used: f64,
    pub withdrawable: f64,
    pub spot_balances: Vec<SpotTokenBalance>,
}

pub struct PrimeBroker {
    config: ResolvedConfig,
    client: Arc<dyn VenueClient>,
    registry: Arc<MarketRegistry>,
    aggregator: BookAggregator,
    router: Router,
    collateral: Arc<CollateralManager>,
    executor: Executor,
    positions: PositionManager,
    user_collateral: RwLock<HashSet<String>>,
    connected: AtomicBool,
}

impl PrimeBroker {
    /// Build with the bundled read-only client. Trading requires injecting
    /// a signing transport via [`PrimeBroker::with_client`].
    pub fn new(config: SdkConfig) -> Result<Self> {
        let testnet = config.testnet;
        Self::with_client(config, Arc::new(HttpVenueClient::new(testnet)))
    }

    pub fn with_client(config: SdkConfig, client: Arc<dyn VenueClient>) -> Result<Self> {
        let config = config.build()?;
        let registry = Arc::new(MarketRegistry::new(Arc::clone(&client)));
        let collateral = Arc::new(CollateralManager::new(Arc::clone(&client)));
        let aggregator = BookAggregator::new(Arc::clone(&client), Arc::clone(&registry));
        let router = Router::new(
            Arc::clone(&registry),
            BookAggregator::new(Arc::clone(&client), Arc::clone(&registry)),
            Arc::clone(&collateral),
        );
        let executor = Executor::new(Arc::clone(&client), config.builder);
        let positions = PositionManager::new(Arc::clone(&client), Arc::clone(&registry));

        Ok(Self {
            config,
            client,
            registry,
            aggregator,
            router,
            collateral,
            executor,
            positions,
            user_collateral: RwLock::new(HashSet::from([NATIVE_COLLATERAL.to_string()])),
            connected: AtomicBool::new(false),
        })
    }

    /// Discover markets and resolve the user's collateral set. Idempotent;
    /// re-running refreshes both.
    pub async fn connect(&self) -> Result<()> {
        self.registry.discover().await?;
        self.refresh_user_collateral().await;
        self.connected.store(true, Ordering::SeqCst);
        info!(
            groups = self.registry.get_all_groups().len(),
            "connected to venue"
        );
        Ok(())
    }

    async fn refresh_user_collateral(&self) {
        let mut collateral = HashSet::from([NATIVE_COLLATERAL.to_string()]);
        if let Some(user) = self.config.wallet_address {
            match self.client.spot_clearinghouse_state(user).await {
                Ok(state) => {
                    for balance in &state.balances {
                        if balance.total.parse::<f64>().unwrap_or(0.0) > 0.0 {
                            collateral.insert(balance.coin.clone());
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "spot balances unavailable, assuming USDC-only collateral")
                }
            }
        }
        *self
            .user_collateral
            .write()
            .expect("collateral lock poisoned") = collateral;
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PrimeError::NotConnected)
        }
    }

    fn wallet(&self) -> Result<Address> {
        self.config.wallet_address.ok_or(PrimeError::NoWallet)
    }

    fn trading_wallet(&self) -> Result<Address> {
        if !self.config.has_wallet {
            return Err(PrimeError::NoWallet);
        }
        self.wallet()
    }

    fn slippage(&self, slippage: Option<f64>) -> f64 {
        slippage.unwrap_or(self.config.default_slippage)
    }

    pub fn user_collateral(&self) -> HashSet<String> {
        self.user_collateral
            .read()
            .expect("collateral lock poisoned")
            .clone()
    }

    // ---- market discovery ----

    pub fn markets(&self, base_asset: &str) -> Result<MarketGroup> {
        self.ensure_connected()?;
        self.registry.get_group(base_asset)
    }

    pub fn all_markets(&self) -> Result<Vec<MarketGroup>> {
        self.ensure_connected()?;
        Ok(self.registry.get_all_groups())
    }

    pub fn markets_with_alternatives(&self) -> Result<Vec<MarketGroup>> {
        self.ensure_connected()?;
        Ok(self.registry.get_groups_with_alternatives())
    }

    // ---- market data ----

    pub async fn book(&self, base_asset: &str) -> Result<AggregatedBook> {
        self.ensure_connected()?;
        // Surface NoMarkets before fetching anything.
        self.registry.get_group(base_asset)?;
        let book = self.aggregator.aggregate(base_asset).await?;
        if book.is_empty() && !book.failed_coins.is_empty() {
            return Err(PrimeError::MarketDataUnavailable {
                base_asset: base_asset.to_string(),
                failed_coins: book.failed_coins,
            });
        }
        Ok(book)
    }

    /// Per-market funding snapshot for one asset (markets carry their
    /// funding, OI and mark from discovery).
    pub fn funding(&self, base_asset: &str) -> Result<Vec<PerpMarket>> {
        self.ensure_connected()?;
        self.registry.get_markets(base_asset)
    }

    pub async fn funding_history(
        &self,
        coin: &str,
        start_ms: u64,
        end_ms: Option<u64>,
    ) -> Result<Vec<FundingEntry>> {
        self.ensure_connected()?;
        Ok(self.client.funding_history(coin, start_ms, end_ms).await?)
    }

    // ---- quoting ----

    pub async fn quote(
        &self,
        base_asset: &str,
        side: Side,
        size: f64,
        slippage: Option<f64>,
    ) -> Result<Quote> {
        self.ensure_connected()?;
        self.router
            .quote(
                base_asset,
                side,
                size,
                &self.user_collateral(),
                self.slippage(slippage),
            )
            .await
    }

    pub async fn quote_split(
        &self,
        base_asset: &str,
        side: Side,
        size: f64,
        slippage: Option<f64>,
    ) -> Result<SplitQuote> {
        self.ensure_connected()?;
        self.router
            .quote_split(
                base_asset,
                side,
                size,
                &self.user_collateral(),
                self.slippage(slippage),
            )
            .await
    }

    // ---- execution ----

    /// Execute a previously obtained single-market quote.
    pub async fn execute_quote(&self, quote: &Quote) -> Result<ExecutionReceipt> {
        self.ensure_connected()?;
        let user = self.trading_wallet()?;
        Ok(self.executor.execute(&quote.plan, user).await)
    }

    /// Route and execute a buy, splitting across markets when that improves
    /// the fill. Collateral is prepared automatically.
    pub async fn long(
        &self,
        base_asset: &str,
        size: f64,
        slippage: Option<f64>,
    ) -> Result<SplitExecutionReceipt> {
        self.market_order(base_asset, Side::Buy, size, slippage).await
    }

    /// Route and execute a sell. See [`PrimeBroker::long`].
    pub async fn short(
        &self,
        base_asset: &str,
        size: f64,
        slippage: Option<f64>,
    ) -> Result<SplitExecutionReceipt> {
        self.market_order(base_asset, Side::Sell, size, slippage)
            .await
    }

    async fn market_order(
        &self,
        base_asset: &str,
        side: Side,
        size: f64,
        slippage: Option<f64>,
    ) -> Result<SplitExecutionReceipt> {
        self.ensure_connected()?;
        let user = self.trading_wallet()?;
        let quote = self
            .router
            .quote_split(
                base_asset,
                side,
                size,
                &self.user_collateral(),
                self.slippage(slippage),
            )
            .await?;
        Ok(self
            .executor
            .execute_split(&quote.plan, &self.collateral, user)
            .await)
    }

    // ---- account ----

    pub async fn positions(&self) -> Result<Vec<LogicalPosition>> {
        self.ensure_connected()?;
        let user = self.wallet()?;
        self.positions.positions(user).await
    }

    pub async fn grouped_positions(&self) -> Result<BTreeMap<String, Vec<LogicalPosition>>> {
        self.ensure_connected()?;
        let user = self.wallet()?;
        self.positions.grouped_positions(user).await
    }

    pub async fn balances(&self) -> Result<BalanceSummary> {
        self.ensure_connected()?;
        let user = self.wallet()?;

        let perp = self.client.clearinghouse_state(user).await?;
        let spot = self.client.spot_clearinghouse_state(user).await?;

        Ok(BalanceSummary {
            account_value: perp.margin_summary.account_value.parse().unwrap_or(0.0),
            total_margin_used: perp
                .margin_summary
                .total_margin_used
                .parse()
                .unwrap_or(0.0),
            withdrawable: perp.withdrawable.parse().unwrap_or(0.0),
            spot_balances: spot
                .balances
                .iter()
                .map(|b| SpotTokenBalance {
                    token: b.coin.clone(),
                    total: b.total.parse().unwrap_or(0.0),
                    hold: b.hold.parse().unwrap_or(0.0),
                })
                .collect(),
        })
    }

    pub async fn set_leverage(&self, coin: &str, leverage: u32, is_cross: bool) -> Result<()> {
        self.ensure_connected()?;
        self.trading_wallet()?;
        self.client
            .set_leverage(coin, leverage, is_cross)
            .await
            .map_err(PrimeError::from)?
            .into_statuses()
            .map_err(PrimeError::execution)?;
        Ok(())
    }
}
