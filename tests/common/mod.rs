//! Shared mock venue client for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::Address;
use async_trait::async_trait;

use hyperprime::client::types::*;
use hyperprime::client::{ClientError, ClientResult, VenueClient};

/// Anvil's first dev key; derives 0xf39f…2266.
pub const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn asset_meta(name: &str) -> AssetMeta {
    AssetMeta {
        name: name.to_string(),
        sz_decimals: 3,
        max_leverage: 10,
        only_isolated: false,
        is_delisted: None,
    }
}

pub fn delisted(name: &str) -> AssetMeta {
    AssetMeta {
        is_delisted: Some(true),
        ..asset_meta(name)
    }
}

pub fn ctx(funding: &str, mark: &str) -> AssetContext {
    AssetContext {
        funding: funding.to_string(),
        open_interest: "1000".to_string(),
        mark_px: mark.to_string(),
        mid_px: Some(mark.to_string()),
        oracle_px: Some(mark.to_string()),
        day_ntl_vlm: "500000".to_string(),
    }
}

pub fn dex(name: &str, collateral_token: Option<u32>) -> PerpDex {
    PerpDex {
        name: name.to_string(),
        full_name: None,
        deployer: Some("0x0000000000000000000000000000000000000001".to_string()),
        collateral_token,
    }
}

pub fn l2(coin: &str, bids: &[(&str, &str)], asks: &[(&str, &str)]) -> L2Book {
    let side = |levels: &[(&str, &str)]| {
        levels
            .iter()
            .map(|(px, sz)| L2Level {
                px: px.to_string(),
                sz: sz.to_string(),
                n: 1,
            })
            .collect::<Vec<_>>()
    };
    L2Book {
        coin: coin.to_string(),
        levels: vec![side(bids), side(asks)],
        time: 1_700_000_000_000,
    }
}

pub fn spot_meta_with_usdh() -> SpotMeta {
    SpotMeta {
        tokens: vec![
            TokenMeta {
                name: "USDC".to_string(),
                sz_decimals: 2,
                wei_decimals: 8,
                index: 0,
                is_canonical: true,
            },
            TokenMeta {
                name: "USDH".to_string(),
                sz_decimals: 2,
                wei_decimals: 8,
                index: 1,
                is_canonical: true,
            },
        ],
        universe: vec![SpotPairMeta {
            name: "USDH/USDC".to_string(),
            tokens: [1, 0],
            index: 2,
            is_canonical: true,
        }],
    }
}

pub fn spot_balance(coin: &str, token: u32, total: &str) -> SpotBalance {
    SpotBalance {
        coin: coin.to_string(),
        token,
        hold: "0".to_string(),
        total: total.to_string(),
        entry_ntl: "0".to_string(),
    }
}

pub fn margin_summary(account_value: &str) -> MarginSummary {
    MarginSummary {
        account_value: account_value.to_string(),
        total_margin_used: "0".to_string(),
        total_ntl_pos: "0".to_string(),
        total_raw_usd: account_value.to_string(),
    }
}

pub fn clearinghouse(account_value: &str) -> ClearinghouseState {
    ClearinghouseState {
        asset_positions: vec![],
        margin_summary: margin_summary(account_value),
        cross_margin_summary: margin_summary(account_value),
        withdrawable: account_value.to_string(),
    }
}

pub fn position(coin: &str, szi: &str, entry: &str) -> AssetPosition {
    AssetPosition {
        type_string: "oneWay".to_string(),
        position: PositionData {
            coin: coin.to_string(),
            szi: szi.to_string(),
            entry_px: Some(entry.to_string()),
            leverage: Leverage {
                type_string: "cross".to_string(),
                value: 5,
            },
            liquidation_px: Some("100.0".to_string()),
            margin_used: "50".to_string(),
            position_value: "500".to_string(),
            unrealized_pnl: "12.5".to_string(),
            max_leverage: 10,
        },
    }
}

fn filled(order: &OrderRequest, oid: u64) -> ExchangeDataStatus {
    ExchangeDataStatus::Filled(FilledOrder {
        total_sz: order.sz.clone(),
        avg_px: order.limit_px.clone(),
        oid,
    })
}

fn ok_response(statuses: Vec<ExchangeDataStatus>) -> ExchangeResponseStatus {
    ExchangeResponseStatus::Ok(ExchangeResponse {
        response_type: "order".to_string(),
        data: Some(ExchangeDataStatuses { statuses }),
    })
}

/// Scriptable in-memory venue. Reads serve the configured fixtures; writes
/// are recorded in `calls` (ordered) plus per-kind logs so tests can assert
/// sequencing and payloads.
pub struct MockVenueClient {
    pub dexs: Vec<Option<PerpDex>>,
    /// Per-dex universes keyed by dex name (`None` = native).
    pub universes: HashMap<Option<String>, (PerpMeta, Vec<AssetContext>)>,
    pub failing_dexs: HashSet<String>,
    pub spot: SpotMeta,
    pub books: HashMap<String, L2Book>,
    pub failing_books: HashSet<String>,
    pub spot_balances: Vec<SpotBalance>,
    pub perp_state: ClearinghouseState,
    pub approved_builder_fee: u64,
    pub fail_usd_class_transfer: bool,
    /// Per-order error message forced on spot swap orders, when set.
    pub spot_order_error: Option<String>,
    /// Per-order error message forced on perp orders, when set.
    pub perp_order_error: Option<String>,
    /// Respond to perp orders with a resting status (IOC that crossed
    /// nothing) instead of a fill.
    pub perp_order_rests: bool,

    pub calls: Mutex<Vec<String>>,
    pub orders: Mutex<Vec<(OrderRequest, Option<BuilderInfo>)>>,
    pub batches: Mutex<Vec<(Vec<OrderRequest>, Option<BuilderInfo>)>>,
    pub approvals: Mutex<Vec<String>>,
    pub fee_checks: Mutex<u32>,
    next_oid: AtomicU64,
}

impl Default for MockVenueClient {
    fn default() -> Self {
        Self {
            dexs: vec![None],
            universes: HashMap::new(),
            failing_dexs: HashSet::new(),
            spot: spot_meta_with_usdh(),
            books: HashMap::new(),
            failing_books: HashSet::new(),
            spot_balances: vec![spot_balance("USDC", 0, "10000")],
            perp_state: clearinghouse("10000"),
            approved_builder_fee: 0,
            fail_usd_class_transfer: false,
            spot_order_error: None,
            perp_order_error: None,
            perp_order_rests: false,
            calls: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            approvals: Mutex::new(Vec::new()),
            fee_checks: Mutex::new(0),
            next_oid: AtomicU64::new(1),
        }
    }
}

impl MockVenueClient {
    /// Native TSLA market plus a `xyz:TSLA0` deployer market margined in
    /// USDH. The standard two-market fixture.
    pub fn two_market_tsla() -> Self {
        let mut mock = Self::default();
        mock.dexs = vec![None, Some(dex("xyz", Some(1)))];
        mock.universes.insert(
            None,
            (
                PerpMeta {
                    universe: vec![asset_meta("TSLA")],
                },
                vec![ctx("0.00000625", "431.25")],
            ),
        );
        mock.universes.insert(
            Some("xyz".to_string()),
            (
                PerpMeta {
                    universe: vec![asset_meta("xyz:TSLA0")],
                },
                vec![ctx("-0.0000125", "431.60")],
            ),
        );
        mock
    }

    pub fn with_book(mut self, coin: &str, bids: &[(&str, &str)], asks: &[(&str, &str)]) -> Self {
        self.books.insert(coin.to_string(), l2(coin, bids, asks));
        self
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn oid(&self) -> u64 {
        self.next_oid.fetch_add(1, Ordering::SeqCst)
    }

    fn is_spot_asset(asset: u32) -> bool {
        (10_000..100_000).contains(&asset)
    }

    fn perp_status(&self, order: &OrderRequest) -> ExchangeDataStatus {
        if Self::is_spot_asset(order.asset) {
            if let Some(msg) = &self.spot_order_error {
                return ExchangeDataStatus::Error(msg.clone());
            }
            return filled(order, self.oid());
        }
        if let Some(msg) = &self.perp_order_error {
            return ExchangeDataStatus::Error(msg.clone());
        }
        if self.perp_order_rests {
            return ExchangeDataStatus::Resting(RestingOrder {
                oid: self.oid(),
                cloid: order.cloid.clone(),
            });
        }
        filled(order, self.oid())
    }
}

#[async_trait]
impl VenueClient for MockVenueClient {
    async fn meta(&self) -> ClientResult<PerpMeta> {
        self.meta_and_asset_ctxs(None).await.map(|(meta, _)| meta)
    }

    async fn meta_and_asset_ctxs(
        &self,
        dex: Option<&str>,
    ) -> ClientResult<(PerpMeta, Vec<AssetContext>)> {
        if let Some(name) = dex {
            if self.failing_dexs.contains(name) {
                return Err(ClientError::Network(format!("dex {name} unreachable")));
            }
        }
        self.universes
            .get(&dex.map(str::to_string))
            .cloned()
            .ok_or_else(|| ClientError::Network("unknown dex".to_string()))
    }

    async fn perp_dexs(&self) -> ClientResult<Vec<Option<PerpDex>>> {
        Ok(self.dexs.clone())
    }

    async fn spot_meta(&self) -> ClientResult<SpotMeta> {
        Ok(self.spot.clone())
    }

    async fn l2_book(&self, coin: &str) -> ClientResult<L2Book> {
        if self.failing_books.contains(coin) {
            return Err(ClientError::Timeout(2_500));
        }
        self.books
            .get(coin)
            .cloned()
            .ok_or_else(|| ClientError::Network(format!("no book for {coin}")))
    }

    async fn clearinghouse_state(&self, _user: Address) -> ClientResult<ClearinghouseState> {
        Ok(self.perp_state.clone())
    }

    async fn spot_clearinghouse_state(&self, _user: Address) -> ClientResult<SpotBalances> {
        Ok(SpotBalances {
            balances: self.spot_balances.clone(),
        })
    }

    async fn open_orders(&self, _user: Address) -> ClientResult<Vec<OpenOrder>> {
        Ok(vec![])
    }

    async fn user_fills(&self, _user: Address) -> ClientResult<Vec<UserFill>> {
        Ok(vec![])
    }

    async fn funding_history(
        &self,
        _coin: &str,
        _start_ms: u64,
        _end_ms: Option<u64>,
    ) -> ClientResult<Vec<FundingEntry>> {
        Ok(vec![])
    }

    async fn place_order(
        &self,
        order: &OrderRequest,
        builder: Option<&BuilderInfo>,
    ) -> ClientResult<ExchangeResponseStatus> {
        self.record(format!("place_order:{}", order.asset));
        self.orders
            .lock()
            .unwrap()
            .push((order.clone(), builder.cloned()));

        Ok(ok_response(vec![self.perp_status(order)]))
    }

    async fn batch_orders(
        &self,
        orders: &[OrderRequest],
        builder: Option<&BuilderInfo>,
    ) -> ClientResult<ExchangeResponseStatus> {
        self.record(format!("batch_orders:{}", orders.len()));
        self.batches
            .lock()
            .unwrap()
            .push((orders.to_vec(), builder.cloned()));
        let statuses = orders.iter().map(|o| self.perp_status(o)).collect();
        Ok(ok_response(statuses))
    }

    async fn cancel_order(&self, cancel: &CancelRequest) -> ClientResult<ExchangeResponseStatus> {
        self.record(format!("cancel_order:{}", cancel.oid));
        Ok(ok_response(vec![ExchangeDataStatus::Success]))
    }

    async fn max_builder_fee(&self, _user: Address, _builder: Address) -> ClientResult<u64> {
        self.record("max_builder_fee");
        *self.fee_checks.lock().unwrap() += 1;
        Ok(self.approved_builder_fee)
    }

    async fn approve_builder_fee(
        &self,
        _builder: Address,
        max_fee_rate: &str,
    ) -> ClientResult<ExchangeResponseStatus> {
        self.record(format!("approve_builder_fee:{max_fee_rate}"));
        self.approvals.lock().unwrap().push(max_fee_rate.to_string());
        Ok(ok_response(vec![ExchangeDataStatus::Success]))
    }

    async fn usd_class_transfer(
        &self,
        amount: f64,
        to_perp: bool,
    ) -> ClientResult<ExchangeResponseStatus> {
        if self.fail_usd_class_transfer {
            return Err(ClientError::Network("class transfer rejected".to_string()));
        }
        self.record(format!("usd_class_transfer:{amount:.4}:{to_perp}"));
        Ok(ok_response(vec![ExchangeDataStatus::Success]))
    }

    async fn set_dex_abstraction(&self, enabled: bool) -> ClientResult<ExchangeResponseStatus> {
        self.record(format!("set_dex_abstraction:{enabled}"));
        Ok(ok_response(vec![ExchangeDataStatus::Success]))
    }

    async fn set_leverage(
        &self,
        coin: &str,
        leverage: u32,
        _is_cross: bool,
    ) -> ClientResult<ExchangeResponseStatus> {
        self.record(format!("set_leverage:{coin}:{leverage}"));
        Ok(ok_response(vec![ExchangeDataStatus::Success]))
    }
}
