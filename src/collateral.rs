//! Pre-trade collateral preparation. Estimates per-token shortfalls against
//! live balances, prices the swaps needed to cover them, and executes
//! perp→spot transfers plus spot buys in strict order before any perp leg
//! is submitted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::Address;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::VenueClient;
use crate::client::types::{ExchangeDataStatus, OrderRequest, SpotMeta, TIF_IOC};
use crate::errors::{PrimeError, Result};
use crate::registry::NATIVE_COLLATERAL;
use crate::routing::simulator;
use crate::routing::splitter::SplitAllocation;
use crate::types::{Side, format_price, format_size};

/// Swap-cost estimate when the spot book cannot be read.
pub const DEFAULT_SWAP_COST_BPS: f64 = 50.0;

/// Swap-cost estimate when the spot book lacks depth for the amount.
pub const SHALLOW_BOOK_SWAP_COST_BPS: f64 = 100.0;

/// USDC buffer on perp→spot transfers, absorbing swap slippage.
const TRANSFER_BUFFER: f64 = 1.01;

/// Spot IOC buys are priced at this multiple of the best ask.
const SPOT_ASK_PADDING: f64 = 1.005;

/// Spot asset index on the wire for swap orders.
fn spot_wire_index(pair_index: u32) -> u32 {
    10_000 + 2 * pair_index
}

#[derive(Debug, Clone, Serialize)]
pub struct CollateralRequirement {
    pub token: String,
    pub amount_needed: f64,
    pub current_balance: f64,
    /// `max(0, needed − balance)`; pinned to zero for the account-native
    /// collateral, which abstraction mode draws from the perp balance.
    pub shortfall: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_swap_cost_bps: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollateralPlan {
    pub requirements: Vec<CollateralRequirement>,
    pub total_swap_cost_bps: f64,
    pub swaps_needed: bool,
    pub abstraction_enabled: bool,
    /// True for the placeholder attached to quotes; real requirements are
    /// estimated at execution time.
    pub pending: bool,
}

impl CollateralPlan {
    pub fn pending() -> Self {
        Self {
            requirements: Vec::new(),
            total_swap_cost_bps: 0.0,
            swaps_needed: false,
            abstraction_enabled: false,
            pending: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedSwap {
    pub token: String,
    pub requested_size: f64,
    pub filled_size: f64,
    pub avg_price: Option<f64>,
    pub order_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollateralReceipt {
    pub success: bool,
    pub swaps_executed: Vec<ExecutedSwap>,
    pub abstraction_was_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct CollateralManager {
    client: Arc<dyn VenueClient>,
    abstraction_enabled: AtomicBool,
}

impl CollateralManager {
    pub fn new(client: Arc<dyn VenueClient>) -> Self {
        Self {
            client,
            abstraction_enabled: AtomicBool::new(false),
        }
    }

    /// Estimate per-token requirements for a set of allocations against the
    /// user's live balances.
    pub async fn estimate_requirements(
        &self,
        allocations: &[SplitAllocation],
        user: Address,
    ) -> Result<CollateralPlan> {
        let spot_state = self.client.spot_clearinghouse_state(user).await?;
        let perp_state = self.client.clearinghouse_state(user).await?;

        let spot_balances: HashMap<String, f64> = spot_state
            .balances
            .iter()
            .map(|b| (b.coin.clone(), b.total.parse().unwrap_or(0.0)))
            .collect();
        let perp_withdrawable: f64 = perp_state.withdrawable.parse().unwrap_or(0.0);

        // Required amount per collateral token, first-seen order.
        let mut order: Vec<String> = Vec::new();
        let mut needed: HashMap<String, f64> = HashMap::new();
        for alloc in allocations {
            let token = alloc.market.collateral.clone();
            if !needed.contains_key(&token) {
                order.push(token.clone());
            }
            *needed.entry(token).or_insert(0.0) += alloc.estimated_cost;
        }

        let mut requirements: Vec<CollateralRequirement> = order
            .into_iter()
            .map(|token| {
                let amount_needed = needed[&token];
                if token == NATIVE_COLLATERAL {
                    // Abstraction mode pulls USDC margin from the perp balance.
                    CollateralRequirement {
                        token,
                        amount_needed,
                        current_balance: perp_withdrawable,
                        shortfall: 0.0,
                        swap_from: None,
                        estimated_swap_cost_bps: None,
                    }
                } else {
                    let current_balance = spot_balances.get(&token).copied().unwrap_or(0.0);
                    CollateralRequirement {
                        shortfall: (amount_needed - current_balance).max(0.0),
                        token,
                        amount_needed,
                        current_balance,
                        swap_from: None,
                        estimated_swap_cost_bps: None,
                    }
                }
            })
            .collect();

        let probes = requirements.iter().map(|req| {
            let needs_probe = req.shortfall > 0.0;
            let token = req.token.clone();
            let amount = req.amount_needed;
            async move {
                if needs_probe {
                    Some(
                        self.estimate_swap_cost(NATIVE_COLLATERAL, &token, amount)
                            .await,
                    )
                } else {
                    None
                }
            }
        });
        let costs = futures::future::join_all(probes).await;

        let total_needed: f64 = requirements.iter().map(|r| r.amount_needed).sum();
        let mut weighted_cost = 0.0;
        let mut swaps_needed = false;
        for (req, cost) in requirements.iter_mut().zip(costs) {
            if let Some(bps) = cost {
                req.swap_from = Some(NATIVE_COLLATERAL.to_string());
                req.estimated_swap_cost_bps = Some(bps);
                weighted_cost += bps * req.amount_needed;
                swaps_needed = true;
            }
        }

        Ok(CollateralPlan {
            requirements,
            total_swap_cost_bps: if total_needed > 0.0 {
                weighted_cost / total_needed
            } else {
                0.0
            },
            swaps_needed,
            abstraction_enabled: self.abstraction_enabled.load(Ordering::SeqCst),
            pending: false,
        })
    }

    /// Estimate the cost of acquiring `amount` units of `to` in basis
    /// points. Falls back to conservative defaults when the spot book is
    /// unavailable or too shallow.
    pub async fn estimate_swap_cost(&self, from: &str, to: &str, amount: f64) -> f64 {
        if from == to {
            return 0.0;
        }

        let book = match self.fetch_spot_book(to).await {
            Some(book) => book,
            None => {
                debug!(token = %to, "no spot book, using default swap cost");
                return DEFAULT_SWAP_COST_BPS;
            }
        };

        match simulator::simulate(&book, Side::Buy, amount) {
            Ok(estimate) => estimate.price_impact_bps,
            Err(_) => SHALLOW_BOOK_SWAP_COST_BPS,
        }
    }

    async fn fetch_spot_book(&self, token: &str) -> Option<crate::book::MarketBook> {
        let meta = self.client.spot_meta().await.ok()?;
        let token_meta = meta.tokens.iter().find(|t| t.name == token)?;
        let pair_index = meta.usdc_pair_index(token_meta.index)?;
        let snapshot = self.client.l2_book(&format!("@{pair_index}")).await.ok()?;
        Some(crate::book::MarketBook::from_l2(snapshot))
    }

    /// Execute the plan: enable abstraction once, then for each shortfall
    /// transfer buffered USDC perp→spot and buy the token with an IOC spot
    /// order. Steps are strictly serial so each swap observes the previous
    /// transfer. A failed receipt reports the swaps executed before the
    /// fault.
    pub async fn prepare(&self, plan: &CollateralPlan, _user: Address) -> CollateralReceipt {
        let mut swaps: Vec<ExecutedSwap> = Vec::new();
        let mut abstraction_was_enabled = false;

        match self.run_pipeline(plan, &mut swaps, &mut abstraction_was_enabled).await {
            Ok(()) => CollateralReceipt {
                success: true,
                swaps_executed: swaps,
                abstraction_was_enabled,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "collateral preparation failed");
                CollateralReceipt {
                    success: false,
                    swaps_executed: swaps,
                    abstraction_was_enabled,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        plan: &CollateralPlan,
        swaps: &mut Vec<ExecutedSwap>,
        abstraction_was_enabled: &mut bool,
    ) -> Result<()> {
        if !self.abstraction_enabled.load(Ordering::SeqCst) {
            self.client.set_dex_abstraction(true).await?;
            self.abstraction_enabled.store(true, Ordering::SeqCst);
            *abstraction_was_enabled = true;
            info!("dex abstraction enabled");
        }

        let pending: Vec<&CollateralRequirement> = plan
            .requirements
            .iter()
            .filter(|r| r.shortfall > 0.0 && r.token != NATIVE_COLLATERAL)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        // Spot metadata once for the whole pipeline.
        let meta = self.client.spot_meta().await?;

        for req in pending {
            let swap = self.swap_into(&meta, req).await?;
            info!(
                token = %swap.token,
                filled = swap.filled_size,
                "collateral swap executed"
            );
            swaps.push(swap);
        }
        Ok(())
    }

    async fn swap_into(
        &self,
        meta: &SpotMeta,
        req: &CollateralRequirement,
    ) -> Result<ExecutedSwap> {
        let token_meta = meta
            .tokens
            .iter()
            .find(|t| t.name == req.token)
            .ok_or_else(|| {
                PrimeError::Collateral(format!("token '{}' not in spot metadata", req.token))
            })?;
        let pair_index = meta.usdc_pair_index(token_meta.index).ok_or_else(|| {
            PrimeError::Collateral(format!("no USDC spot pair for '{}'", req.token))
        })?;

        // Buffered USDC to spot first; the swap draws on it.
        self.client
            .usd_class_transfer(req.shortfall * TRANSFER_BUFFER, false)
            .await?;

        let snapshot = self.client.l2_book(&format!("@{pair_index}")).await?;
        let book = crate::book::MarketBook::from_l2(snapshot);
        let best_ask = book.best_ask().ok_or_else(|| {
            PrimeError::Collateral(format!("spot book for '{}' has no asks", req.token))
        })?;

        let order = OrderRequest::limit(
            spot_wire_index(pair_index),
            true,
            format_price(best_ask * SPOT_ASK_PADDING),
            format_size(req.shortfall, token_meta.sz_decimals),
            TIF_IOC,
        );

        let status = self.client.place_order(&order, None).await?;
        let statuses = status
            .into_statuses()
            .map_err(|msg| PrimeError::Collateral(format!("swap rejected: {msg}")))?;

        match statuses.into_iter().next() {
            Some(ExchangeDataStatus::Filled(fill)) => Ok(ExecutedSwap {
                token: req.token.clone(),
                requested_size: req.shortfall,
                filled_size: fill.total_sz.parse().unwrap_or(0.0),
                avg_price: fill.avg_px.parse().ok(),
                order_id: Some(fill.oid),
            }),
            Some(ExchangeDataStatus::Resting(rest)) => Ok(ExecutedSwap {
                token: req.token.clone(),
                requested_size: req.shortfall,
                filled_size: 0.0,
                avg_price: None,
                order_id: Some(rest.oid),
            }),
            Some(ExchangeDataStatus::Error(msg)) => Err(PrimeError::Collateral(format!(
                "swap order for '{}' failed: {msg}",
                req.token
            ))),
            other => Err(PrimeError::Collateral(format!(
                "unexpected swap order status for '{}': {other:?}",
                req.token
            ))),
        }
    }
}
