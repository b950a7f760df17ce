//! Order routing: simulate fills per market, score the candidates, and
//! build executable plans, single-market or split across several.

pub mod scorer;
pub mod simulator;
pub mod splitter;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::book::{BookAggregator, MarketBook};
use crate::collateral::{CollateralManager, CollateralPlan};
use crate::errors::{PrimeError, Result};
use crate::registry::{MarketRegistry, NATIVE_COLLATERAL, PerpMarket};
use crate::types::Side;

pub use scorer::MarketScore;
pub use simulator::FillEstimate;
pub use splitter::{SplitAllocation, SplitResult};

/// One executable leg: an immediate-or-cancel limit order at the simulated
/// average padded by the slippage tolerance.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub market: PerpMarket,
    pub side: Side,
    pub size: f64,
    pub limit_price: f64,
    /// Time-in-force on the wire; always IOC for routed orders.
    pub tif: String,
    pub slippage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitExecutionPlan {
    pub legs: Vec<ExecutionPlan>,
    /// Pending until execution: requirements are recomputed against live
    /// balances right before submission.
    pub collateral_plan: CollateralPlan,
    pub side: Side,
    pub total_size: f64,
    pub slippage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub base_asset: String,
    pub side: Side,
    pub requested_size: f64,
    pub selected_market: PerpMarket,
    pub estimated_avg_price: f64,
    pub estimated_price_impact_bps: f64,
    pub estimated_funding_rate: f64,
    /// Every scored market, best first.
    pub alternatives_considered: Vec<MarketScore>,
    pub warnings: Vec<String>,
    pub plan: ExecutionPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitQuote {
    pub base_asset: String,
    pub side: Side,
    pub requested_size: f64,
    pub allocations: Vec<SplitAllocation>,
    pub estimated_avg_price: f64,
    pub estimated_price_impact_bps: f64,
    pub warnings: Vec<String>,
    pub plan: SplitExecutionPlan,
}

/// Limit price with slippage padding, rounded to 6 decimals. Tick-size
/// alignment is left to the venue.
pub fn limit_price(avg_price: f64, side: Side, slippage: f64) -> f64 {
    let raw = match side {
        Side::Buy => avg_price * (1.0 + slippage),
        Side::Sell => avg_price * (1.0 - slippage),
    };
    (raw * 1e6).round() / 1e6
}

pub struct Router {
    registry: Arc<MarketRegistry>,
    aggregator: BookAggregator,
    collateral: Arc<CollateralManager>,
}

impl Router {
    pub fn new(
        registry: Arc<MarketRegistry>,
        aggregator: BookAggregator,
        collateral: Arc<CollateralManager>,
    ) -> Self {
        Self {
            registry,
            aggregator,
            collateral,
        }
    }

    /// Quote the best single market for an order.
    pub async fn quote(
        &self,
        base_asset: &str,
        side: Side,
        size: f64,
        user_collateral: &HashSet<String>,
        slippage: f64,
    ) -> Result<Quote> {
        let markets = self.registry.get_markets(base_asset)?;
        let (books, failed) = self.aggregator.fetch_books(&markets).await;

        if books.is_empty() {
            return Err(PrimeError::MarketDataUnavailable {
                base_asset: base_asset.to_string(),
                failed_coins: failed,
            });
        }

        let mut warnings = Vec::new();
        if !failed.is_empty() {
            warnings.push(format!(
                "Partial market data: {}/{} markets responded",
                books.len(),
                markets.len()
            ));
        }

        let by_coin: HashMap<&str, &PerpMarket> =
            markets.iter().map(|m| (m.coin.as_str(), m)).collect();

        // Simulate every responding market, then probe swap costs for the
        // feasible ones whose collateral the user lacks.
        let candidates: Vec<(&MarketBook, &PerpMarket, Result<FillEstimate>)> = books
            .iter()
            .filter_map(|book| by_coin.get(book.coin.as_str()).map(|m| (book, *m)))
            .map(|(book, market)| (book, market, simulator::simulate(book, side, size)))
            .collect();

        let probes = candidates.iter().map(|(_, market, sim)| {
            let collateral = Arc::clone(&self.collateral);
            let needs_probe =
                sim.is_ok() && !user_collateral.contains(&market.collateral);
            let token = market.collateral.clone();
            let amount = sim.as_ref().map(|e| e.total_cost).unwrap_or(0.0);
            async move {
                if needs_probe {
                    Some(
                        collateral
                            .estimate_swap_cost(NATIVE_COLLATERAL, &token, amount)
                            .await,
                    )
                } else {
                    None
                }
            }
        });
        let swap_costs = futures::future::join_all(probes).await;

        let mut scores = Vec::with_capacity(candidates.len());
        let mut best: Option<(usize, f64)> = None;
        for (i, ((book, market, sim), swap_cost)) in
            candidates.iter().zip(swap_costs).enumerate()
        {
            let score = match sim {
                Ok(estimate) => scorer::score(estimate, market, side, user_collateral, swap_cost),
                Err(_) => MarketScore {
                    coin: market.coin.clone(),
                    dex_name: market.dex_name.clone(),
                    price_impact_bps: f64::INFINITY,
                    funding_rate: market.funding,
                    collateral_match: user_collateral.contains(&market.collateral),
                    swap_cost_bps: None,
                    total_score: f64::INFINITY,
                    reason: Some(format!("insufficient depth for size {size}")),
                },
            };
            if best.is_none_or(|(_, s)| score.total_score < s) {
                best = Some((i, score.total_score));
            }
            debug!(coin = %book.coin, score = score.total_score, "scored market");
            scores.push(score);
        }

        let Some((winner_index, best_score)) = best else {
            return Err(PrimeError::MarketDataUnavailable {
                base_asset: base_asset.to_string(),
                failed_coins: failed,
            });
        };
        if best_score.is_infinite() {
            return Err(PrimeError::InsufficientLiquidity {
                base_asset: base_asset.to_string(),
                requested_size: size,
            });
        }

        let (winner_book, winner_market, _) = &candidates[winner_index];
        // Re-simulate the winner to price the plan.
        let estimate = simulator::simulate(winner_book, side, size)?;
        let plan = ExecutionPlan {
            market: (*winner_market).clone(),
            side,
            size,
            limit_price: limit_price(estimate.avg_price, side, slippage),
            tif: crate::client::types::TIF_IOC.to_string(),
            slippage,
        };

        scores.sort_by(|a, b| a.total_score.total_cmp(&b.total_score));

        Ok(Quote {
            base_asset: base_asset.to_uppercase(),
            side,
            requested_size: size,
            selected_market: (*winner_market).clone(),
            estimated_avg_price: estimate.avg_price,
            estimated_price_impact_bps: estimate.price_impact_bps,
            estimated_funding_rate: winner_market.funding,
            alternatives_considered: scores,
            warnings,
            plan,
        })
    }

    /// Quote an order split across every market with depth to contribute.
    pub async fn quote_split(
        &self,
        base_asset: &str,
        side: Side,
        size: f64,
        _user_collateral: &HashSet<String>,
        slippage: f64,
    ) -> Result<SplitQuote> {
        let markets = self.registry.get_markets(base_asset)?;
        let book = self.aggregator.aggregate_for_order(base_asset, side, size).await?;

        if book.per_market_books.is_empty() {
            return Err(PrimeError::MarketDataUnavailable {
                base_asset: base_asset.to_string(),
                failed_coins: book.failed_coins,
            });
        }

        let mut warnings = Vec::new();
        if !book.failed_coins.is_empty() {
            warnings.push(format!(
                "Partial market data: {}/{} markets responded",
                book.per_market_books.len(),
                markets.len()
            ));
        }

        let market_lookup: HashMap<String, PerpMarket> = markets
            .iter()
            .map(|m| (m.coin.clone(), m.clone()))
            .collect();

        let split = splitter::optimize(
            &book,
            side,
            size,
            &market_lookup,
            splitter::MIN_ALLOCATION_SIZE,
        )?;

        let legs = split
            .allocations
            .iter()
            .map(|alloc| {
                // Per-leg price from this market's own snapshot. Dust folded
                // in from other markets can exceed the snapshot's quoted
                // depth, in which case the allocation's average stands in.
                let avg = book
                    .per_market_books
                    .iter()
                    .find(|b| b.coin == alloc.market.coin)
                    .and_then(|b| simulator::simulate(b, side, alloc.size).ok())
                    .map(|e| e.avg_price)
                    .unwrap_or(alloc.estimated_avg_price);
                ExecutionPlan {
                    market: alloc.market.clone(),
                    side,
                    size: alloc.size,
                    limit_price: limit_price(avg, side, slippage),
                    tif: crate::client::types::TIF_IOC.to_string(),
                    slippage,
                }
            })
            .collect();

        warnings.push(
            "Collateral requirements are estimated at execution time against live balances"
                .to_string(),
        );

        Ok(SplitQuote {
            base_asset: base_asset.to_uppercase(),
            side,
            requested_size: size,
            estimated_avg_price: split.avg_price,
            estimated_price_impact_bps: split.price_impact_bps,
            warnings,
            plan: SplitExecutionPlan {
                legs,
                collateral_plan: CollateralPlan::pending(),
                side,
                total_size: split.total_size,
                slippage,
            },
            allocations: split.allocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_price_pads_by_side() {
        assert_eq!(limit_price(100.0, Side::Buy, 0.01), 101.0);
        assert_eq!(limit_price(100.0, Side::Sell, 0.01), 99.0);
    }

    #[test]
    fn limit_price_rounds_to_six_decimals() {
        let px = limit_price(431.333333, Side::Buy, 0.005);
        assert_eq!(px, (431.333333f64 * 1.005 * 1e6).round() / 1e6);
        // exactly 6 decimals survive
        assert_eq!((px * 1e6).fract(), 0.0);
    }
}
