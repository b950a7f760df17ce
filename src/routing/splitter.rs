//! Split optimization: greedy walk of the aggregated book, allocating each
//! level's fill back to its source markets proportionally, then folding dust
//! allocations into the largest one.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::book::AggregatedBook;
use crate::errors::{PrimeError, Result};
use crate::registry::PerpMarket;
use crate::routing::simulator::impact_bps;
use crate::types::Side;

/// Allocations below this size are folded into the primary market.
pub const MIN_ALLOCATION_SIZE: f64 = 0.001;

/// Unfilled remainder beyond `size * FILL_TOLERANCE` is a liquidity failure
/// rather than rounding noise.
const FILL_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, Serialize)]
pub struct SplitAllocation {
    pub market: PerpMarket,
    pub size: f64,
    pub estimated_cost: f64,
    pub estimated_avg_price: f64,
    /// Share of the total filled size. Sums to 1 across allocations.
    pub proportion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitResult {
    pub allocations: Vec<SplitAllocation>,
    pub total_size: f64,
    pub avg_price: f64,
    pub price_impact_bps: f64,
}

struct SourceAccumulator {
    coin: String,
    size: f64,
    cost: f64,
}

/// Allocate `size` across the markets contributing to the aggregated book.
/// `market_lookup` maps venue coin names to their markets.
pub fn optimize(
    book: &AggregatedBook,
    side: Side,
    size: f64,
    market_lookup: &HashMap<String, PerpMarket>,
    min_allocation_size: f64,
) -> Result<SplitResult> {
    let levels = book.active_side(side);

    // Greedy walk; per-source running totals in first-seen order so ties
    // resolve by source iteration order.
    let mut remaining = size;
    let mut accumulators: Vec<SourceAccumulator> = Vec::new();
    let mut by_coin: HashMap<String, usize> = HashMap::new();

    for level in levels {
        if remaining <= 0.0 {
            break;
        }
        let level_fill = remaining.min(level.total_size);
        for source in &level.sources {
            let source_fill =
                (level_fill * source.size / level.total_size).min(source.size);
            if source_fill <= 0.0 {
                continue;
            }
            let i = *by_coin.entry(source.coin.clone()).or_insert_with(|| {
                accumulators.push(SourceAccumulator {
                    coin: source.coin.clone(),
                    size: 0.0,
                    cost: 0.0,
                });
                accumulators.len() - 1
            });
            accumulators[i].size += source_fill;
            accumulators[i].cost += source_fill * level.price;
        }
        remaining -= level_fill;
    }

    if remaining > size * FILL_TOLERANCE {
        return Err(PrimeError::InsufficientLiquidity {
            base_asset: book.base_asset.clone(),
            requested_size: size,
        });
    }

    let mut allocations: Vec<SplitAllocation> = Vec::new();
    for acc in accumulators {
        if acc.size <= 0.0 {
            continue;
        }
        let Some(market) = market_lookup.get(&acc.coin) else {
            warn!(coin = %acc.coin, "book source missing from market lookup, dropping allocation");
            continue;
        };
        allocations.push(SplitAllocation {
            market: market.clone(),
            estimated_avg_price: acc.cost / acc.size,
            size: acc.size,
            estimated_cost: acc.cost,
            proportion: 0.0,
        });
    }

    if allocations.is_empty() {
        return Err(PrimeError::InsufficientLiquidity {
            base_asset: book.base_asset.clone(),
            requested_size: size,
        });
    }

    redistribute_dust(&mut allocations, min_allocation_size);

    let total_size: f64 = allocations.iter().map(|a| a.size).sum();
    let total_cost: f64 = allocations.iter().map(|a| a.estimated_cost).sum();
    for alloc in &mut allocations {
        alloc.proportion = alloc.size / total_size;
    }

    let avg_price = total_cost / total_size;
    Ok(SplitResult {
        allocations,
        total_size,
        avg_price,
        price_impact_bps: impact_bps(avg_price, book.mid_price()),
    })
}

/// Fold sub-minimum allocations into the largest one, priced at the
/// primary's average. Sort is stable, so equal sizes keep source order and
/// the earlier source stays primary.
fn redistribute_dust(allocations: &mut Vec<SplitAllocation>, min_allocation_size: f64) {
    allocations.sort_by(|a, b| b.size.total_cmp(&a.size));
    if allocations.len() < 2 {
        return;
    }

    let mut kept = Vec::with_capacity(allocations.len());
    let mut absorbed_size = 0.0;
    for alloc in allocations.drain(..) {
        if kept.is_empty() {
            kept.push(alloc);
        } else if alloc.size < min_allocation_size {
            absorbed_size += alloc.size;
        } else {
            kept.push(alloc);
        }
    }

    if absorbed_size > 0.0 {
        let primary = &mut kept[0];
        primary.estimated_cost += absorbed_size * primary.estimated_avg_price;
        primary.size += absorbed_size;
        primary.estimated_avg_price = primary.estimated_cost / primary.size;
    }

    *allocations = kept;
}
