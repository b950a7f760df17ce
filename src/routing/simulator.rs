//! Deterministic fill simulation: walk one side of a book and price the
//! requested size. Strict contract: the full size fills or the walk fails.

use serde::Serialize;

use crate::book::{BookLevel, MarketBook};
use crate::errors::{PrimeError, Result};
use crate::types::Side;

#[derive(Debug, Clone, Serialize)]
pub struct FillEstimate {
    pub avg_price: f64,
    pub mid_price: f64,
    pub price_impact_bps: f64,
    pub total_cost: f64,
    pub filled_size: f64,
}

/// Walk the taker side of `book` for `size`. Buys consume asks, sells
/// consume bids. Fails with `InsufficientDepth` when cumulative depth on the
/// walked side is below the requested size.
pub fn simulate(book: &MarketBook, side: Side, size: f64) -> Result<FillEstimate> {
    let levels = match side {
        Side::Buy => &book.asks,
        Side::Sell => &book.bids,
    };
    walk(levels, size, book.mid_price())
}

/// Same walk over a pre-merged side (used by the splitter's aggregate
/// pricing).
pub fn walk_levels(levels: &[BookLevel], size: f64, mid_price: f64) -> Result<FillEstimate> {
    walk(levels, size, mid_price)
}

fn walk(levels: &[BookLevel], size: f64, mid_price: f64) -> Result<FillEstimate> {
    if size <= 0.0 {
        return Err(PrimeError::InsufficientDepth {
            requested_size: size,
        });
    }

    let mut remaining = size;
    let mut total_cost = 0.0;

    for level in levels {
        if remaining <= 0.0 {
            break;
        }
        let fill = remaining.min(level.size);
        total_cost += fill * level.price;
        remaining -= fill;
    }

    if remaining > 0.0 {
        return Err(PrimeError::InsufficientDepth {
            requested_size: size,
        });
    }

    let avg_price = total_cost / size;
    Ok(FillEstimate {
        avg_price,
        mid_price,
        price_impact_bps: impact_bps(avg_price, mid_price),
        total_cost,
        filled_size: size,
    })
}

/// `|avg − mid| / mid` in basis points; zero when there is no mid.
pub fn impact_bps(avg_price: f64, mid_price: f64) -> f64 {
    if mid_price == 0.0 {
        0.0
    } else {
        (avg_price - mid_price).abs() / mid_price * 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(px: &str, size: f64) -> BookLevel {
        BookLevel {
            px: px.to_string(),
            price: px.parse().unwrap(),
            size,
        }
    }

    fn book(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> MarketBook {
        MarketBook {
            coin: "X".to_string(),
            bids,
            asks,
            time_ms: 0,
        }
    }

    #[test]
    fn buy_fills_at_best_ask_when_depth_allows() {
        // mid = (431.00 + 431.50) / 2 = 431.25
        let book = book(
            vec![level("431.00", 4.0)],
            vec![level("431.50", 5.0), level("432.00", 10.0)],
        );
        let est = simulate(&book, Side::Buy, 3.0).unwrap();
        assert_eq!(est.avg_price, 431.50);
        assert_eq!(est.filled_size, 3.0);
        assert_eq!(est.total_cost, 3.0 * 431.50);
        assert!((est.price_impact_bps - 5.797).abs() < 0.001);
    }

    #[test]
    fn buy_walks_multiple_levels() {
        let book = book(vec![], vec![level("100", 1.0), level("101", 2.0)]);
        let est = simulate(&book, Side::Buy, 2.0).unwrap();
        // 1 @ 100 + 1 @ 101
        assert_eq!(est.avg_price, 100.5);
        assert_eq!(est.total_cost, 201.0);
    }

    #[test]
    fn sell_walks_bids() {
        let book = book(vec![level("100", 2.0), level("99", 2.0)], vec![]);
        let est = simulate(&book, Side::Sell, 3.0).unwrap();
        assert!((est.avg_price - (2.0 * 100.0 + 99.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn avg_price_bounded_by_best_and_worst_consumed() {
        let book = book(
            vec![],
            vec![level("100", 1.0), level("102", 1.0), level("110", 5.0)],
        );
        let est = simulate(&book, Side::Buy, 2.5).unwrap();
        assert!(est.avg_price >= 100.0);
        assert!(est.avg_price <= 110.0);
    }

    #[test]
    fn insufficient_depth_fails() {
        let book = book(vec![], vec![level("100", 1.0)]);
        let err = simulate(&book, Side::Buy, 2.0).unwrap_err();
        assert!(matches!(err, PrimeError::InsufficientDepth { .. }));
    }

    #[test]
    fn empty_book_fails() {
        let book = book(vec![], vec![]);
        assert!(simulate(&book, Side::Buy, 1.0).is_err());
        assert!(simulate(&book, Side::Sell, 1.0).is_err());
    }

    #[test]
    fn single_sided_mid_and_zero_mid_impact() {
        let book = book(vec![], vec![level("100", 5.0)]);
        let est = simulate(&book, Side::Buy, 1.0).unwrap();
        assert_eq!(est.mid_price, 100.0);
        assert_eq!(est.price_impact_bps, 0.0);
        assert_eq!(impact_bps(100.0, 0.0), 0.0);
    }

    #[test]
    fn simulation_is_deterministic() {
        let book = book(
            vec![level("430.99", 7.3)],
            vec![level("431.07", 2.2), level("431.13", 9.9)],
        );
        let a = simulate(&book, Side::Buy, 5.5).unwrap();
        let b = simulate(&book, Side::Buy, 5.5).unwrap();
        assert_eq!(a.avg_price.to_bits(), b.avg_price.to_bits());
        assert_eq!(a.price_impact_bps.to_bits(), b.price_impact_bps.to_bits());
        assert_eq!(a.total_cost.to_bits(), b.total_cost.to_bits());
    }
}
