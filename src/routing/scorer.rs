//! Per-market scoring: simulated impact, funding direction and collateral
//! acquisition cost folded into one comparable number. Lower is better.

use std::collections::HashSet;

use serde::Serialize;

use crate::registry::PerpMarket;
use crate::routing::simulator::FillEstimate;
use crate::types::Side;

/// Penalty applied when the user lacks the market's collateral and no swap
/// cost estimate is available.
pub const DEFAULT_SWAP_PENALTY_BPS: f64 = 50.0;

/// Scales per-period funding into a cost-comparable basis-point figure.
const FUNDING_WEIGHT: f64 = 3.0;

#[derive(Debug, Clone, Serialize)]
pub struct MarketScore {
    pub coin: String,
    pub dex_name: String,
    pub price_impact_bps: f64,
    pub funding_rate: f64,
    pub collateral_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_cost_bps: Option<f64>,
    pub total_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Score one market for an order. `swap_cost_bps` is the estimated cost of
/// acquiring the market's collateral, when the caller probed it.
pub fn score(
    estimate: &FillEstimate,
    market: &PerpMarket,
    side: Side,
    user_collateral: &HashSet<String>,
    swap_cost_bps: Option<f64>,
) -> MarketScore {
    // Longs pay positive funding, shorts receive it.
    let funding_benefit = match side {
        Side::Buy => -market.funding,
        Side::Sell => market.funding,
    };
    let funding_score = funding_benefit * 10_000.0 * FUNDING_WEIGHT;

    let collateral_match = user_collateral.contains(&market.collateral);
    let (penalty, reason) = if collateral_match {
        (0.0, None)
    } else {
        let penalty = swap_cost_bps.unwrap_or(DEFAULT_SWAP_PENALTY_BPS);
        (
            penalty,
            Some(format!(
                "requires {} collateral (+{penalty:.1} bps swap penalty)",
                market.collateral
            )),
        )
    };

    MarketScore {
        coin: market.coin.clone(),
        dex_name: market.dex_name.clone(),
        price_impact_bps: estimate.price_impact_bps,
        funding_rate: market.funding,
        collateral_match,
        swap_cost_bps: if collateral_match { None } else { swap_cost_bps },
        total_score: estimate.price_impact_bps - funding_score + penalty,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NATIVE_DEX;

    fn market(collateral: &str, funding: f64) -> PerpMarket {
        PerpMarket {
            base_asset: "TSLA".to_string(),
            coin: "TSLA".to_string(),
            asset_index: 7,
            dex_name: NATIVE_DEX.to_string(),
            collateral: collateral.to_string(),
            is_native: true,
            sz_decimals: 3,
            max_leverage: 10,
            funding,
            open_interest: 0.0,
            mark_price: 431.25,
            oracle_price: None,
        }
    }

    fn estimate(impact: f64) -> FillEstimate {
        FillEstimate {
            avg_price: 431.5,
            mid_price: 431.25,
            price_impact_bps: impact,
            total_cost: 1294.5,
            filled_size: 3.0,
        }
    }

    fn usdc() -> HashSet<String> {
        HashSet::from(["USDC".to_string()])
    }

    #[test]
    fn matching_collateral_no_penalty() {
        let s = score(
            &estimate(5.797),
            &market("USDC", 0.00000625),
            Side::Buy,
            &usdc(),
            None,
        );
        assert!(s.collateral_match);
        assert!(s.reason.is_none());
        // 5.797 - (-0.00000625 * 30000) + 0
        assert!((s.total_score - 5.98475).abs() < 1e-9);
    }

    #[test]
    fn missing_collateral_uses_provided_swap_cost() {
        let s = score(
            &estimate(2.0),
            &market("USDH", 0.0),
            Side::Buy,
            &usdc(),
            Some(5.0),
        );
        assert!(!s.collateral_match);
        assert_eq!(s.swap_cost_bps, Some(5.0));
        assert_eq!(s.total_score, 7.0);
        assert!(s.reason.as_ref().unwrap().contains("USDH"));
    }

    #[test]
    fn missing_collateral_falls_back_to_default_penalty() {
        let s = score(&estimate(2.0), &market("USDH", 0.0), Side::Buy, &usdc(), None);
        assert_eq!(s.total_score, 2.0 + DEFAULT_SWAP_PENALTY_BPS);
    }

    #[test]
    fn funding_direction_flips_with_side() {
        let m = market("USDC", 0.0001);
        let buy = score(&estimate(0.0), &m, Side::Buy, &usdc(), None);
        let sell = score(&estimate(0.0), &m, Side::Sell, &usdc(), None);
        // positive funding hurts longs, helps shorts
        assert!(buy.total_score > 0.0);
        assert!(sell.total_score < 0.0);
        assert_eq!(buy.total_score, -sell.total_score);
    }

    #[test]
    fn score_monotone_in_impact_and_penalty() {
        let m = market("USDH", 0.0);
        let low = score(&estimate(1.0), &m, Side::Buy, &usdc(), Some(5.0));
        let high_impact = score(&estimate(2.0), &m, Side::Buy, &usdc(), Some(5.0));
        let high_penalty = score(&estimate(1.0), &m, Side::Buy, &usdc(), Some(9.0));
        assert!(high_impact.total_score > low.total_score);
        assert!(high_penalty.total_score > low.total_score);
    }
}
