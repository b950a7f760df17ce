//! Position normalization across markets. Raw clearinghouse positions are
//! mapped through the registry so fragmented markets group under one base
//! asset.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use tracing::debug;

use crate::client::VenueClient;
use crate::client::types::PositionData;
use crate::errors::Result;
use crate::registry::{MarketRegistry, extract_base_asset};
use crate::types::Side;

/// Whether this SDK opened the position. `Unknown` until a durable local
/// fills index exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagedBy {
    Managed,
    External,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogicalPosition {
    pub base_asset: String,
    pub coin: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
    pub leverage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidation_price: Option<f64>,
    pub managed_by_sdk: ManagedBy,
}

pub struct PositionManager {
    client: Arc<dyn VenueClient>,
    registry: Arc<MarketRegistry>,
}

impl PositionManager {
    pub fn new(client: Arc<dyn VenueClient>, registry: Arc<MarketRegistry>) -> Self {
        Self { client, registry }
    }

    /// All open positions, normalized.
    pub async fn positions(&self, user: Address) -> Result<Vec<LogicalPosition>> {
        let state = self.client.clearinghouse_state(user).await?;

        let mut positions = Vec::new();
        for asset_position in &state.asset_positions {
            let Some(position) = self.normalize(&asset_position.position) else {
                continue;
            };
            positions.push(position);
        }
        debug!(count = positions.len(), "normalized positions");
        Ok(positions)
    }

    /// Positions keyed by base asset.
    pub async fn grouped_positions(
        &self,
        user: Address,
    ) -> Result<BTreeMap<String, Vec<LogicalPosition>>> {
        let mut grouped: BTreeMap<String, Vec<LogicalPosition>> = BTreeMap::new();
        for position in self.positions(user).await? {
            grouped
                .entry(position.base_asset.clone())
                .or_default()
                .push(position);
        }
        Ok(grouped)
    }

    fn normalize(&self, raw: &PositionData) -> Option<LogicalPosition> {
        let signed_size: f64 = raw.szi.parse().unwrap_or(0.0);
        if signed_size == 0.0 {
            return None;
        }

        let market = self.registry.market_by_coin(&raw.coin);
        let base_asset = market
            .as_ref()
            .map(|m| m.base_asset.clone())
            .unwrap_or_else(|| extract_base_asset(&raw.coin, !raw.coin.contains(':')));
        let mark_price = market.as_ref().map(|m| m.mark_price).unwrap_or(0.0);

        Some(LogicalPosition {
            base_asset,
            coin: raw.coin.clone(),
            side: if signed_size > 0.0 {
                Side::Buy
            } else {
                Side::Sell
            },
            size: signed_size.abs(),
            entry_price: raw
                .entry_px
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            mark_price,
            unrealized_pnl: raw.unrealized_pnl.parse().unwrap_or(0.0),
            leverage: raw.leverage.value,
            liquidation_price: raw.liquidation_px.as_deref().and_then(|s| s.parse().ok()),
            managed_by_sdk: ManagedBy::Unknown,
        })
    }
}
