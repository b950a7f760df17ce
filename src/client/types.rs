//! Typed wire structs for the venue API. Prices and sizes stay
//! decimal-strings end to end; callers parse at the point of use.

use serde::{Deserialize, Serialize};

// ==================== Perp Metadata ====================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PerpMeta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    pub sz_decimals: u32,
    pub max_leverage: u32,
    #[serde(default)]
    pub only_isolated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_delisted: Option<bool>,
}

/// One entry of the deployer list. The venue returns `null` for slot 0
/// (first-party markets), so the list is deserialized as `Vec<Option<_>>`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PerpDex {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<String>,
    /// Spot token index of the margin token for this deployer's markets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_token: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssetContext {
    pub funding: String,
    pub open_interest: String,
    pub mark_px: String,
    #[serde(default)]
    pub mid_px: Option<String>,
    #[serde(default)]
    pub oracle_px: Option<String>,
    pub day_ntl_vlm: String,
}

// ==================== Spot Metadata ====================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpotMeta {
    pub universe: Vec<SpotPairMeta>,
    pub tokens: Vec<TokenMeta>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpotPairMeta {
    pub name: String,
    pub tokens: [u32; 2],
    pub index: u32,
    pub is_canonical: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenMeta {
    pub name: String,
    pub sz_decimals: u32,
    pub wei_decimals: u32,
    pub index: u32,
    pub is_canonical: bool,
}

impl SpotMeta {
    /// USDC-quoted pair index for a base token, if one is listed.
    pub fn usdc_pair_index(&self, token_index: u32) -> Option<u32> {
        const USDC_TOKEN_INDEX: u32 = 0;
        self.universe
            .iter()
            .find(|p| p.tokens[0] == token_index && p.tokens[1] == USDC_TOKEN_INDEX)
            .map(|p| p.index)
    }
}

// ==================== Orderbook ====================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct L2Book {
    pub coin: String,
    /// `[bids, asks]`, each sorted best-first by the venue.
    pub levels: Vec<Vec<L2Level>>,
    pub time: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct L2Level {
    pub px: String,
    pub sz: String,
    pub n: u64,
}

// ==================== Account Reads ====================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub asset_positions: Vec<AssetPosition>,
    pub margin_summary: MarginSummary,
    pub cross_margin_summary: MarginSummary,
    pub withdrawable: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssetPosition {
    pub position: PositionData,
    #[serde(rename = "type")]
    pub type_string: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    pub szi: String,
    pub entry_px: Option<String>,
    pub leverage: Leverage,
    pub liquidation_px: Option<String>,
    pub margin_used: String,
    pub position_value: String,
    pub unrealized_pnl: String,
    pub max_leverage: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Leverage {
    #[serde(rename = "type")]
    pub type_string: String,
    pub value: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: String,
    pub total_margin_used: String,
    pub total_ntl_pos: String,
    pub total_raw_usd: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpotBalances {
    pub balances: Vec<SpotBalance>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpotBalance {
    pub coin: String,
    pub token: u32,
    pub hold: String,
    pub total: String,
    pub entry_ntl: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub coin: String,
    pub side: String,
    pub limit_px: String,
    pub sz: String,
    pub oid: u64,
    pub timestamp: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserFill {
    pub coin: String,
    pub side: String,
    pub px: String,
    pub sz: String,
    pub oid: u64,
    pub time: u64,
    pub crossed: bool,
    pub fee: String,
    pub closed_pnl: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FundingEntry {
    pub coin: String,
    pub funding_rate: String,
    pub premium: String,
    pub time: u64,
}

// ==================== Order Writes ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r", default)]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderType,
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderType {
    Limit(Limit),
    Trigger(Trigger),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limit {
    /// "Alo", "Ioc" or "Gtc".
    pub tif: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(rename = "triggerPx")]
    pub trigger_px: String,
    #[serde(rename = "isMarket")]
    pub is_market: bool,
    /// "tp" or "sl".
    pub tpsl: String,
}

pub const TIF_ALO: &str = "Alo";
pub const TIF_IOC: &str = "Ioc";
pub const TIF_GTC: &str = "Gtc";

impl OrderRequest {
    pub fn limit(
        asset: u32,
        is_buy: bool,
        limit_px: impl Into<String>,
        sz: impl Into<String>,
        tif: impl Into<String>,
    ) -> Self {
        Self {
            asset,
            is_buy,
            limit_px: limit_px.into(),
            sz: sz.into(),
            reduce_only: false,
            order_type: OrderType::Limit(Limit { tif: tif.into() }),
            cloid: None,
        }
    }

    pub fn reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    pub fn with_cloid(mut self, cloid: Option<uuid::Uuid>) -> Self {
        self.cloid = cloid.map(|id| format!("{:032x}", id.as_u128()));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

/// Builder-fee attachment on order submissions. `fee` is in tenths of a
/// basis point (venue wire unit).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuilderInfo {
    #[serde(rename = "b")]
    pub builder: String,
    #[serde(rename = "f")]
    pub fee: u64,
}

// ==================== Exchange Responses ====================

#[derive(Debug, Clone, Deserialize)]
pub struct RestingOrder {
    pub oid: u64,
    #[serde(default)]
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledOrder {
    pub total_sz: String,
    pub avg_px: String,
    pub oid: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExchangeDataStatus {
    Success,
    WaitingForFill,
    WaitingForTrigger,
    Error(String),
    Resting(RestingOrder),
    Filled(FilledOrder),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeDataStatuses {
    pub statuses: Vec<ExchangeDataStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub data: Option<ExchangeDataStatuses>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "status", content = "response")]
pub enum ExchangeResponseStatus {
    Ok(ExchangeResponse),
    Err(String),
}

impl ExchangeResponseStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Flatten into the per-order statuses, or the top-level error message.
    pub fn into_statuses(self) -> Result<Vec<ExchangeDataStatus>, String> {
        match self {
            Self::Ok(resp) => Ok(resp.data.map(|d| d.statuses).unwrap_or_default()),
            Self::Err(msg) => Err(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_wire_shape() {
        let order = OrderRequest::limit(100005, true, "431.5", "3.000", TIF_IOC);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["a"], 100005);
        assert_eq!(json["b"], true);
        assert_eq!(json["p"], "431.5");
        assert_eq!(json["s"], "3.000");
        assert_eq!(json["r"], false);
        assert_eq!(json["t"]["limit"]["tif"], "Ioc");
        assert!(json.get("c").is_none());
    }

    #[test]
    fn cloid_is_32_hex_digits() {
        let order = OrderRequest::limit(1, true, "1", "1", TIF_GTC)
            .with_cloid(Some(uuid::Uuid::from_u128(0xdead_beef)));
        let cloid = order.cloid.unwrap();
        assert_eq!(cloid.len(), 32);
        assert!(cloid.ends_with("deadbeef"));
    }

    #[test]
    fn exchange_status_parses_filled() {
        let raw = r#"{
            "status": "ok",
            "response": {
                "type": "order",
                "data": {
                    "statuses": [
                        {"filled": {"totalSz": "3.0", "avgPx": "431.5", "oid": 77}}
                    ]
                }
            }
        }"#;
        let status: ExchangeResponseStatus = serde_json::from_str(raw).unwrap();
        let statuses = status.into_statuses().unwrap();
        match &statuses[0] {
            ExchangeDataStatus::Filled(f) => {
                assert_eq!(f.oid, 77);
                assert_eq!(f.avg_px, "431.5");
            }
            other => panic!("expected filled, got {other:?}"),
        }
    }

    #[test]
    fn level_price_string_round_trips() {
        let raw = r#"{"px":"431.50","sz":"5.0","n":3}"#;
        let level: L2Level = serde_json::from_str(raw).unwrap();
        assert_eq!(level.px, "431.50");
        let back = serde_json::to_string(&level).unwrap();
        assert!(back.contains("\"431.50\""));
    }
}
