//! Market discovery across deployers. The registry owns the per-asset index
//! and rebuilds it atomically on every `discover()`; readers always see one
//! consistent generation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::VenueClient;
use crate::client::types::{AssetContext, AssetMeta, PerpDex};
use crate::errors::{PrimeError, Result};

/// Sentinel deployer label for first-party markets.
pub const NATIVE_DEX: &str = "__native__";

/// Account-native collateral. Markets margined in it draw from the perp
/// balance under dex abstraction.
pub const NATIVE_COLLATERAL: &str = "USDC";

const DEPLOYER_INDEX_BASE: u32 = 100_000;
const DEPLOYER_INDEX_STRIDE: u32 = 10_000;

/// A single tradable perp market.
#[derive(Debug, Clone, Serialize)]
pub struct PerpMarket {
    /// Normalized symbol: uppercase, deployer prefix stripped, trailing
    /// digits stripped unless that would empty the name.
    pub base_asset: String,
    /// Venue-native identifier used in all wire calls.
    pub coin: String,
    /// Global numeric ID (native = local index, deployer markets use the
    /// encoded form).
    pub asset_index: u32,
    pub dex_name: String,
    /// Resolved margin token, or a `TOKEN_<n>` placeholder.
    pub collateral: String,
    pub is_native: bool,
    pub sz_decimals: u32,
    pub max_leverage: u32,
    pub funding: f64,
    pub open_interest: f64,
    pub mark_price: f64,
    pub oracle_price: Option<f64>,
}

/// All markets trading one base asset.
#[derive(Debug, Clone, Serialize)]
pub struct MarketGroup {
    pub base_asset: String,
    pub markets: Vec<PerpMarket>,
    pub has_alternatives: bool,
}

/// Global asset index encoding. This is an external contract: native markets
/// keep their local index, deployer `d >= 1` maps to
/// `100000 + d*10000 + local`.
pub fn global_asset_index(deployer_index: u32, local_index: u32) -> u32 {
    if deployer_index == 0 {
        local_index
    } else {
        DEPLOYER_INDEX_BASE + deployer_index * DEPLOYER_INDEX_STRIDE + local_index
    }
}

/// Derive the normalized base asset from a venue coin name.
///
/// Native coins are used as-is. Deployer coins take the substring after the
/// first colon and strip trailing ASCII digits, falling back to the
/// unstripped suffix when stripping would empty it.
pub fn extract_base_asset(coin: &str, is_native: bool) -> String {
    let raw = if is_native {
        coin
    } else {
        coin.split_once(':').map(|(_, rest)| rest).unwrap_or(coin)
    };

    if is_native {
        return raw.to_uppercase();
    }

    let stripped = raw.trim_end_matches(|c: char| c.is_ascii_digit());
    if stripped.is_empty() {
        raw.to_uppercase()
    } else {
        stripped.to_uppercase()
    }
}

struct DeployerUniverse {
    deployer_index: u32,
    dex: Option<PerpDex>,
    universe: Vec<AssetMeta>,
    ctxs: Vec<AssetContext>,
}

pub struct MarketRegistry {
    client: Arc<dyn VenueClient>,
    index: RwLock<Arc<HashMap<String, MarketGroup>>>,
}

impl MarketRegistry {
    pub fn new(client: Arc<dyn VenueClient>) -> Self {
        Self {
            client,
            index: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Rebuild the full per-asset index. Top-level token/deployer fetch
    /// failures propagate; per-deployer context failures skip that deployer
    /// with a warning. Idempotent.
    pub async fn discover(&self) -> Result<()> {
        let spot_meta = self.client.spot_meta().await?;
        let token_names: HashMap<u32, String> = spot_meta
            .tokens
            .iter()
            .map(|t| (t.index, t.name.clone()))
            .collect();

        let dexs = self.client.perp_dexs().await?;

        let fetches = dexs.into_iter().enumerate().map(|(i, dex)| {
            let client = Arc::clone(&self.client);
            async move {
                let dex_name = dex.as_ref().map(|d| d.name.clone());
                let result = client.meta_and_asset_ctxs(dex_name.as_deref()).await;
                (i as u32, dex, result)
            }
        });

        let mut universes = Vec::new();
        for (deployer_index, dex, result) in futures::future::join_all(fetches).await {
            match result {
                Ok((meta, ctxs)) => universes.push(DeployerUniverse {
                    deployer_index,
                    dex,
                    universe: meta.universe,
                    ctxs,
                }),
                Err(e) => {
                    warn!(
                        dex = dex.as_ref().map(|d| d.name.as_str()).unwrap_or(NATIVE_DEX),
                        error = %e,
                        "skipping deployer: asset contexts unavailable"
                    );
                }
            }
        }

        let mut index: HashMap<String, MarketGroup> = HashMap::new();
        for universe in universes {
            Self::index_universe(&mut index, universe, &token_names);
        }

        for group in index.values_mut() {
            group.has_alternatives = group.markets.len() > 1;
        }

        debug!(
            assets = index.len(),
            markets = index.values().map(|g| g.markets.len()).sum::<usize>(),
            "market index rebuilt"
        );

        *self.index.write().expect("registry lock poisoned") = Arc::new(index);
        Ok(())
    }

    fn index_universe(
        index: &mut HashMap<String, MarketGroup>,
        universe: DeployerUniverse,
        token_names: &HashMap<u32, String>,
    ) {
        let is_native = universe.dex.is_none();
        let dex_name = universe
            .dex
            .as_ref()
            .map(|d| d.name.clone())
            .unwrap_or_else(|| NATIVE_DEX.to_string());

        let collateral = if is_native {
            NATIVE_COLLATERAL.to_string()
        } else {
            match universe.dex.as_ref().and_then(|d| d.collateral_token) {
                Some(token) => token_names
                    .get(&token)
                    .cloned()
                    .unwrap_or_else(|| format!("TOKEN_{token}")),
                None => NATIVE_COLLATERAL.to_string(),
            }
        };

        for (local_index, asset) in universe.universe.iter().enumerate() {
            if asset.is_delisted.unwrap_or(false) {
                continue;
            }
            let Some(ctx) = universe.ctxs.get(local_index) else {
                debug!(coin = %asset.name, "skipping asset: no context");
                continue;
            };

            let base_asset = extract_base_asset(&asset.name, is_native);
            let market = PerpMarket {
                base_asset: base_asset.clone(),
                coin: asset.name.clone(),
                asset_index: global_asset_index(universe.deployer_index, local_index as u32),
                dex_name: dex_name.clone(),
                collateral: collateral.clone(),
                is_native,
                sz_decimals: asset.sz_decimals,
                max_leverage: asset.max_leverage,
                funding: ctx.funding.parse().unwrap_or(0.0),
                open_interest: ctx.open_interest.parse().unwrap_or(0.0),
                mark_price: ctx.mark_px.parse().unwrap_or(0.0),
                oracle_price: ctx.oracle_px.as_deref().and_then(|s| s.parse().ok()),
            };

            index
                .entry(base_asset.clone())
                .or_insert_with(|| MarketGroup {
                    base_asset,
                    markets: Vec::new(),
                    has_alternatives: false,
                })
                .markets
                .push(market);
        }
    }

    fn snapshot(&self) -> Arc<HashMap<String, MarketGroup>> {
        Arc::clone(&self.index.read().expect("registry lock poisoned"))
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Markets for a base asset, case-insensitive. Errors with `NoMarkets`
    /// when the asset is unknown.
    pub fn get_markets(&self, base_asset: &str) -> Result<Vec<PerpMarket>> {
        self.get_group(base_asset).map(|g| g.markets)
    }

    pub fn get_group(&self, base_asset: &str) -> Result<MarketGroup> {
        self.snapshot()
            .get(&base_asset.to_uppercase())
            .cloned()
            .ok_or_else(|| PrimeError::NoMarkets(base_asset.to_string()))
    }

    pub fn get_all_groups(&self) -> Vec<MarketGroup> {
        let mut groups: Vec<_> = self.snapshot().values().cloned().collect();
        groups.sort_by(|a, b| a.base_asset.cmp(&b.base_asset));
        groups
    }

    pub fn get_groups_with_alternatives(&self) -> Vec<MarketGroup> {
        self.get_all_groups()
            .into_iter()
            .filter(|g| g.has_alternatives)
            .collect()
    }

    /// Reverse lookup by venue coin name.
    pub fn market_by_coin(&self, coin: &str) -> Option<PerpMarket> {
        self.snapshot()
            .values()
            .flat_map(|g| g.markets.iter())
            .find(|m| m.coin == coin)
            .cloned()
    }
}
