//! Per-asset book aggregation. Books are fetched in parallel with a
//! per-fetch timeout; levels merge by exact decimal-string price, keeping
//! per-source contributions so the splitter can allocate back to markets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::client::VenueClient;
use crate::client::types::L2Book;
use crate::errors::{PrimeError, Result};
use crate::registry::{MarketRegistry, PerpMarket};
use crate::types::Side;

/// Per-book fetch budget. A slow venue is dropped from the merge, never
/// stalls the whole operation.
pub const BOOK_FETCH_TIMEOUT: Duration = Duration::from_millis(2_500);

/// One parsed price level of a single market's book.
#[derive(Debug, Clone, Serialize)]
pub struct BookLevel {
    /// Original decimal string from the wire. Level identity for merging.
    pub px: String,
    pub price: f64,
    pub size: f64,
}

/// Parsed snapshot of one market's book.
#[derive(Debug, Clone, Serialize)]
pub struct MarketBook {
    pub coin: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub time_ms: u64,
}

impl MarketBook {
    pub fn from_l2(snapshot: L2Book) -> Self {
        let mut sides = snapshot.levels.into_iter();
        let parse = |levels: Option<Vec<crate::client::types::L2Level>>| {
            levels
                .unwrap_or_default()
                .into_iter()
                .map(|l| BookLevel {
                    price: l.px.parse().unwrap_or(0.0),
                    size: l.sz.parse().unwrap_or(0.0),
                    px: l.px,
                })
                .collect::<Vec<_>>()
        };
        Self {
            coin: snapshot.coin,
            bids: parse(sides.next()),
            asks: parse(sides.next()),
            time_ms: snapshot.time,
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Midpoint of best bid/ask; single-sided best when one side is empty;
    /// zero when both are.
    pub fn mid_price(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => (b + a) / 2.0,
            (Some(p), None) | (None, Some(p)) => p,
            (None, None) => 0.0,
        }
    }
}

/// One contributing market at a merged level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelSource {
    pub coin: String,
    pub size: f64,
}

/// A merged price level. `sum(sources.size) == total_size` within
/// representation tolerance.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedLevel {
    pub px: String,
    pub price: f64,
    pub total_size: f64,
    pub sources: Vec<LevelSource>,
}

/// Cross-market merged view of one base asset.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedBook {
    pub base_asset: String,
    /// Descending by price.
    pub bids: Vec<AggregatedLevel>,
    /// Ascending by price.
    pub asks: Vec<AggregatedLevel>,
    pub per_market_books: Vec<MarketBook>,
    pub failed_coins: Vec<String>,
    pub timestamp_ms: u64,
}

impl AggregatedBook {
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn mid_price(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => (b + a) / 2.0,
            (Some(p), None) | (None, Some(p)) => p,
            (None, None) => 0.0,
        }
    }

    pub fn active_side(&self, side: Side) -> &[AggregatedLevel] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }
}

pub struct BookAggregator {
    client: Arc<dyn VenueClient>,
    registry: Arc<MarketRegistry>,
}

impl BookAggregator {
    pub fn new(client: Arc<dyn VenueClient>, registry: Arc<MarketRegistry>) -> Self {
        Self { client, registry }
    }

    /// Fetch the books of the given markets concurrently. Returns the
    /// successful snapshots in market order plus the coins that failed or
    /// timed out.
    pub async fn fetch_books(&self, markets: &[PerpMarket]) -> (Vec<MarketBook>, Vec<String>) {
        let fetches = markets.iter().map(|market| {
            let client = Arc::clone(&self.client);
            let coin = market.coin.clone();
            async move {
                let result = tokio::time::timeout(BOOK_FETCH_TIMEOUT, client.l2_book(&coin)).await;
                (coin, result)
            }
        });

        let mut books = Vec::with_capacity(markets.len());
        let mut failed = Vec::new();
        for (coin, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(Ok(snapshot)) => books.push(MarketBook::from_l2(snapshot)),
                Ok(Err(e)) => {
                    warn!(coin = %coin, error = %e, "book fetch failed");
                    failed.push(coin);
                }
                Err(_) => {
                    warn!(coin = %coin, timeout_ms = BOOK_FETCH_TIMEOUT.as_millis() as u64, "book fetch timed out");
                    failed.push(coin);
                }
            }
        }
        (books, failed)
    }

    /// Full merged book for a base asset. Unknown assets and all-failed
    /// fetches yield an empty book; the caller decides whether that is an
    /// error.
    pub async fn aggregate(&self, base_asset: &str) -> Result<AggregatedBook> {
        let markets = match self.registry.get_markets(base_asset) {
            Ok(markets) => markets,
            Err(PrimeError::NoMarkets(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let (books, failed) = self.fetch_books(&markets).await;

        Ok(AggregatedBook {
            base_asset: base_asset.to_uppercase(),
            bids: merge_levels(&books, Side::Sell),
            asks: merge_levels(&books, Side::Buy),
            per_market_books: books,
            failed_coins: failed,
            timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
        })
    }

    /// Merged view guaranteeing at least the cumulative depth for `size` on
    /// the active side. The inactive side is returned in full (the router
    /// derives the mid from it).
    pub async fn aggregate_for_order(
        &self,
        base_asset: &str,
        side: Side,
        size: f64,
    ) -> Result<AggregatedBook> {
        let mut book = self.aggregate(base_asset).await?;
        let active = match side {
            Side::Buy => &mut book.asks,
            Side::Sell => &mut book.bids,
        };
        truncate_to_depth(active, size);
        Ok(book)
    }
}

/// Merge one side of several books by exact price-string equality. Source
/// order within a level follows input book iteration order; the merged side
/// is then sorted (bids descending, asks ascending).
fn merge_levels(books: &[MarketBook], taker_side: Side) -> Vec<AggregatedLevel> {
    let mut merged: Vec<AggregatedLevel> = Vec::new();
    let mut by_px: HashMap<String, usize> = HashMap::new();

    for book in books {
        let levels = match taker_side {
            Side::Buy => &book.asks,
            Side::Sell => &book.bids,
        };
        for level in levels {
            match by_px.get(&level.px) {
                Some(&i) => {
                    merged[i].total_size += level.size;
                    merged[i].sources.push(LevelSource {
                        coin: book.coin.clone(),
                        size: level.size,
                    });
                }
                None => {
                    by_px.insert(level.px.clone(), merged.len());
                    merged.push(AggregatedLevel {
                        px: level.px.clone(),
                        price: level.price,
                        total_size: level.size,
                        sources: vec![LevelSource {
                            coin: book.coin.clone(),
                            size: level.size,
                        }],
                    });
                }
            }
        }
    }

    match taker_side {
        // asks ascending
        Side::Buy => merged.sort_by(|a, b| a.price.total_cmp(&b.price)),
        // bids descending
        Side::Sell => merged.sort_by(|a, b| b.price.total_cmp(&a.price)),
    }
    merged
}

/// Keep the smallest prefix whose cumulative size covers `size`; keep all
/// levels when depth is insufficient.
fn truncate_to_depth(levels: &mut Vec<AggregatedLevel>, size: f64) {
    let mut cumulative = 0.0;
    for (i, level) in levels.iter().enumerate() {
        cumulative += level.total_size;
        if cumulative >= size {
            levels.truncate(i + 1);
            return;
        }
    }
}
