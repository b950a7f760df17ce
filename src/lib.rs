//! Prime-broker routing layer over a venue hosting many fragmented perp
//! markets for the same underlying asset.
//!
//! Given an intent to buy or sell a base asset, the SDK discovers every
//! market trading it, decides between single-market and split routing,
//! quantifies the cost including collateral acquisition, produces a
//! reviewable plan, and executes it atomically with automatic collateral
//! preparation.
//!
//! ```no_run
//! use hyperprime::{PrimeBroker, SdkConfig, Side};
//!
//! # async fn run() -> hyperprime::Result<()> {
//! let broker = PrimeBroker::new(SdkConfig::default())?;
//! broker.connect().await?;
//! let quote = broker.quote("TSLA", Side::Buy, 3.0, None).await?;
//! println!("{} @ {}", quote.selected_market.coin, quote.estimated_avg_price);
//! # Ok(())
//! # }
//! ```

pub mod book;
pub mod broker;
pub mod client;
pub mod collateral;
pub mod config;
pub mod errors;
pub mod executor;
pub mod positions;
pub mod registry;
pub mod routing;
pub mod types;

pub use book::{AggregatedBook, AggregatedLevel, BookAggregator, MarketBook};
pub use broker::{BalanceSummary, PrimeBroker};
pub use collateral::{CollateralManager, CollateralPlan, CollateralReceipt};
pub use config::{BuilderConfig, BuilderSetting, LogLevel, SdkConfig};
pub use errors::{PrimeError, Result};
pub use executor::{ExecutionReceipt, Executor, SplitExecutionReceipt};
pub use positions::{LogicalPosition, PositionManager};
pub use registry::{MarketGroup, MarketRegistry, PerpMarket};
pub use routing::{ExecutionPlan, Quote, Router, SplitExecutionPlan, SplitQuote};
pub use types::Side;
