use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};
use hyperprime::{BuilderSetting, PrimeBroker, SdkConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log_level.as_filter()))
        .with_writer(std::io::stderr)
        .init();

    let private_key = match &cli.key {
        Some(key) => Some(key.clone()),
        None => std::env::var(&cli.key_env).ok(),
    };

    let config = SdkConfig {
        private_key,
        wallet_address: None,
        testnet: cli.testnet,
        default_slippage: None,
        log_level: Some(cli.log_level),
        builder: if cli.no_builder_fee {
            BuilderSetting::Disabled
        } else {
            BuilderSetting::Unset
        },
    };

    let broker = PrimeBroker::new(config)?;
    broker.connect().await.context("discovery failed")?;

    run(&broker, &cli).await
}

async fn run(broker: &PrimeBroker, cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Markets { asset } => {
            let group = broker.markets(asset)?;
            if cli.json {
                print_json(&group)?;
            } else {
                println!(
                    "{} — {} market(s){}",
                    group.base_asset,
                    group.markets.len(),
                    if group.has_alternatives {
                        " (alternatives available)"
                    } else {
                        ""
                    }
                );
                for m in &group.markets {
                    println!(
                        "  {:<20} dex={:<12} collateral={:<8} index={:<7} mark={}",
                        m.coin, m.dex_name, m.collateral, m.asset_index, m.mark_price
                    );
                }
            }
        }

        Command::Book { asset, depth } => {
            let book = broker.book(asset).await?;
            if cli.json {
                print_json(&book)?;
            } else {
                println!(
                    "{} aggregated book ({} market(s), {} failed)",
                    book.base_asset,
                    book.per_market_books.len(),
                    book.failed_coins.len()
                );
                println!("{:>14}  {:>12}  sources", "price", "size");
                for level in book.asks.iter().take(*depth).rev() {
                    println!(
                        "{:>14}  {:>12.4}  {}",
                        level.px,
                        level.total_size,
                        sources(level)
                    );
                }
                println!("  ----");
                for level in book.bids.iter().take(*depth) {
                    println!(
                        "{:>14}  {:>12.4}  {}",
                        level.px,
                        level.total_size,
                        sources(level)
                    );
                }
            }
        }

        Command::Funding { asset } => {
            let markets = broker.funding(asset)?;
            if cli.json {
                print_json(&markets)?;
            } else {
                println!(
                    "{:<20} {:>12} {:>14} {:>14}",
                    "market", "funding", "open interest", "mark"
                );
                for m in &markets {
                    println!(
                        "{:<20} {:>12.6} {:>14.2} {:>14}",
                        m.coin, m.funding, m.open_interest, m.mark_price
                    );
                }
            }
        }

        Command::Quote { asset, side, size } => {
            let quote = broker.quote(asset, *side, *size, None).await?;
            if cli.json {
                print_json(&quote)?;
            } else {
                println!(
                    "{} {} {} via {} (dex {})",
                    side,
                    size,
                    quote.base_asset,
                    quote.selected_market.coin,
                    quote.selected_market.dex_name
                );
                println!("  avg price      {}", quote.estimated_avg_price);
                println!(
                    "  impact         {:.3} bps",
                    quote.estimated_price_impact_bps
                );
                println!("  funding        {:.6}", quote.estimated_funding_rate);
                println!("  limit price    {}", quote.plan.limit_price);
                for alt in &quote.alternatives_considered {
                    println!(
                        "  alt {:<18} score {:>10.3}{}",
                        alt.coin,
                        alt.total_score,
                        alt.reason
                            .as_deref()
                            .map(|r| format!(" ({r})"))
                            .unwrap_or_default()
                    );
                }
                for w in &quote.warnings {
                    println!("  warning: {w}");
                }
            }
        }

        Command::Long { asset, size } => {
            let receipt = broker.long(asset, *size, None).await?;
            report_split(cli, &receipt)?;
        }

        Command::Short { asset, size } => {
            let receipt = broker.short(asset, *size, None).await?;
            report_split(cli, &receipt)?;
        }

        Command::Positions => {
            let grouped = broker.grouped_positions().await?;
            if cli.json {
                print_json(&grouped)?;
            } else if grouped.is_empty() {
                println!("no open positions");
            } else {
                for (base, positions) in &grouped {
                    println!("{base}");
                    for p in positions {
                        println!(
                            "  {:<20} {:<5} {:>12.4} @ {:<12} uPnL {:>10.2}  {}x",
                            p.coin, p.side, p.size, p.entry_price, p.unrealized_pnl, p.leverage
                        );
                    }
                }
            }
        }

        Command::Balance => {
            let summary = broker.balances().await?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("perp account value  {:.2}", summary.account_value);
                println!("margin used         {:.2}", summary.total_margin_used);
                println!("withdrawable        {:.2}", summary.withdrawable);
                if !summary.spot_balances.is_empty() {
                    println!("spot balances:");
                    for b in &summary.spot_balances {
                        println!("  {:<10} {:>14.4} (hold {:.4})", b.token, b.total, b.hold);
                    }
                }
            }
        }
    }

    Ok(())
}

fn sources(level: &hyperprime::AggregatedLevel) -> String {
    level
        .sources
        .iter()
        .map(|s| format!("{}:{}", s.coin, s.size))
        .collect::<Vec<_>>()
        .join(" ")
}

fn report_split(cli: &Cli, receipt: &hyperprime::SplitExecutionReceipt) -> Result<()> {
    if cli.json {
        print_json(receipt)?;
    } else {
        if let Some(collateral) = &receipt.collateral {
            for swap in &collateral.swaps_executed {
                println!(
                    "  swapped into {} ({:.4} filled)",
                    swap.token, swap.filled_size
                );
            }
        }
        for leg in &receipt.legs {
            match (&leg.error, leg.avg_price) {
                (Some(err), _) => println!("  {} FAILED: {err}", leg.coin),
                (None, Some(px)) => {
                    println!("  {} filled {:.4} @ {px}", leg.coin, leg.filled_size)
                }
                (None, None) => println!("  {} no fill (IOC missed)", leg.coin),
            }
        }
        println!("{}", if receipt.success { "done" } else { "FAILED" });
    }
    if !receipt.success {
        anyhow::bail!(
            "execution failed{}",
            receipt
                .error
                .as_deref()
                .map(|e| format!(": {e}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
