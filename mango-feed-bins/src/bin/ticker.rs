//! Level-1 ticker for one Mango perp market
//!
//! Loads the perp market account to find its bids, asks and event queue,
//! then streams all three into a `MarketAggregator` and prints the best
//! bid/ask, last trade and depth around the midpoint at a fixed interval.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use mango_feed_bins::common::{
    fetch_perp_market, init_logging, parse_key, run_feed, shutdown_flag, CommonArgs,
};
use mango_feed_core::orderbook::{AggregatorHandle, MarketAggregator, MarketScale};
use mango_feed_core::resilience::install_panic_handler;
use mango_feed_core::subscriptions::{BookSideListener, EventQueueListener};

#[derive(Parser, Debug)]
#[command(author, version, about = "Best bid/ask, last trade and depth for a perp market")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Perp market account address
    #[arg(short, long)]
    market: String,

    /// Base token symbol, for UI decimals (e.g. SOL, BTC)
    #[arg(short, long, default_value = "SOL")]
    base: String,

    /// Seconds between ticker lines
    #[arg(short, long, default_value = "5")]
    interval: u64,

    /// Depth window around the midpoint, in percent
    #[arg(long, default_value = "2")]
    depth_percent: i8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.common.feed_config()?;

    init_logging(&config);
    install_panic_handler();

    let cluster = cli.common.cluster()?;
    let base_index = cluster
        .token_index(&cli.base)
        .ok_or_else(|| anyhow!("{} is not a {} token", cli.base, cluster.name))?;
    let base_decimals = cluster
        .decimals(base_index)
        .ok_or_else(|| anyhow!("no decimals for token slot {}", base_index))?;
    let market = parse_key(&cli.market, "market")?;
    let depth_percent = cli.depth_percent.clamp(1, 100);

    tracing::info!("=== Mango ticker: {} ({}) ===", cli.base, market);

    let shutdown = shutdown_flag()?;
    let aggregator = Arc::new(MarketAggregator::new());
    let handle = AggregatorHandle::spawn(Arc::clone(&aggregator), 1024)
        .context("starting aggregator thread")?;
    let scale = Cell::new(None);

    run_feed(
        &cli.common,
        &config,
        &shutdown,
        Duration::from_secs(cli.interval.max(1)),
        |session| {
            let perp = fetch_perp_market(session, market, config.commitment, config.connect_timeout())?;
            scale.set(Some(MarketScale::from_market(
                &perp,
                base_decimals,
                cluster.quote_decimals(),
            )?));

            let sender = handle
                .sender()
                .ok_or_else(|| anyhow!("aggregator thread already stopped"))?;
            session.subscribe(perp.bids, config.commitment, BookSideListener::bids(sender.clone()))?;
            session.subscribe(perp.asks, config.commitment, BookSideListener::asks(sender.clone()))?;
            session.subscribe(perp.event_queue, config.commitment, EventQueueListener::new(sender))?;
            Ok(())
        },
        |_session| {
            let state = aggregator.snapshot();
            let Some(scale) = scale.get() else {
                return;
            };
            let ui = |native: u64| {
                scale
                    .price_to_ui(native)
                    .map_or_else(|| "?".to_string(), |d| d.to_string())
            };
            let qty = |native: u64| {
                scale
                    .quantity_to_ui(native)
                    .map_or_else(|| "?".to_string(), |d| d.to_string())
            };

            if state.level1.valid() {
                tracing::info!(
                    "bid {} x {} | ask {} x {} | mid {} | spread {:.1}bps",
                    ui(state.level1.highest_bid),
                    qty(state.level1.highest_bid_size),
                    ui(state.level1.lowest_ask),
                    qty(state.level1.lowest_ask_size),
                    ui(state.level1.midpoint),
                    state.level1.spread_bps,
                );
                tracing::info!(
                    "depth +{}% {} | -{}% {}",
                    depth_percent,
                    qty(aggregator.depth(depth_percent)),
                    depth_percent,
                    qty(aggregator.depth(-depth_percent)),
                );
            } else {
                tracing::info!("waiting for both book sides");
            }

            if let Some(trade) = state.last_trade {
                tracing::info!(
                    "last {} {} @ {} (seq {})",
                    trade.taker_side,
                    qty(trade.quantity),
                    ui(trade.price),
                    trade.seq_num,
                );
            }
        },
    )?;

    drop(handle);
    tracing::info!("ticker stopped");
    Ok(())
}
