//! Fill stream for one Mango perp market
//!
//! Replays the market's event queue and logs every new fill with maker,
//! taker, fees and time on book. Pass `--event-queue` to skip the perp
//! market lookup (prices are then printed in native units).

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use mango_feed_bins::common::{
    fetch_perp_market, init_logging, parse_key, run_feed, shutdown_flag, CommonArgs,
};
use mango_feed_core::events::EventQueueReplayer;
use mango_feed_core::orderbook::{MarketScale, MarketUpdate, UpdateSink};
use mango_feed_core::resilience::install_panic_handler;
use mango_feed_core::subscriptions::EventQueueListener;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream fills from a perp market event queue")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Perp market account address
    #[arg(short, long)]
    market: Option<String>,

    /// Event queue address, used instead of looking it up from the market
    #[arg(long)]
    event_queue: Option<String>,

    /// Base token symbol, for UI decimals when --market is given
    #[arg(short, long, default_value = "SOL")]
    base: String,

    /// Emit every fill after this sequence number on the first snapshot
    #[arg(long)]
    resume_from: Option<u64>,
}

struct FillLogger {
    scale: Option<MarketScale>,
}

impl UpdateSink for FillLogger {
    fn publish(&self, update: MarketUpdate) {
        let MarketUpdate::Fill(fill) = update else {
            return;
        };
        let native_price = fill.price.max(0) as u64;
        let native_qty = fill.quantity.max(0) as u64;
        let (price, quantity) = match self.scale {
            Some(scale) => (
                scale
                    .price_to_ui(native_price)
                    .map_or_else(|| native_price.to_string(), |d| d.to_string()),
                scale
                    .quantity_to_ui(native_qty)
                    .map_or_else(|| native_qty.to_string(), |d| d.to_string()),
            ),
            None => (native_price.to_string(), native_qty.to_string()),
        };

        tracing::info!(
            seq_num = fill.seq_num,
            taker_side = %fill.taker_side,
            maker = %fill.maker,
            taker = %fill.taker,
            maker_fee = fill.maker_fee.to_f64(),
            taker_fee = fill.taker_fee.to_f64(),
            time_on_book = fill.time_on_book(),
            "fill {} @ {}",
            quantity,
            price,
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.common.feed_config()?;

    init_logging(&config);
    install_panic_handler();

    let cluster = cli.common.cluster()?;
    let market = cli
        .market
        .as_deref()
        .map(|m| parse_key(m, "market"))
        .transpose()?;
    let event_queue = cli
        .event_queue
        .as_deref()
        .map(|q| parse_key(q, "event queue"))
        .transpose()?;
    if market.is_none() && event_queue.is_none() {
        bail!("one of --market or --event-queue is required");
    }

    let shutdown = shutdown_flag()?;
    let mut resume_from = cli.resume_from;

    run_feed(
        &cli.common,
        &config,
        &shutdown,
        Duration::from_secs(60),
        |session| {
            let (queue, scale) = match (event_queue, market) {
                (Some(queue), _) => (queue, None),
                (None, Some(market)) => {
                    let perp =
                        fetch_perp_market(session, market, config.commitment, config.connect_timeout())?;
                    let base_decimals = cluster
                        .token_index(&cli.base)
                        .and_then(|i| cluster.decimals(i))
                        .ok_or_else(|| anyhow!("{} is not a {} token", cli.base, cluster.name))?;
                    let scale = MarketScale::from_market(&perp, base_decimals, cluster.quote_decimals())?;
                    (perp.event_queue, Some(scale))
                }
                (None, None) => bail!("no event queue to follow"),
            };

            // Only the first connection resumes; later ones start from a fresh baseline
            let replayer = match resume_from.take() {
                Some(seq_num) => EventQueueReplayer::resume_from(seq_num),
                None => EventQueueReplayer::new(),
            };
            let listener = EventQueueListener::with_replayer(replayer, FillLogger { scale });
            session.subscribe(queue, config.commitment, listener)?;
            tracing::info!(event_queue = %queue, "following fills");
            Ok(())
        },
        |session| {
            tracing::debug!(live = session.live_count(), "trades heartbeat");
        },
    )?;

    tracing::info!("trades stopped");
    Ok(())
}
