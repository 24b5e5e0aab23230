//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and the reconnect loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use crossbeam::channel::{bounded, RecvTimeoutError};
use mango_feed_core::config::{Cluster, Commitment, FeedConfig};
use mango_feed_core::core::errors::TransportError;
use mango_feed_core::core::PublicKey;
use mango_feed_core::data::{AccountLayout, PerpMarket};
use mango_feed_core::resilience::{
    connect_with_backoff, sleep_unless, BackoffConfig, ExponentialBackoff, ReconnectError,
};
use mango_feed_core::session::{AccountNotification, SubscriptionSession};
use mango_feed_core::utils::init_logger;

/// Common CLI arguments for all binaries
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// JSON config file; CLI flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Cluster whose default endpoint to use (mainnet, devnet)
    #[arg(long, default_value = "mainnet")]
    pub cluster: String,

    /// Pubsub WebSocket endpoint, overrides the cluster default
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// processed, confirmed or finalized
    #[arg(long)]
    pub commitment: Option<String>,

    /// Log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Give up after this many failed connects (default: retry forever)
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl CommonArgs {
    pub fn cluster(&self) -> Result<&'static Cluster> {
        Cluster::by_name(&self.cluster).ok_or_else(|| anyhow!("unknown cluster '{}'", self.cluster))
    }

    /// Defaults, then the config file, then environment, then flags
    pub fn feed_config(&self) -> Result<FeedConfig> {
        let mut config = match &self.config {
            Some(path) => FeedConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => {
                let mut config = FeedConfig {
                    endpoint: self.cluster()?.ws_endpoint.to_string(),
                    ..FeedConfig::default()
                };
                config.apply_env().context("applying environment overrides")?;
                config
            }
        };

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(commitment) = &self.commitment {
            config.commitment = commitment
                .parse::<Commitment>()
                .context("parsing --commitment")?;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.json_logs {
            config.json_logs = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            max_retries: self.max_retries,
            ..BackoffConfig::persistent()
        }
    }
}

/// Initialize tracing/logging from the resolved config
pub fn init_logging(config: &FeedConfig) {
    init_logger(&config.log_level, config.json_logs);
}

/// Flag set by Ctrl-C
pub fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, shutting down");
        handler_flag.store(true, Ordering::Release);
    })
    .context("installing Ctrl-C handler")?;
    Ok(flag)
}

pub fn parse_key(text: &str, what: &str) -> Result<PublicKey> {
    PublicKey::from_base58(text).with_context(|| format!("invalid {} address '{}'", what, text))
}

/// How one connection ended
enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Keep a session alive until Ctrl-C, reconnecting with backoff
///
/// `setup` subscribes on each new session. `tick` runs about every
/// `tick_interval` while connected.
pub fn run_feed<S, T>(
    args: &CommonArgs,
    config: &FeedConfig,
    shutdown: &AtomicBool,
    tick_interval: Duration,
    setup: S,
    tick: T,
) -> Result<()>
where
    S: FnMut(&SubscriptionSession) -> Result<()>,
    T: FnMut(&SubscriptionSession),
{
    run_feed_with(
        args.backoff_config(),
        &config.endpoint,
        shutdown,
        || SubscriptionSession::connect(config),
        tick_interval,
        setup,
        tick,
    )
}

/// `run_feed` with the connect step supplied by the caller
///
/// A failed `setup` is handled like a dropped connection: the session is
/// shut down and the loop reconnects after a backoff delay. Setup failures
/// count against their own backoff, reset once a setup succeeds.
pub fn run_feed_with<C, S, T>(
    backoff_config: BackoffConfig,
    endpoint: &str,
    shutdown: &AtomicBool,
    mut connect: C,
    tick_interval: Duration,
    mut setup: S,
    mut tick: T,
) -> Result<()>
where
    C: FnMut() -> Result<SubscriptionSession, TransportError>,
    S: FnMut(&SubscriptionSession) -> Result<()>,
    T: FnMut(&SubscriptionSession),
{
    let mut backoff = ExponentialBackoff::new(backoff_config.clone());
    let mut setup_backoff = ExponentialBackoff::new(backoff_config);

    loop {
        let session = match connect_with_backoff(&mut backoff, shutdown, &mut connect) {
            Ok(session) => session,
            Err(ReconnectError::Cancelled) => return Ok(()),
            Err(e @ ReconnectError::GaveUp { .. }) => {
                return Err(e).with_context(|| format!("connecting to {}", endpoint))
            }
        };

        if let Err(e) = setup(&session) {
            session.shutdown();
            let Some(delay) = setup_backoff.next_delay() else {
                return Err(e).with_context(|| {
                    format!("subscribing on {} after {} attempts", endpoint, setup_backoff.attempts())
                });
            };
            tracing::warn!(
                endpoint = %endpoint,
                error = %format!("{:#}", e),
                attempt = setup_backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "subscription setup failed, reconnecting"
            );
            if !sleep_unless(shutdown, delay) {
                return Ok(());
            }
            continue;
        }
        setup_backoff.reset();

        let end = watch(&session, shutdown, tick_interval, &mut tick);
        session.shutdown();

        match end {
            SessionEnd::Shutdown => return Ok(()),
            SessionEnd::Disconnected => {
                tracing::warn!(endpoint = %endpoint, "connection lost, reconnecting");
            }
        }
    }
}

fn watch<T>(
    session: &SubscriptionSession,
    shutdown: &AtomicBool,
    tick_interval: Duration,
    tick: &mut T,
) -> SessionEnd
where
    T: FnMut(&SubscriptionSession),
{
    let mut next_tick = Instant::now() + tick_interval;
    loop {
        if shutdown.load(Ordering::Acquire) {
            return SessionEnd::Shutdown;
        }
        if !session.is_connected() {
            return SessionEnd::Disconnected;
        }
        if Instant::now() >= next_tick {
            tick(session);
            next_tick = Instant::now() + tick_interval;
        }
        thread::sleep(Duration::from_millis(100));
    }
}

/// Read one snapshot of a perp market account over an existing session
///
/// The temporary subscription is removed once the snapshot arrives.
pub fn fetch_perp_market(
    session: &SubscriptionSession,
    market: PublicKey,
    commitment: Commitment,
    timeout: Duration,
) -> Result<PerpMarket> {
    let (tx, rx) = bounded(1);
    let local_id = session
        .subscribe(market, commitment, move |n: AccountNotification| {
            let _ = tx.try_send(n.data);
        })
        .context("subscribing to perp market")?;

    let data = match rx.recv_timeout(timeout) {
        Ok(data) => data,
        Err(RecvTimeoutError::Timeout) => {
            session.unsubscribe(local_id);
            bail!("no snapshot of perp market {} within {:?}", market, timeout)
        }
        Err(RecvTimeoutError::Disconnected) => {
            bail!("session closed before perp market {} arrived", market)
        }
    };
    session.unsubscribe(local_id);

    let perp = PerpMarket::decode(&data).with_context(|| format!("decoding perp market {}", market))?;
    tracing::info!(
        market = %market,
        bids = %perp.bids,
        asks = %perp.asks,
        event_queue = %perp.event_queue,
        base_lot_size = perp.base_lot_size,
        quote_lot_size = perp.quote_lot_size,
        "perp market loaded"
    );
    Ok(perp)
}
