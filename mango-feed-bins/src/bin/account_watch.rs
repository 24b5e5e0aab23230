//! Log every change notification for a set of accounts
//!
//! Useful for checking an endpoint and commitment level before pointing
//! the decoders at it.

use std::cell::RefCell;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use mango_feed_bins::common::{init_logging, parse_key, run_feed, shutdown_flag, CommonArgs};
use mango_feed_core::core::{PublicKey, SubscriptionStatus};
use mango_feed_core::resilience::install_panic_handler;
use mango_feed_core::subscriptions::RawAccountListener;

#[derive(Parser, Debug)]
#[command(author, version, about = "Log raw account change notifications")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Accounts to watch (base58)
    #[arg(required = true)]
    accounts: Vec<String>,

    /// Warn when a payload is not exactly this many bytes
    #[arg(long)]
    expect_len: Option<usize>,

    /// Seconds between subscription status summaries
    #[arg(long, default_value = "30")]
    status_interval: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.common.feed_config()?;

    init_logging(&config);
    install_panic_handler();

    let accounts: Vec<PublicKey> = cli
        .accounts
        .iter()
        .map(|a| parse_key(a, "account"))
        .collect::<Result<_>>()?;

    tracing::info!(
        endpoint = %config.endpoint,
        commitment = %config.commitment,
        count = accounts.len(),
        "=== Mango account watch ==="
    );

    let shutdown = shutdown_flag()?;
    let local_ids = RefCell::new(Vec::with_capacity(accounts.len()));

    run_feed(
        &cli.common,
        &config,
        &shutdown,
        Duration::from_secs(cli.status_interval.max(1)),
        |session| {
            let mut local_ids = local_ids.borrow_mut();
            local_ids.clear();
            for account in &accounts {
                let mut listener = RawAccountListener::new(account.to_base58());
                if let Some(len) = cli.expect_len {
                    listener = listener.expect_len(len);
                }
                let local_id = session.subscribe(*account, config.commitment, listener)?;
                local_ids.push((local_id, *account));
            }
            Ok(())
        },
        |session| {
            for (local_id, account) in local_ids.borrow().iter() {
                match session.status(*local_id) {
                    Some(SubscriptionStatus::Active(sub_id)) => {
                        tracing::info!(%account, sub_id, "active")
                    }
                    Some(status) => tracing::warn!(%account, ?status, "not active"),
                    None => tracing::warn!(%account, "unknown subscription"),
                }
            }
        },
    )?;

    tracing::info!("account watch stopped");
    Ok(())
}
