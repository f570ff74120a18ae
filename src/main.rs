mod config;
mod cycle;
mod detector;
mod error;
mod fetcher;
mod filter;
mod notifier;
mod state;
mod types;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::cycle::{CycleOutcome, Watcher};
use crate::error::Result;
use crate::fetcher::build_fetcher;
use crate::notifier::{build_notifier, LogNotifier, Notifier};
use crate::state::PriceHistoryStore;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Cycle failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let fetcher = build_fetcher(&cfg.source)?;
    let notifier: Box<dyn Notifier> = match build_notifier(cfg.telegram.as_ref()) {
        Ok(n) => n,
        Err(e) => {
            warn!("Telegram client unavailable ({e}); alerts will only be logged");
            Box::new(LogNotifier)
        }
    };
    if cfg.telegram.is_none() {
        warn!("TELEGRAM_TOKEN / CHAT_ID not set; alerts will only be logged");
    }

    info!(
        "Watching {} via {} fetcher | targets: {} | state: {}",
        cfg.filter.event_url.as_deref().unwrap_or("(no EVENT_URL)"),
        fetcher.name(),
        cfg.filter.target_categories.join(", "),
        cfg.state_path,
    );

    let watcher = Watcher::new(
        fetcher,
        notifier,
        PriceHistoryStore::new(&cfg.state_path),
        cfg.filter.clone(),
    );

    match watcher.run_once().await? {
        CycleOutcome::FetchFailed => info!("Cycle ended: fetch failed"),
        CycleOutcome::Empty => info!("Cycle ended: no matching tickets"),
        CycleOutcome::Unchanged => info!("Cycle ended: no change"),
        CycleOutcome::Updated { events } => {
            info!("Cycle ended: history updated, {events} notification(s)")
        }
    }

    Ok(())
}
