use tracing::{error, info, warn};

use crate::config::FilterConfig;
use crate::detector::detect;
use crate::error::Result;
use crate::fetcher::SnapshotFetcher;
use crate::filter::normalize;
use crate::notifier::Notifier;
use crate::state::PriceHistoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot could not be obtained. Nothing was read or written.
    FetchFailed,
    /// Fetch succeeded but no ticket matched the target categories.
    Empty,
    /// Tickets found, history left untouched.
    Unchanged,
    /// History was persisted; `events` notifications were attempted.
    Updated { events: usize },
}

/// One fetch → filter → detect → persist → notify pass.
pub struct Watcher {
    fetcher: Box<dyn SnapshotFetcher>,
    notifier: Box<dyn Notifier>,
    store: PriceHistoryStore,
    filter: FilterConfig,
}

impl Watcher {
    pub fn new(
        fetcher: Box<dyn SnapshotFetcher>,
        notifier: Box<dyn Notifier>,
        store: PriceHistoryStore,
        filter: FilterConfig,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            store,
            filter,
        }
    }

    /// Only a failed history write is returned as an error; fetch and delivery
    /// problems are logged and end the cycle normally.
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let records = match self.fetcher.fetch().await {
            Ok(r) => r,
            Err(e) => {
                error!("[CYCLE] fetch via {} failed: {e}", self.fetcher.name());
                return Ok(CycleOutcome::FetchFailed);
            }
        };

        let (tickets, stats) = normalize(&records, &self.filter);
        info!(
            "[FILTER] {} records → {} tickets (rejected: category={} price={})",
            stats.total, stats.kept, stats.rejected_category, stats.rejected_price,
        );

        if tickets.is_empty() {
            warn!("[CYCLE] no tickets in the target categories");
            return Ok(CycleOutcome::Empty);
        }

        let state = self.store.load();
        info!(
            lowest_price = state.lowest_price,
            category = state.lowest_category.as_deref().unwrap_or("-"),
            "[CYCLE] recorded lowest: R$ {}",
            state.lowest_price,
        );

        let detection = detect(tickets, &state);
        if let Some(best) = &detection.best {
            info!(
                price = best.price,
                category = %best.category,
                mode = %detection.mode,
                "[CYCLE] cheapest now: {} - R$ {}",
                best.category,
                best.price,
            );
        }

        let Some(new_state) = &detection.new_state else {
            info!("[CYCLE] lowest price unchanged");
            return Ok(CycleOutcome::Unchanged);
        };

        let persisted = self.store.save(new_state);
        if let Err(e) = &persisted {
            error!("[CYCLE] {e}");
        }

        for event in &detection.events {
            if let Err(e) = self.notifier.send(event).await {
                error!("[NOTIFY] failed to deliver {event}: {e}");
            }
        }

        persisted?;
        Ok(CycleOutcome::Updated {
            events: detection.events.len(),
        })
    }
}
