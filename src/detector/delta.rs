use tracing::{debug, info};

use crate::config::STATE_SCHEMA_VERSION;
use crate::detector::classifier::{self, Transition};
use crate::state::PriceHistoryState;
use crate::types::{DetectionMode, NotificationEvent, Ticket};

/// Outcome of comparing one snapshot with the stored history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub mode: DetectionMode,
    /// None for an empty snapshot.
    pub transition: Option<Transition>,
    pub best: Option<Ticket>,
    pub events: Vec<NotificationEvent>,
    /// Some when the history must be overwritten and persisted.
    pub new_state: Option<PriceHistoryState>,
}

impl Detection {
    fn quiet(mode: DetectionMode, transition: Option<Transition>, best: Option<Ticket>) -> Self {
        Self {
            mode,
            transition,
            best,
            events: Vec::new(),
            new_state: None,
        }
    }
}

/// Compare `current` with `state` and decide which notifications fire.
///
/// A sold listing that is replaced by a cheaper one reports a single
/// `ListingSold`, never an extra `NewLowestPrice`.
pub fn detect(mut current: Vec<Ticket>, state: &PriceHistoryState) -> Detection {
    let mode = DetectionMode::for_snapshot(&current);
    if current.is_empty() {
        return Detection::quiet(mode, None, None);
    }

    // Ties keep the listing we already track in front so it stays "cheapest".
    let tracked = state.last_cheapest_id.as_deref();
    current.sort_by_key(|t| (t.price, !(tracked.is_some() && t.id.as_deref() == tracked)));
    let best = current[0].clone();

    let transition = classifier::classify(mode, &best, &current, state);
    debug!(
        mode = %mode,
        transition = %transition,
        best_price = best.price,
        lowest_price = state.lowest_price,
        "[DETECTOR] classified snapshot of {} tickets",
        current.len(),
    );

    let event = match transition {
        Transition::FirstObservation | Transition::NewLow => {
            info!(
                price = best.price,
                previous = state.lowest_price,
                category = %best.category,
                "[DETECTOR] new lowest price"
            );
            Some(NotificationEvent::NewLowestPrice {
                price: best.price,
                category: best.category.clone(),
                link: best.link.clone(),
            })
        }
        Transition::Sold | Transition::PriceRose => {
            info!(
                old_price = state.lowest_price,
                new_price = best.price,
                category = %best.category,
                mode = %mode,
                "[DETECTOR] previous cheapest listing sold"
            );
            Some(NotificationEvent::ListingSold {
                old_price: state.lowest_price,
                new_price: best.price,
                category: best.category.clone(),
                link: best.link.clone(),
            })
        }
        Transition::Inconsistent => {
            info!(
                lowest_price = state.lowest_price,
                best_price = best.price,
                "[DETECTOR] tracked listing still present below computed best; ignoring"
            );
            None
        }
        Transition::IdentityLearned | Transition::IdentityChanged => {
            debug!(
                id = best.id.as_deref().unwrap_or("-"),
                price = best.price,
                "[DETECTOR] cheapest listing identity updated"
            );
            None
        }
        Transition::Unchanged => None,
    };

    if !transition.updates_state() {
        return Detection::quiet(mode, Some(transition), Some(best));
    }

    let new_state = PriceHistoryState {
        schema_version: STATE_SCHEMA_VERSION,
        lowest_price: best.price,
        lowest_category: Some(best.category.clone()),
        last_cheapest_id: best.id.clone(),
    };

    Detection {
        mode,
        transition: Some(transition),
        best: Some(best),
        events: event.into_iter().collect(),
        new_state: Some(new_state),
    }
}
