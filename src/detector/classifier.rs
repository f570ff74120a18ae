use crate::state::PriceHistoryState;
use crate::types::{DetectionMode, Ticket};

/// How the cheapest listing moved relative to the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same price, same listing (or no identity to compare).
    Unchanged,
    /// No history yet: the first confirmed price.
    FirstObservation,
    /// Strictly below the recorded lowest price.
    NewLow,
    /// The tracked listing is absent from the snapshot.
    Sold,
    /// Price went up and the listing cannot be tracked by id; read as sold.
    PriceRose,
    /// Same price, but the cheapest listing's id was not known before.
    IdentityLearned,
    /// Same price, held by a different listing than the tracked one.
    IdentityChanged,
    /// Price above the recorded lowest while the tracked listing is still
    /// listed. Ignored so the lowest price never drifts upward.
    Inconsistent,
}

impl Transition {
    /// Transitions that overwrite the stored history.
    pub fn updates_state(self) -> bool {
        !matches!(self, Transition::Unchanged | Transition::Inconsistent)
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Transition::Unchanged => "unchanged",
            Transition::FirstObservation => "first_observation",
            Transition::NewLow => "new_low",
            Transition::Sold => "sold",
            Transition::PriceRose => "price_rose",
            Transition::IdentityLearned => "identity_learned",
            Transition::IdentityChanged => "identity_changed",
            Transition::Inconsistent => "inconsistent",
        };
        write!(f, "{s}")
    }
}

/// Classify the snapshot's cheapest ticket against the stored history.
/// `best` must be the minimum of `current`.
///
/// A tracked id that is still listed is honoured in both modes. Its absence
/// only counts as a sale when every ticket carries an id; otherwise the
/// listing may be hiding among the anonymous ones and price movement decides.
pub fn classify(
    mode: DetectionMode,
    best: &Ticket,
    current: &[Ticket],
    state: &PriceHistoryState,
) -> Transition {
    if state.is_sentinel() {
        return if best.price < state.lowest_price {
            Transition::FirstObservation
        } else {
            Transition::Unchanged
        };
    }

    let tracked = state.last_cheapest_id.as_deref();
    let tracked_listed = tracked.map(|id| current.iter().any(|t| t.id.as_deref() == Some(id)));

    match tracked_listed {
        Some(true) => {
            if best.price < state.lowest_price {
                Transition::NewLow
            } else if best.price > state.lowest_price {
                Transition::Inconsistent
            } else if best.id.as_deref() != tracked {
                Transition::IdentityChanged
            } else {
                Transition::Unchanged
            }
        }
        Some(false) if mode == DetectionMode::IdentityTracking => Transition::Sold,
        _ => {
            if best.price < state.lowest_price {
                Transition::NewLow
            } else if best.price > state.lowest_price {
                Transition::PriceRose
            } else if mode == DetectionMode::IdentityTracking && tracked.is_none() {
                Transition::IdentityLearned
            } else {
                Transition::Unchanged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(id: Option<&str>, price: u64) -> Ticket {
        Ticket {
            id: id.map(str::to_string),
            category: "Inteira".to_string(),
            price,
            link: None,
        }
    }

    fn state(price: u64, id: Option<&str>) -> PriceHistoryState {
        PriceHistoryState {
            lowest_price: price,
            last_cheapest_id: id.map(str::to_string),
            ..PriceHistoryState::default()
        }
    }

    #[test]
    fn sentinel_is_first_observation() {
        let t = ticket(Some("a"), 250);
        let got = classify(DetectionMode::IdentityTracking, &t, &[t.clone()], &PriceHistoryState::default());
        assert_eq!(got, Transition::FirstObservation);
    }

    #[test]
    fn tracked_listing_absent_is_sold_even_if_cheaper() {
        let t = ticket(Some("b"), 100);
        let got = classify(DetectionMode::IdentityTracking, &t, &[t.clone()], &state(250, Some("a")));
        assert_eq!(got, Transition::Sold);
    }

    #[test]
    fn tracked_listing_present_and_price_above_is_inconsistent() {
        let cur = [ticket(Some("c"), 300), ticket(Some("a"), 320)];
        let got = classify(DetectionMode::IdentityTracking, &cur[0], &cur, &state(250, Some("a")));
        assert_eq!(got, Transition::Inconsistent);
        assert!(!got.updates_state());
    }

    #[test]
    fn equal_price_without_tracked_id_learns_identity() {
        let t = ticket(Some("a"), 250);
        let got = classify(DetectionMode::IdentityTracking, &t, &[t.clone()], &state(250, None));
        assert_eq!(got, Transition::IdentityLearned);
        assert!(got.updates_state());
    }

    #[test]
    fn degraded_mode_without_tracked_listing_uses_price() {
        let t = ticket(None, 300);
        let got = classify(
            DetectionMode::IdentityTrackingUnavailable,
            &t,
            &[t.clone()],
            &state(250, Some("a")),
        );
        assert_eq!(got, Transition::PriceRose);

        let same = ticket(None, 250);
        let got = classify(
            DetectionMode::IdentityTrackingUnavailable,
            &same,
            &[same.clone()],
            &state(250, Some("a")),
        );
        assert_eq!(got, Transition::Unchanged);
    }

    #[test]
    fn sentinel_price_is_not_below_itself() {
        let t = ticket(Some("a"), 2_000_000);
        let got = classify(DetectionMode::IdentityTracking, &t, &[t.clone()], &PriceHistoryState::default());
        assert_eq!(got, Transition::Unchanged);
        assert!(!got.updates_state());
    }

    #[test]
    fn equal_price_on_another_listing_changes_identity() {
        let cur = [ticket(Some("c"), 250), ticket(Some("a"), 260)];
        let got = classify(DetectionMode::IdentityTracking, &cur[0], &cur, &state(250, Some("a")));
        assert_eq!(got, Transition::IdentityChanged);
        assert!(got.updates_state());
    }

    #[test]
    fn tracked_listing_present_in_mixed_snapshot_is_honoured() {
        let cur = [ticket(None, 300), ticket(Some("a"), 320)];
        let got = classify(
            DetectionMode::IdentityTrackingUnavailable,
            &cur[0],
            &cur,
            &state(250, Some("a")),
        );
        assert_eq!(got, Transition::Inconsistent);
    }

    #[test]
    fn tracked_listing_absent_from_mixed_snapshot_falls_back_to_price() {
        let cur = [ticket(None, 300), ticket(Some("b"), 320)];
        let got = classify(
            DetectionMode::IdentityTrackingUnavailable,
            &cur[0],
            &cur,
            &state(250, Some("a")),
        );
        assert_eq!(got, Transition::PriceRose);
    }
}
