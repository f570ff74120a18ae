use serde::{Deserialize, Serialize};

/// One backend record: field name → value, exactly as the search endpoint returned it.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A purchasable listing observed in a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Stable listing identifier. Sold detection needs it.
    pub id: Option<String>,
    pub category: String,
    /// All-in price in whole currency units, fee markup included.
    pub price: u64,
    pub link: Option<String>,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Which strategy the detector used for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Every ticket carries an id: sold transitions are detected by absence.
    IdentityTracking,
    /// Some ticket lacks an id. A tracked listing that is still listed is
    /// honoured; otherwise a price rise is read as the previous cheapest
    /// listing having sold.
    IdentityTrackingUnavailable,
}

impl DetectionMode {
    pub fn for_snapshot(tickets: &[Ticket]) -> Self {
        if !tickets.is_empty() && tickets.iter().all(|t| t.id.is_some()) {
            DetectionMode::IdentityTracking
        } else {
            DetectionMode::IdentityTrackingUnavailable
        }
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DetectionMode::IdentityTracking => "identity_tracking",
            DetectionMode::IdentityTrackingUnavailable => "identity_tracking_unavailable",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Notification events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    NewLowestPrice {
        price: u64,
        category: String,
        link: Option<String>,
    },
    /// The previously cheapest listing is gone. `category`/`link` describe the
    /// listing that is now cheapest.
    ListingSold {
        old_price: u64,
        new_price: u64,
        category: String,
        link: Option<String>,
    },
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationEvent::NewLowestPrice { price, category, .. } => {
                write!(f, "new_lowest_price({category} @ {price})")
            }
            NotificationEvent::ListingSold { old_price, new_price, category, .. } => {
                write!(f, "listing_sold({old_price} -> {category} @ {new_price})")
            }
        }
    }
}
