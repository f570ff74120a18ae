use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::config::{SENTINEL_LOWEST_PRICE, STATE_SCHEMA_VERSION};
use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// PriceHistoryState
// ---------------------------------------------------------------------------

/// The record carried between runs. Every field defaults on its own so an older
/// or partially written file still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(
        default = "default_lowest_price",
        deserialize_with = "deserialize_price"
    )]
    pub lowest_price: u64,
    #[serde(default, alias = "last_type")]
    pub lowest_category: Option<String>,
    #[serde(default)]
    pub last_cheapest_id: Option<String>,
}

impl Default for PriceHistoryState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            lowest_price: SENTINEL_LOWEST_PRICE,
            lowest_category: None,
            last_cheapest_id: None,
        }
    }
}

impl PriceHistoryState {
    /// True while no price has ever been confirmed.
    pub fn is_sentinel(&self) -> bool {
        self.lowest_price >= SENTINEL_LOWEST_PRICE && self.last_cheapest_id.is_none()
    }
}

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

fn default_lowest_price() -> u64 {
    SENTINEL_LOWEST_PRICE
}

/// Older writers stored prices as floats (`250.0`). Anything that is not a
/// usable non-negative number falls back to the sentinel.
fn deserialize_price<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(v.as_u64()
        .or_else(|| {
            v.as_f64()
                .filter(|p| p.is_finite() && *p >= 0.0)
                .map(|p| p.round() as u64)
        })
        .unwrap_or(SENTINEL_LOWEST_PRICE))
}

// ---------------------------------------------------------------------------
// PriceHistoryStore
// ---------------------------------------------------------------------------

/// JSON file holding a single `PriceHistoryState`.
pub struct PriceHistoryStore {
    path: PathBuf,
}

impl PriceHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Never fails: a missing, unreadable or corrupt file yields the sentinel default.
    pub fn load(&self) -> PriceHistoryState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("[STORE] no price history at {}, starting fresh", self.path.display());
                return PriceHistoryState::default();
            }
            Err(e) => {
                warn!("[STORE] cannot read {}: {e}; starting fresh", self.path.display());
                return PriceHistoryState::default();
            }
        };

        let parsed = serde_json::from_str::<serde_json::Value>(&contents).and_then(|v| {
            if v.is_object() {
                serde_json::from_value::<PriceHistoryState>(v)
            } else {
                Err(serde::de::Error::custom("price history is not a JSON object"))
            }
        });

        match parsed {
            Ok(state) => {
                if state.schema_version > STATE_SCHEMA_VERSION {
                    warn!(
                        "[STORE] {} has schema_version {} (newer than {}); reading known fields only",
                        self.path.display(),
                        state.schema_version,
                        STATE_SCHEMA_VERSION,
                    );
                }
                debug!(
                    lowest_price = state.lowest_price,
                    last_cheapest_id = state.last_cheapest_id.as_deref().unwrap_or("-"),
                    "[STORE] loaded"
                );
                state
            }
            Err(e) => {
                warn!("[STORE] corrupt price history at {}: {e}; starting fresh", self.path.display());
                PriceHistoryState::default()
            }
        }
    }

    /// Writes to a sibling temp file and renames it over the target.
    pub fn save(&self, state: &PriceHistoryState) -> Result<()> {
        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.tmp_path();

        let persist_err = |source: std::io::Error| AppError::Persist {
            path: self.path.display().to_string(),
            source,
        };

        fs::write(&tmp, body).map_err(persist_err)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(persist_err(e));
        }

        debug!(lowest_price = state.lowest_price, "[STORE] saved {}", self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "price_history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn temp_path(tag: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "ticket-watcher-{}-{tag}-{n}.json",
            std::process::id()
        ))
    }

    #[test]
    fn missing_file_loads_sentinel() {
        let store = PriceHistoryStore::new(temp_path("missing"));
        let state = store.load();
        assert_eq!(state, PriceHistoryState::default());
        assert_eq!(state.lowest_price, SENTINEL_LOWEST_PRICE);
        assert!(state.is_sentinel());
    }

    #[test]
    fn corrupt_file_loads_sentinel() {
        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        let state = PriceHistoryStore::new(&path).load();
        assert_eq!(state, PriceHistoryState::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn non_object_document_loads_sentinel() {
        let path = temp_path("array");
        fs::write(&path, "[1, 2, 3]").unwrap();
        let state = PriceHistoryStore::new(&path).load();
        assert_eq!(state, PriceHistoryState::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn legacy_record_is_read_field_by_field() {
        let path = temp_path("legacy");
        fs::write(&path, r#"{"lowest_price": 250.0, "last_type": "Inteira", "extra": true}"#).unwrap();

        let state = PriceHistoryStore::new(&path).load();

        assert_eq!(state.schema_version, STATE_SCHEMA_VERSION);
        assert_eq!(state.lowest_price, 250);
        assert_eq!(state.lowest_category.as_deref(), Some("Inteira"));
        assert_eq!(state.last_cheapest_id, None);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_price_defaults_individually() {
        let path = temp_path("noprice");
        fs::write(&path, r#"{"last_cheapest_id": "a"}"#).unwrap();
        let state = PriceHistoryStore::new(&path).load();
        assert_eq!(state.lowest_price, SENTINEL_LOWEST_PRICE);
        assert_eq!(state.last_cheapest_id.as_deref(), Some("a"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn save_then_load_is_a_fixed_point() {
        let path = temp_path("roundtrip");
        let store = PriceHistoryStore::new(&path);
        let state = PriceHistoryState {
            lowest_price: 250,
            lowest_category: Some("Meia Estudante".to_string()),
            last_cheapest_id: Some("a".to_string()),
            ..PriceHistoryState::default()
        };

        store.save(&state).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, state);

        store.save(&loaded).unwrap();
        assert_eq!(store.load(), state);
        assert!(!store.tmp_path().exists());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn save_into_missing_directory_is_surfaced() {
        let path = std::env::temp_dir()
            .join(format!("ticket-watcher-no-such-dir-{}", std::process::id()))
            .join("history.json");
        let err = PriceHistoryStore::new(path)
            .save(&PriceHistoryState::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Persist { .. }));
    }
}
