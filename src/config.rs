use std::collections::HashMap;

use crate::error::{AppError, Result};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Stored as `lowest_price` when no history exists. Any real listing is cheaper.
pub const SENTINEL_LOWEST_PRICE: u64 = 1_000_000;

/// Current on-disk layout of the price history record.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Timeout for the replayed search request (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Timeout for a single notification delivery (seconds).
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Default backend field names (Bubble-style `<name>_<type>` keys).
pub mod fields {
    pub const CATEGORY: &str = "categoria_text";
    pub const PRICE: &str = "preco_number";
    pub const ID: &str = "_id";
    pub const SLUG: &str = "Slug";
}

/// How record categories are compared with the configured targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMatch {
    /// Record category must equal one of the targets.
    Exact,
    /// Record display name contains one of the targets, case-insensitive.
    Contains,
}

impl std::str::FromStr for CategoryMatch {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(CategoryMatch::Exact),
            "contains" => Ok(CategoryMatch::Contains),
            other => Err(AppError::Config(format!(
                "CATEGORY_MATCH must be 'exact' or 'contains', got '{other}'"
            ))),
        }
    }
}

/// Where the raw snapshot comes from.
#[derive(Debug, Clone)]
pub enum SnapshotSource {
    /// Replay a captured search request against the backend.
    Http {
        url: String,
        method: String,
        payload: Option<serde_json::Value>,
        headers: HashMap<String, String>,
    },
    /// Read a stored backend response from disk.
    File(String),
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub target_categories: Vec<String>,
    pub category_match: CategoryMatch,
    /// Platform fee markup applied to the backend's base price.
    pub fee_multiplier: f64,
    pub category_field: String,
    pub price_field: String,
    pub id_field: String,
    pub slug_field: String,
    /// Listing deep links are `{listing_base_url}/{slug}` when set.
    pub listing_base_url: Option<String>,
    /// Fallback link when a record carries no slug.
    pub event_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Price history file (STATE_PATH)
    pub state_path: String,
    pub source: SnapshotSource,
    pub filter: FilterConfig,
    /// None when TELEGRAM_TOKEN or CHAT_ID is missing; alerts are then only logged.
    pub telegram: Option<TelegramConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let target_categories: Vec<String> = var("TARGET_CATEGORIES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if target_categories.is_empty() {
            return Err(AppError::Config(
                "TARGET_CATEGORIES must list at least one category".to_string(),
            ));
        }

        let category_match = match var("CATEGORY_MATCH") {
            Some(s) => s.parse::<CategoryMatch>()?,
            None => CategoryMatch::Exact,
        };

        let fee_multiplier = match var("FEE_MULTIPLIER") {
            Some(s) => s
                .parse::<f64>()
                .ok()
                .filter(|m| m.is_finite() && *m > 0.0)
                .ok_or_else(|| {
                    AppError::Config("FEE_MULTIPLIER must be a positive number".to_string())
                })?,
            None => 1.0,
        };

        let source = if let Some(path) = var("SNAPSHOT_FILE") {
            SnapshotSource::File(path)
        } else if let Some(url) = var("SEARCH_URL") {
            let payload = match var("SEARCH_PAYLOAD") {
                Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                    AppError::Config(format!("SEARCH_PAYLOAD is not valid JSON: {e}"))
                })?),
                None => None,
            };
            let headers = match var("SEARCH_HEADERS") {
                Some(raw) => serde_json::from_str::<HashMap<String, String>>(&raw).map_err(|e| {
                    AppError::Config(format!(
                        "SEARCH_HEADERS must be a JSON object of strings: {e}"
                    ))
                })?,
                None => HashMap::new(),
            };
            SnapshotSource::Http {
                url,
                method: var("SEARCH_METHOD")
                    .map(|m| m.to_uppercase())
                    .unwrap_or_else(|| "POST".to_string()),
                payload,
                headers,
            }
        } else {
            return Err(AppError::Config(
                "either SNAPSHOT_FILE or SEARCH_URL must be set".to_string(),
            ));
        };

        let telegram = match (var("TELEGRAM_TOKEN"), var("CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                api_url: var("TELEGRAM_API_URL").unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
                token,
                chat_id,
            }),
            _ => None,
        };

        Ok(Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            state_path: var("STATE_PATH").unwrap_or_else(|| "price_history.json".to_string()),
            source,
            filter: FilterConfig {
                target_categories,
                category_match,
                fee_multiplier,
                category_field: var("CATEGORY_FIELD").unwrap_or_else(|| fields::CATEGORY.to_string()),
                price_field: var("PRICE_FIELD").unwrap_or_else(|| fields::PRICE.to_string()),
                id_field: var("ID_FIELD").unwrap_or_else(|| fields::ID.to_string()),
                slug_field: var("SLUG_FIELD").unwrap_or_else(|| fields::SLUG.to_string()),
                listing_base_url: var("LISTING_BASE_URL")
                    .map(|u| u.trim_end_matches('/').to_string()),
                event_url: var("EVENT_URL"),
            },
            telegram,
        })
    }
}
