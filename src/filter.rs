use serde_json::Value;
use tracing::debug;

use crate::config::{CategoryMatch, FilterConfig};
use crate::types::{RawRecord, Ticket};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub rejected_category: usize,
    pub rejected_price: usize,
    pub kept: usize,
}

enum Rejection {
    Category,
    Price,
}

/// Map raw backend records to tickets in the target categories.
/// Keeps the input order of accepted records.
pub fn normalize(records: &[RawRecord], cfg: &FilterConfig) -> (Vec<Ticket>, FilterStats) {
    let mut tickets = Vec::with_capacity(records.len());
    let mut stats = FilterStats {
        total: records.len(),
        ..FilterStats::default()
    };

    for record in records {
        match normalize_record(record, cfg) {
            Ok(ticket) => {
                debug!(
                    category = %ticket.category,
                    price = ticket.price,
                    id = ticket.id.as_deref().unwrap_or("-"),
                    "[FILTER] kept"
                );
                tickets.push(ticket);
            }
            Err(Rejection::Category) => stats.rejected_category += 1,
            Err(Rejection::Price) => stats.rejected_price += 1,
        }
    }

    stats.kept = tickets.len();
    (tickets, stats)
}

fn normalize_record(record: &RawRecord, cfg: &FilterConfig) -> Result<Ticket, Rejection> {
    let name = record
        .get(&cfg.category_field)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    let category = match_category(name, &cfg.target_categories, cfg.category_match)
        .ok_or(Rejection::Category)?;

    let base = record
        .get(&cfg.price_field)
        .and_then(parse_price)
        .ok_or(Rejection::Price)?;
    let price = apply_markup(base, cfg.fee_multiplier);
    if price == 0 {
        return Err(Rejection::Price);
    }

    let id = record.get(&cfg.id_field).and_then(value_to_id);

    let slug = record
        .get(&cfg.slug_field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let link = match (slug, &cfg.listing_base_url) {
        (Some(slug), Some(base)) => Some(format!("{base}/{slug}")),
        _ => cfg.event_url.clone(),
    };

    Ok(Ticket {
        id,
        category,
        price,
        link,
    })
}

/// Returns the category the ticket is reported under, or None if it is not a target.
pub fn match_category(name: &str, targets: &[String], mode: CategoryMatch) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    match mode {
        CategoryMatch::Exact => targets.iter().find(|t| t.as_str() == name).cloned(),
        CategoryMatch::Contains => {
            let lower = name.to_lowercase();
            targets
                .iter()
                .find(|t| lower.contains(&t.to_lowercase()))
                .cloned()
        }
    }
}

/// Accepts a JSON number or a display string such as `"R$ 1.250"`.
/// Strings keep their digits only, matching how the platform renders whole amounts.
pub fn parse_price(v: &Value) -> Option<f64> {
    let price = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return None;
            }
            digits.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}

/// `ceil(base * multiplier)`; rounds off float noise first so 100 * 1.1 stays 110.
pub fn apply_markup(base: f64, multiplier: f64) -> u64 {
    let raw = base * multiplier;
    let snapped = (raw * 1e6).round() / 1e6;
    snapped.ceil().max(0.0) as u64
}

fn value_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
