//! Aggregate statistics kept in `info.model_stats`.

use serde_json::Value;

use crate::document::INFO_KEY;

const MODEL_STATS_KEY: &str = "model_stats";
const API_CALLS_KEY: &str = "api_calls";

/// Current round-trip counter, if the document carries a numeric one.
pub fn api_calls(doc: &Value) -> Option<i64> {
    let value = doc.get(INFO_KEY)?.get(MODEL_STATS_KEY)?.get(API_CALLS_KEY)?;
    value
        .as_i64()
        .or_else(|| value.as_u64().map(|v| i64::try_from(v).unwrap_or(i64::MAX)))
        .or_else(|| value.as_f64().map(|v| v as i64))
}

/// Account for one removed assistant/tool pair: `api_calls = max(0, api_calls - 1)`.
///
/// The counter is written as an absolute value. Documents without a numeric
/// counter are left alone. Returns the value written.
pub fn reconcile_after_removal(doc: &mut Value) -> Option<i64> {
    let current = api_calls(doc)?;
    let next = current.saturating_sub(1).max(0);
    let slot = doc
        .get_mut(INFO_KEY)?
        .get_mut(MODEL_STATS_KEY)?
        .get_mut(API_CALLS_KEY)?;
    *slot = Value::from(next);
    Some(next)
}
