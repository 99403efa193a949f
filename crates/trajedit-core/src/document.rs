//! Typed view over trajectory documents.
//!
//! Two document shapes are in circulation:
//!
//! - history-only: `{ "history": [...] }`, where `history[0]` is the system
//!   message, `history[1]` the initial instruction (step 0) and every later
//!   step occupies an `(assistant, tool)` pair.
//! - trajectory+history: `{ "trajectory": [...], "history": [...], "info": {...} }`,
//!   where each `trajectory[i]` is a step record carrying its own `query`
//!   snapshot of the history the model saw at that point.
//!
//! The shape is resolved once per call with [`classify`] and every operation
//! matches on the resulting [`Dialect`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

pub const HISTORY_KEY: &str = "history";
pub const TRAJECTORY_KEY: &str = "trajectory";
pub const INFO_KEY: &str = "info";

/// Messages preceding step 1 in every flattened history (system + step 0).
pub const PREAMBLE_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `{ history }` only.
    HistoryOnly,
    /// `{ trajectory, history, info, ... }`.
    TrajectoryWithHistory,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::HistoryOnly => "history_only",
            Dialect::TrajectoryWithHistory => "trajectory_with_history",
        }
    }
}

/// Determine which dialect `doc` is written in.
pub fn classify(doc: &Value) -> Result<Dialect> {
    let root = doc.as_object().ok_or(EngineError::UnsupportedFormat)?;

    match root.get(HISTORY_KEY) {
        None => return Err(EngineError::UnsupportedFormat),
        Some(Value::Array(_)) => {}
        Some(_) => return Err(EngineError::malformed("`history` must be an array")),
    }

    match root.get(TRAJECTORY_KEY) {
        None | Some(Value::Null) => Ok(Dialect::HistoryOnly),
        Some(Value::Array(_)) => Ok(Dialect::TrajectoryWithHistory),
        Some(_) => Err(EngineError::malformed("`trajectory` must be an array")),
    }
}

/// Plain text of a message `content` value.
///
/// Strings are returned as-is; a list yields the `text` of its first element
/// (the legacy `[{ "type": "text", "text": ... }]` form). Anything else is
/// empty.
pub fn extract_text(content: &Value) -> &str {
    match content {
        Value::String(text) => text.as_str(),
        Value::Array(items) => items
            .first()
            .and_then(|first| first.get("text"))
            .and_then(Value::as_str)
            .unwrap_or(""),
        _ => "",
    }
}

/// The global `history` array. Only valid after [`classify`] succeeded.
pub(crate) fn history(doc: &Value) -> &[Value] {
    doc.get(HISTORY_KEY)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub(crate) fn trajectory(doc: &Value) -> &[Value] {
    doc.get(TRAJECTORY_KEY)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub(crate) fn root_mut(doc: &mut Value) -> Result<&mut Map<String, Value>> {
    doc.as_object_mut().ok_or(EngineError::UnsupportedFormat)
}

pub(crate) fn array_mut<'a>(
    root: &'a mut Map<String, Value>,
    key: &str,
) -> Option<&'a mut Vec<Value>> {
    root.get_mut(key).and_then(Value::as_array_mut)
}

/// Number of steps (excluding step 0) the document records.
///
/// For history-only documents a trailing assistant message without its tool
/// reply still counts as a step.
pub fn step_count(doc: &Value, dialect: Dialect) -> usize {
    match dialect {
        Dialect::HistoryOnly => history(doc).len().saturating_sub(PREAMBLE_LEN).div_ceil(2),
        Dialect::TrajectoryWithHistory => trajectory(doc).len(),
    }
}

/// Thought text of an assistant message or step record.
pub fn thought_text(record: &Value) -> &str {
    record.get("thought").map(extract_text).unwrap_or("")
}
