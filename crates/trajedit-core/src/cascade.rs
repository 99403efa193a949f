//! Step edits that keep every echo of the step consistent.
//!
//! Both operations are pure: they validate against the input document, then
//! mutate and return a private copy. A failed call never yields a partially
//! edited document.

use serde_json::Value;
use tracing::debug;

use crate::counters;
use crate::document::{self, Dialect, TRAJECTORY_KEY};
use crate::error::{EngineError, Result};
use crate::index::{MessagePair, StepNumber};
use crate::projection::echo_sites;

/// Remove one step's `(assistant, tool)` pair from a flattened message array.
///
/// The tool message goes first: removing the assistant first would shift the
/// tool message down onto the assistant's slot. Missing positions are
/// skipped. Returns the number of messages removed.
pub fn remove_pair(messages: &mut Vec<Value>, pair: MessagePair) -> usize {
    let mut removed = 0;
    if pair.tool < messages.len() {
        messages.remove(pair.tool);
        removed += 1;
    }
    if pair.assistant < messages.len() {
        messages.remove(pair.assistant);
        removed += 1;
    }
    removed
}

/// Set the thought of step `step_number` to `new_thought` everywhere the
/// step's assistant message appears.
///
/// When `expected_old_thought` is given it must match the current thought
/// (line endings normalized) or the edit is refused with
/// [`EngineError::StaleEdit`].
pub fn replace_thought(
    doc: &Value,
    step_number: i64,
    expected_old_thought: Option<&str>,
    new_thought: &str,
) -> Result<Value> {
    let dialect = document::classify(doc)?;
    let steps = document::step_count(doc, dialect);
    let step = StepNumber::new(step_number, steps)?;
    let pair = step.messages();

    let canonical = match dialect {
        Dialect::HistoryOnly => document::history(doc).get(pair.assistant),
        Dialect::TrajectoryWithHistory => document::trajectory(doc).get(step.trajectory_index()),
    }
    .ok_or(EngineError::OutOfRange {
        step: step_number,
        steps,
    })?;

    if !canonical.is_object() {
        return Err(EngineError::malformed(format!(
            "record for step {step} is not an object"
        )));
    }

    if let Some(expected) = expected_old_thought {
        let current = document::thought_text(canonical);
        if normalize_newlines(expected) != normalize_newlines(current) {
            debug!(step = step.get(), "Refusing stale thought edit");
            return Err(EngineError::StaleEdit { step: step_number });
        }
    }

    let mut updated = doc.clone();
    let root = document::root_mut(&mut updated)?;

    if dialect == Dialect::TrajectoryWithHistory {
        let record = document::array_mut(root, TRAJECTORY_KEY)
            .and_then(|steps| steps.get_mut(step.trajectory_index()))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| EngineError::malformed("trajectory changed while editing"))?;
        record.insert("thought".to_string(), Value::from(new_thought));
        record.insert("response".to_string(), Value::from(new_thought));
    }

    let later = step.get()..steps;
    let mut echoes = 0;
    for site in echo_sites(dialect, later) {
        let Some(messages) = site.resolve(root) else {
            continue;
        };
        if let Some(message) = messages
            .get_mut(pair.assistant)
            .and_then(Value::as_object_mut)
        {
            message.insert("thought".to_string(), Value::from(new_thought));
            message.insert("content".to_string(), Value::from(new_thought));
            echoes += 1;
        }
    }

    debug!(
        step = step.get(),
        dialect = dialect.as_str(),
        echoes,
        "Replaced step thought"
    );
    Ok(updated)
}

/// Delete step `step_number`: its trajectory record, its history pair, and
/// its echo in every later step's query snapshot. The round-trip counter is
/// reconciled afterwards.
pub fn remove_step(doc: &Value, step_number: i64) -> Result<Value> {
    let dialect = document::classify(doc)?;
    let steps = document::step_count(doc, dialect);
    let step = StepNumber::new(step_number, steps)?;
    let pair = step.messages();

    let in_range = match dialect {
        Dialect::HistoryOnly => pair.assistant < document::history(doc).len(),
        Dialect::TrajectoryWithHistory => step.trajectory_index() < steps,
    };
    if !in_range {
        return Err(EngineError::OutOfRange {
            step: step_number,
            steps,
        });
    }

    let mut updated = doc.clone();
    let root = document::root_mut(&mut updated)?;

    let remaining = match dialect {
        Dialect::HistoryOnly => 0,
        Dialect::TrajectoryWithHistory => {
            let trajectory = document::array_mut(root, TRAJECTORY_KEY)
                .ok_or_else(|| EngineError::malformed("trajectory changed while editing"))?;
            trajectory.remove(step.trajectory_index());
            trajectory.len()
        }
    };

    let later = step.trajectory_index()..remaining;
    let mut removed = 0;
    for site in echo_sites(dialect, later) {
        if let Some(messages) = site.resolve(root) {
            removed += remove_pair(messages, pair);
        }
    }

    let api_calls = match dialect {
        Dialect::HistoryOnly => None,
        Dialect::TrajectoryWithHistory => counters::reconcile_after_removal(&mut updated),
    };

    debug!(
        step = step.get(),
        dialect = dialect.as_str(),
        removed_messages = removed,
        ?api_calls,
        "Removed step"
    );
    Ok(updated)
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}
