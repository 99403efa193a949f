//! Regex find/replace over a document's `history`.
//!
//! Patterns are compiled with `.` matching newlines. Reviewers type newlines
//! as the two-character sequences `\n` / `\r` / `\r\n`; the regex engine
//! already reads those as the control characters stored in the parsed
//! document, so patterns are compiled as typed (this keeps `(?x)` patterns
//! intact). The replacement is inserted literally, so its escape pairs are
//! turned into control characters here. An escaped backslash (`\\`) is kept.

use std::borrow::Cow;

use regex::{NoExpand, Regex, RegexBuilder};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{self, Dialect, HISTORY_KEY};
use crate::error::{EngineError, Result};

/// Result of a bulk replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    /// `{ history }` for history-only documents, otherwise the whole document
    /// with its `history` rewritten.
    pub document: Value,
    /// Total substitutions made.
    pub replacements: usize,
}

/// Turn literal `\n` / `\r` escape pairs into control characters.
pub fn normalize_escapes(input: &str) -> Cow<'_, str> {
    if !input.contains('\\') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('r') => {
                chars.next();
                out.push('\r');
            }
            Some(other) => {
                chars.next();
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

/// Compile a reviewer-supplied search pattern.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .build()?)
}

/// Replace every match of `pattern` in every string under `history`.
///
/// Fails with [`EngineError::NoMatch`] when nothing matched, so callers never
/// mistake an unchanged document for a successful edit.
pub fn bulk_replace(doc: &Value, pattern: &str, replacement: &str) -> Result<Rewrite> {
    let dialect = document::classify(doc)?;
    let regex = compile_pattern(pattern)?;
    let replacement = normalize_escapes(replacement);

    let mut history = Value::Array(document::history(doc).to_vec());
    let replacements = rewrite_strings(&mut history, &regex, &replacement);
    if replacements == 0 {
        return Err(EngineError::NoMatch {
            pattern: pattern.to_string(),
        });
    }

    let document = match dialect {
        Dialect::HistoryOnly => {
            let mut root = Map::new();
            root.insert(HISTORY_KEY.to_string(), history);
            Value::Object(root)
        }
        Dialect::TrajectoryWithHistory => {
            let mut updated = doc.clone();
            document::root_mut(&mut updated)?.insert(HISTORY_KEY.to_string(), history);
            updated
        }
    };

    debug!(
        dialect = dialect.as_str(),
        replacements, "Bulk replaced history text"
    );
    Ok(Rewrite {
        document,
        replacements,
    })
}

/// Rewrite every string reachable from `value`. Object keys are not touched.
fn rewrite_strings(value: &mut Value, regex: &Regex, replacement: &str) -> usize {
    match value {
        Value::String(text) => {
            let count = regex.find_iter(text).count();
            if count > 0 {
                let rewritten = regex.replace_all(text, NoExpand(replacement)).into_owned();
                *text = rewritten;
            }
            count
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| rewrite_strings(item, regex, replacement))
            .sum(),
        Value::Object(map) => map
            .values_mut()
            .map(|item| rewrite_strings(item, regex, replacement))
            .sum(),
        _ => 0,
    }
}
