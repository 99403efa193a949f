//! Conversion of reviewed steps into a parent-linked list of structured
//! interaction entries.
//!
//! Input is the step list a reviewer works with: an optional step zero
//! (`isStepZero`), plain steps (`thought` / `action` / `observation`) and
//! clustered steps that group several actions under one thought. Every step
//! carries its `originalIndex`. Shell-level actions recorded by the agent
//! (`str_replace_editor ...`, `submit`, arbitrary commands) are parsed into
//! named actions with structured inputs and outputs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::document::extract_text;
use crate::error::Result;
use crate::steps::project_steps;

const FILE_CONTENT_MARKER: &str = "=========FILE CONTENT=======";
const EMPTY_WORKSPACE: &str = "<workspace>\n</workspace>";
const ACTIONS_PLACEHOLDER: &str = "<actions>";
const DEFAULT_REPO: &str = "unknown/unknown";
const MISSING_OBSERVATION: &str = "No observation available";
const DIRECTORY_LISTING_MARKER: &str =
    "Here's the files and directories up to 2 levels deep in /testbed, excluding hidden items:";
const REVIEW_NOTE: &str =
    "\nReview the changes and make sure they are as expected. Edit the file again if necessary.\n";
const CLIPPED_NOTE: &str = "<response clipped><NOTE>To save on context only part of this file has been shown to you. You should retry this tool after you have searched inside the file with `grep -n` in order to find the line numbers of what you are looking for.</NOTE>\n<IMPORTANT><NOTE>The above file has been abbreviated. Please use `str_replace editor view` with `view_range` to look at relevant files in detail.</NOTE></IMPORTANT>";

static PROBLEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<pr_description>(.*?)</pr_description>").expect("valid problem regex")
});
static CREATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)str_replace_editor\s+create\s+(.+?)\s+--file_text\s+(.+)")
        .expect("valid create regex")
});
static STR_REPLACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)str_replace_editor\s+str_replace\s+(.+?)\s+--old_str\s+(.+?)\s+--new_str\s+(.+)")
        .expect("valid str_replace regex")
});
static VIEW_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^str_replace_editor\s+view\s+(.+?)\s+--view_range\s+(\d+)\s+(\d+)")
        .expect("valid view_range regex")
});
static VIEW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^str_replace_editor\s+view\s+(.+)").expect("valid view regex"));
static LINE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*(\d+)").expect("valid line number regex"));

/// A step as exported by the review UI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewedStep {
    pub original_index: i64,
    pub is_step_zero: bool,
    pub clustered: bool,
    pub repo: Option<String>,
    pub content: Value,
    pub thought: Option<Value>,
    pub summary: Option<Value>,
    pub action: Option<String>,
    pub observation: Option<String>,
    pub actions: Vec<String>,
    pub observations: Vec<String>,
}

/// One parsed action. Unparseable (empty) actions become a bare placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionItem {
    Placeholder(String),
    Action(ParsedAction),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedAction {
    pub name: &'static str,
    pub input: Value,
    pub output: Option<Value>,
    pub metadata: Value,
}

/// One entry of the converted trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: usize,
    pub parent: Option<usize>,
    pub actions: Vec<ActionItem>,
    pub thought: Value,
    pub metadata: Value,
}

impl ActionItem {
    fn action(name: &'static str, input: Value, output: Option<Value>) -> Self {
        ActionItem::Action(ParsedAction {
            name,
            input,
            output,
            metadata: json!({}),
        })
    }

    fn workspace(&self) -> Option<&str> {
        match self {
            ActionItem::Action(action) => action.output.as_ref()?.get("workspace")?.as_str(),
            ActionItem::Placeholder(_) => None,
        }
    }
}

/// Text between `<pr_description>` tags, trimmed.
pub fn extract_problem(content: &Value) -> Option<String> {
    let text = match content {
        Value::Object(map) => map.get("text").and_then(Value::as_str)?,
        other => extract_text(other),
    };
    PROBLEM_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

/// Wrap an observation into a workspace block, keeping everything from its
/// first newline on.
pub fn workspace_block(observation: &str, file_path: Option<&str>) -> String {
    let body = if observation.is_empty() {
        "\n".to_string()
    } else {
        match observation.find('\n') {
            Some(newline) => observation[newline..].to_string(),
            None => format!("\n{observation}"),
        }
    };
    format!(
        "<workspace>\n{}\n{FILE_CONTENT_MARKER}{body}\n{FILE_CONTENT_MARKER}\n</workspace>",
        file_path.unwrap_or("")
    )
}

/// Parse one recorded action (with its observation) into structured actions.
pub fn parse_action(action_text: &str, observation: &str) -> Vec<ActionItem> {
    if action_text.is_empty() {
        return vec![ActionItem::Placeholder(ACTIONS_PLACEHOLDER.to_string())];
    }
    let trimmed = action_text.trim();

    if trimmed == "submit" {
        return vec![ActionItem::action(
            "endInteraction",
            json!({ "answer": observation }),
            None,
        )];
    }

    if let Some(caps) = CREATE_RE.captures(trimmed) {
        let file_path = caps[1].trim();
        let file_content = caps[2].trim();
        return vec![ActionItem::action(
            "createFile",
            json!({ "file_path": file_path, "file_content": file_content }),
            Some(json!({
                "workspace": format!(
                    "<workspace>\n{file_path}\n{FILE_CONTENT_MARKER}\n{file_content}\n{FILE_CONTENT_MARKER}\n</workspace>"
                ),
            })),
        )];
    }

    if let Some(caps) = STR_REPLACE_RE.captures(trimmed) {
        let file_path = caps[1].trim();
        let line_numbers: Vec<i64> = LINE_NUMBER_RE
            .captures_iter(observation)
            .filter_map(|line| line[1].parse().ok())
            .collect();
        let start = line_numbers.iter().min().map(|line| line.saturating_add(4));
        let end = line_numbers.iter().max().map(|line| line.saturating_sub(4));
        let cleaned = if observation.contains(REVIEW_NOTE) {
            observation.replace(REVIEW_NOTE, "").trim_end().to_string()
        } else {
            observation.to_string()
        };
        return vec![ActionItem::action(
            "replaceCodeString",
            json!({
                "file_path": file_path,
                "find": caps[2].trim(),
                "replace": caps[3].trim(),
                "replace_start_line": start,
                "replace_end_line": end,
            }),
            Some(json!({ "workspace": workspace_block(&cleaned, Some(file_path)) })),
        )];
    }

    if let Some(caps) = VIEW_RANGE_RE.captures(trimmed) {
        let file_path = caps[1].trim();
        let start: u64 = caps[2].parse().unwrap_or_default();
        let end: u64 = caps[3].parse().unwrap_or_default();
        return vec![ActionItem::action(
            "selectCodeBlock",
            json!({ "file_path": file_path, "line_ranges": [[start, end]] }),
            Some(json!({ "workspace": workspace_block(observation, Some(file_path)) })),
        )];
    }

    if let Some(caps) = VIEW_RE.captures(trimmed) {
        let path = caps[1].trim();
        if let Some(marker) = observation.find(DIRECTORY_LISTING_MARKER) {
            let listing = observation[marker + DIRECTORY_LISTING_MARKER.len()..].trim();
            return vec![ActionItem::action(
                "executeCmd",
                json!({ "cmd": format!("find {path} -maxdepth 2 -not -path '*/\\.*'") }),
                Some(json!({ "stdout": listing })),
            )];
        }
        let cleaned = if observation.contains(CLIPPED_NOTE) {
            observation.replace(CLIPPED_NOTE, "").trim_end().to_string()
        } else {
            observation.to_string()
        };
        return vec![ActionItem::action(
            "openFile",
            json!({ "file_path": path }),
            Some(json!({ "workspace": workspace_block(&cleaned, Some(path)) })),
        )];
    }

    vec![ActionItem::action(
        "executeCmd",
        json!({ "cmd": action_text }),
        Some(json!({ "stdout": observation })),
    )]
}

/// Convert reviewed steps. Items that are not step objects are skipped.
pub fn convert_steps(items: &[Value]) -> Vec<Entry> {
    let steps: Vec<ReviewedStep> = items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| match ReviewedStep::deserialize(item) {
            Ok(step) => Some(step),
            Err(e) => {
                debug!("Skipping unreadable step: {}", e);
                None
            }
        })
        .collect();
    convert(&steps)
}

/// Convert a trajectory document by first projecting it into reviewed steps.
pub fn convert_document(doc: &Value) -> Result<Vec<Entry>> {
    let steps = project_steps(doc)?
        .into_iter()
        .map(|view| ReviewedStep {
            original_index: view.original_index as i64,
            is_step_zero: view.is_step_zero,
            content: view.content.map(Value::String).unwrap_or(Value::Null),
            thought: Some(Value::String(view.thought)),
            action: Some(view.action),
            observation: Some(view.observation),
            ..ReviewedStep::default()
        })
        .collect::<Vec<_>>();
    Ok(convert(&steps))
}

fn convert(steps: &[ReviewedStep]) -> Vec<Entry> {
    let step_zero = steps.iter().rev().find(|step| step.is_step_zero);
    let mut ordered: Vec<&ReviewedStep> = steps.iter().filter(|step| !step.is_step_zero).collect();
    ordered.sort_by_key(|step| step.original_index);

    let mut entries = Vec::with_capacity(ordered.len() + 1);
    let mut workspace = EMPTY_WORKSPACE.to_string();

    if let Some(zero) = step_zero {
        let patch = ordered
            .iter()
            .rev()
            .filter(|step| !step.clustered)
            .max_by_key(|step| step.original_index)
            .map(|step| step.observation.as_deref().unwrap_or(MISSING_OBSERVATION));

        entries.push(Entry {
            id: 0,
            parent: None,
            actions: vec![ActionItem::action(
                "beginInteraction",
                json!({}),
                Some(json!({
                    "user_prompt": zero.content,
                    "repo": zero.repo.as_deref().unwrap_or(DEFAULT_REPO),
                    "problem": extract_problem(&zero.content),
                })),
            )],
            thought: Value::Null,
            metadata: json!({ "patch": patch, "hints_text": "NA", "stage": "MAIN" }),
        });
    }

    for step in ordered {
        let id = entries.len();
        let (actions, thought) = if step.clustered {
            let actions: Vec<ActionItem> = step
                .actions
                .iter()
                .enumerate()
                .flat_map(|(i, action)| {
                    let observation = step.observations.get(i).map(String::as_str).unwrap_or("");
                    parse_action(action, observation)
                })
                .collect();
            if let Some(latest) = actions.iter().rev().find_map(ActionItem::workspace) {
                workspace = latest.to_string();
            }
            let thought = step
                .thought
                .clone()
                .or_else(|| step.summary.clone())
                .unwrap_or_else(|| Value::String(String::new()));
            (actions, thought)
        } else {
            let actions = parse_action(
                step.action.as_deref().unwrap_or(""),
                step.observation.as_deref().unwrap_or(""),
            );
            if let Some(first) = actions.iter().find_map(ActionItem::workspace) {
                workspace = first.to_string();
            }
            let thought = step
                .thought
                .clone()
                .unwrap_or_else(|| Value::String(String::new()));
            (actions, thought)
        };

        entries.push(Entry {
            id,
            parent: id.checked_sub(1),
            actions,
            thought,
            metadata: json!({ "workspace": workspace, "stage": "TESTING" }),
        });
    }

    entries
}
