//! Read-side view of a document as a numbered list of steps.
//!
//! The global `history` is the source for both dialects: step 0 is the
//! initial instruction at `history[1]`, step `j` is the pair at `2j`/`2j + 1`.

use serde::Serialize;
use serde_json::Value;

use crate::document::{self, PREAMBLE_LEN, extract_text};
use crate::error::Result;

const OBSERVATION_MARKER: &str = "OBSERVATION:\n";

/// One reviewable step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub original_index: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_step_zero: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub thought: String,
    pub action: String,
    pub observation: String,
}

/// Sanitized step handed to an LLM as conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PromptStep {
    Instruction {
        step: usize,
        content: String,
    },
    Step {
        step: usize,
        thought: String,
        action: String,
        observation: String,
    },
}

/// List the document's steps, step 0 first.
pub fn project_steps(doc: &Value) -> Result<Vec<StepView>> {
    document::classify(doc)?;
    let history = document::history(doc);
    let mut steps = Vec::with_capacity(history.len() / 2);

    if let Some(instruction) = history.get(1) {
        steps.push(StepView {
            original_index: 0,
            is_step_zero: true,
            content: Some(field_text(instruction, "content").to_string()),
            thought: String::new(),
            action: String::new(),
            observation: String::new(),
        });
    }

    for (offset, pair) in history.get(PREAMBLE_LEN..).unwrap_or(&[]).chunks_exact(2).enumerate() {
        let (assistant, tool) = (&pair[0], &pair[1]);
        steps.push(StepView {
            original_index: offset + 1,
            is_step_zero: false,
            content: None,
            thought: field_text(assistant, "thought").to_string(),
            action: field_text(assistant, "action").to_string(),
            observation: strip_observation_marker(field_text(tool, "content")).to_string(),
        });
    }

    Ok(steps)
}

/// The step list reduced to what an LLM needs to reason about the run.
pub fn prompt_steps(doc: &Value) -> Result<Vec<PromptStep>> {
    Ok(project_steps(doc)?
        .into_iter()
        .map(|view| {
            if view.is_step_zero {
                PromptStep::Instruction {
                    step: 0,
                    content: view.content.unwrap_or_default(),
                }
            } else {
                PromptStep::Step {
                    step: view.original_index,
                    thought: view.thought,
                    action: view.action,
                    observation: view.observation,
                }
            }
        })
        .collect())
}

/// Text of `message[key]`; non-object messages read as empty.
fn field_text<'a>(message: &'a Value, key: &str) -> &'a str {
    message.get(key).map(extract_text).unwrap_or("")
}

fn strip_observation_marker(text: &str) -> &str {
    match text.split_once(OBSERVATION_MARKER) {
        Some((_, rest)) => rest.split(OBSERVATION_MARKER).next().unwrap_or(rest),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_history_only, mock_trajectory};
    use serde_json::json;

    #[test]
    fn test_project_steps() {
        let steps = project_steps(&mock_trajectory(2)).unwrap();
        assert_eq!(steps.len(), 3);

        assert!(steps[0].is_step_zero);
        assert_eq!(steps[0].original_index, 0);
        assert_eq!(steps[0].content.as_deref(), Some("Initial user instruction"));

        assert_eq!(steps[2].original_index, 2);
        assert_eq!(steps[2].thought, "thought_2");
        assert_eq!(steps[2].action, "action_2");
        assert_eq!(steps[2].observation, "OBSERVATION for action_2");
    }

    #[test]
    fn test_project_steps_ignores_unpaired_tail_and_odd_records() {
        let mut doc = mock_history_only(1);
        doc["history"].as_array_mut().unwrap().push(json!("dangling"));
        doc["history"][3] = json!(null);

        let steps = project_steps(&doc).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].observation, "");
        assert_eq!(steps[1].thought, "thought_1");
    }

    #[test]
    fn test_observation_marker_is_stripped() {
        let mut doc = mock_history_only(1);
        doc["history"][3]["content"] =
            json!([{ "type": "text", "text": "header\nOBSERVATION:\nfile listing" }]);
        let steps = project_steps(&doc).unwrap();
        assert_eq!(steps[1].observation, "file listing");
    }

    #[test]
    fn test_observation_marker_keeps_first_segment_only() {
        assert_eq!(strip_observation_marker("a"), "a");
        assert_eq!(
            strip_observation_marker("x OBSERVATION:\none OBSERVATION:\ntwo"),
            "one "
        );
    }

    #[test]
    fn test_prompt_steps_serialization() {
        let prompt = prompt_steps(&mock_trajectory(1)).unwrap();
        let value = serde_json::to_value(&prompt).unwrap();
        assert_eq!(
            value,
            json!([
                { "step": 0, "content": "Initial user instruction" },
                {
                    "step": 1,
                    "thought": "thought_1",
                    "action": "action_1",
                    "observation": "OBSERVATION for action_1",
                },
            ])
        );
    }

    #[test]
    fn test_step_view_serialization_uses_client_field_names() {
        let steps = project_steps(&mock_history_only(1)).unwrap();
        let value = serde_json::to_value(&steps).unwrap();
        assert_eq!(value[0]["isStepZero"], true);
        assert_eq!(value[1]["originalIndex"], 1);
        assert!(value[1].get("isStepZero").is_none());
        assert!(value[1].get("content").is_none());
    }
}
