//! Fixture documents shaped like recorded agent runs.

use serde_json::{Value, json};

fn system_message() -> Value {
    json!({
        "role": "system",
        "content": "System prompt",
        "agent": "main",
        "message_type": "system_prompt",
    })
}

fn user_message() -> Value {
    json!({
        "role": "user",
        "content": "Initial user instruction",
        "agent": "main",
        "message_type": "observation",
    })
}

/// Assistant message for 1-based `step`.
pub fn assistant_message(step: usize) -> Value {
    let thought = format!("thought_{step}");
    let action = format!("action_{step}");
    json!({
        "role": "assistant",
        "content": thought,
        "thought": thought,
        "action": action,
        "agent": "main",
        "tool_calls": [{
            "index": 0,
            "function": { "arguments": "{\"command\": \"view\"}", "name": action },
            "id": action,
            "type": "function",
        }],
        "message_type": "action",
        "thinking_blocks": [],
    })
}

/// Tool reply for 1-based `step`.
pub fn tool_message(step: usize) -> Value {
    json!({
        "role": "tool",
        "content": format!("OBSERVATION for action_{step}"),
        "agent": "main",
        "message_type": "observation",
        "tool_call_ids": [format!("action_{step}")],
    })
}

/// A trajectory+history document with `steps` steps.
///
/// `trajectory[i].query` holds the system and user messages followed by the
/// pairs of every step before `i + 1`; `history` mirrors all steps and
/// `info.model_stats.api_calls` equals `steps`.
pub fn mock_trajectory(steps: usize) -> Value {
    let mut trajectory = Vec::with_capacity(steps);
    let mut history = vec![system_message(), user_message()];

    for step in 1..=steps {
        let mut query = vec![system_message(), user_message()];
        for prior in 1..step {
            query.push(assistant_message(prior));
            query.push(tool_message(prior));
        }

        let thought = format!("thought_{step}");
        trajectory.push(json!({
            "action": format!("action_{step}"),
            "observation": format!("observation_{step}"),
            "response": thought,
            "thought": thought,
            "execution_time": 0.1,
            "state": { "working_dir": "/repo", "diff": "" },
            "query": query,
            "extra_info": {},
        }));

        history.push(assistant_message(step));
        history.push(tool_message(step));
    }

    json!({
        "trajectory": trajectory,
        "history": history,
        "info": {
            "swe_agent_version": "1.1.0",
            "submission": "",
            "exit_status": "submitted",
            "model_stats": {
                "instance_cost": 0.0,
                "tokens_sent": 0,
                "tokens_received": 0,
                "api_calls": steps,
            },
        },
        "replay_config": "{\"env\": \"local\"}",
        "environment": "image:latest",
    })
}

/// The `history` of [`mock_trajectory`] on its own.
pub fn mock_history_only(steps: usize) -> Value {
    let full = mock_trajectory(steps);
    json!({ "history": full["history"].clone() })
}
