//! Pulling displayable text out of agent replies.

use agentmesh_discovery::DelegationReport;
use serde_json::Value;

/// Text of a delegation report.
///
/// In order of preference: a top-level `response` string, the text parts of
/// an A2A task (`result.parts` or `result.artifacts[].parts`), the compact
/// JSON. A failed report yields its error message.
pub fn response_text(report: &DelegationReport) -> String {
    if !report.success {
        return report
            .error
            .clone()
            .unwrap_or_else(|| "Delegation failed".to_string());
    }

    let Some(payload) = &report.result else {
        return String::new();
    };

    if let Some(text) = payload.get("response").and_then(Value::as_str) {
        return text.to_string();
    }

    // JSON-RPC style replies nest the task under `result`.
    let task = payload.get("result").unwrap_or(payload);
    let texts = task_texts(task);
    if !texts.is_empty() {
        return texts.join("\n");
    }

    payload.to_string()
}

fn parts_texts(parts: Option<&Value>) -> Vec<String> {
    parts
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn task_texts(task: &Value) -> Vec<String> {
    let mut texts = parts_texts(task.get("parts"));
    if let Some(artifacts) = task.get("artifacts").and_then(Value::as_array) {
        for artifact in artifacts {
            texts.extend(parts_texts(artifact.get("parts")));
        }
    }
    texts
}
