//! Agent event-stream wire framing: each `AgentEvent` becomes one
//! `event: <kind>\ndata: <json>\n\n` frame. Framing is a pure function so it
//! can sit in front of any transport (SSE response body, websocket text
//! frame, a CLI's stdout) without duplicating the event-to-JSON mapping.

use lp_agent::AgentEvent;
use serde_json::{json, Value};

/// The JSON payload carried by one event's `data:` line. Kept separate from
/// `format_event` so callers that want the parsed value (rather than the
/// formatted frame) can ask for it directly.
pub fn event_payload(event: &AgentEvent) -> Value {
    match event {
        AgentEvent::AgentStart { task_id } => json!({ "task_id": task_id }),
        AgentEvent::SkillCall { name, args } => json!({ "name": name, "args": args }),
        AgentEvent::SkillOutput { name, result } => json!({ "name": name, "result": result }),
        AgentEvent::Token { delta } => json!({ "delta": delta }),
        AgentEvent::Message { role, text } => json!({ "role": role, "text": text }),
        AgentEvent::Error { kind, message } => json!({ "kind": kind, "message": message }),
        AgentEvent::AgentComplete { summary } => json!({ "summary": summary }),
    }
}

/// Formats one `AgentEvent` as a complete SSE frame, blank line included.
pub fn format_event(event: &AgentEvent) -> String {
    format!(
        "event: {}\ndata: {}\n\n",
        event.kind(),
        event_payload(event)
    )
}
