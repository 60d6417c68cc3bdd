//! Agent event stream: the ordered, typed events an agent run
//! emits on its way to exactly one terminal event.

use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    AgentStart { task_id: Uuid },
    SkillCall { name: String, args: Value },
    SkillOutput { name: String, result: Value },
    Token { delta: String },
    Message { role: String, text: String },
    Error { kind: String, message: String },
    AgentComplete { summary: Option<String> },
}

impl AgentEvent {
    /// True for the two event kinds that may only ever appear once, as the
    /// last event of a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::AgentComplete {.. } | AgentEvent::Error {.. })
    }

    /// The SSE wire kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::AgentStart {.. } => "agent_start",
            AgentEvent::SkillCall {.. } => "skill_call",
            AgentEvent::SkillOutput {.. } => "skill_output",
            AgentEvent::Token {.. } => "token",
            AgentEvent::Message {.. } => "message",
            AgentEvent::Error {.. } => "error",
            AgentEvent::AgentComplete {.. } => "agent_complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(AgentEvent::AgentComplete { summary: None }.is_terminal());
        assert!(AgentEvent::Error {
                kind: "cancelled".into(),
                message: "x".into()
            }
                .is_terminal());
        assert!(!AgentEvent::Token { delta: "x".into() }.is_terminal());
    }
}
