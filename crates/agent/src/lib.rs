//! Agent runtime, LLM gateway, and task queue.

pub mod event;
pub mod llm_gateway;
pub mod runtime;
pub mod skill;
pub mod task_queue;

pub use event::AgentEvent;
pub use llm_gateway::{ChatMessage, ChatOptions, ChatOutput, LlmError, LlmGateway, LlmProvider};
pub use runtime::{Agent, AgentRuntime, RunContext};
pub use skill::{Skill, SkillError, SkillRegistry};
pub use task_queue::{InMemoryTaskQueue, TaskFilter, TaskQueue};
