//! Agent runtime: each `run` executes in its own logical task
//! with its own cancellation token, emitting a lazy, single-shot, ordered
//! event stream that a consumer drains at its own pace.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::event::AgentEvent;
use crate::skill::{SkillError, SkillRegistry};

/// Channel capacity for an agent's event stream. Bounded so that a slow
/// consumer applies backpressure to the producer instead of the runtime buffering unboundedly.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Handed to an [`Agent`] implementation: the only way it touches skills or
/// emits events, so every skill call and emitted event is uniformly traced
/// and cancellation-aware.
pub struct RunContext {
    pub task_id: Uuid,
    pub agent_kind: String,
    registry: SkillRegistry,
    cancel: CancellationToken,
    tx: mpsc::Sender<AgentEvent>,
}

impl RunContext {
    pub async fn emit(&self, event: AgentEvent) {
        // The receiver may already be gone (consumer disconnected); that is
        // not this call's problem to report, cancellation already covers it.
        let _ = self.tx.send(event).await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Calls a registered skill, emitting `skill_call` then `skill_output`
    /// around it.
    pub async fn call_skill(&self, name: &str, args: Value) -> Result<Value, SkillError> {
        self.emit(AgentEvent::SkillCall {
                name: name.to_string(),
                args: args.clone(),
        })
            .await;
        let result = self.registry.invoke(name, args, &self.cancel).await?;
        self.emit(AgentEvent::SkillOutput {
                name: name.to_string(),
                result: result.clone(),
        })
            .await;
        Ok(result)
    }
}

/// One agent definition: a named kind plus the logic that drives skill
/// calls and emits events through its [`RunContext`].
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> &str;
    async fn run(&self, input: Value, ctx: &RunContext) -> anyhow::Result<Option<String>>;
}

pub struct AgentRuntime {
    registry: SkillRegistry,
}

impl AgentRuntime {
    pub fn new(registry: SkillRegistry) -> Self {
        Self { registry }
    }

    /// Spawns `agent` in its own task and returns the receiving end of its
    /// event stream plus a token the caller can cancel`).
    pub fn run(
        &self,
        agent: Arc<dyn Agent>,
        input: Value,
    ) -> (mpsc::Receiver<AgentEvent>, CancellationToken) {
        let task_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let ctx = RunContext {
            task_id,
            agent_kind: agent.kind().to_string(),
            registry: self.registry.clone(),
            cancel: cancel.clone(),
            tx: tx.clone(),
        };

        let span = tracing::info_span!("agent.run", agent_kind = %agent.kind(), task_id = %task_id);
        let cancel_for_task = cancel.clone();
        tokio::spawn(
            async move {
                let _ = tx.send(AgentEvent::AgentStart { task_id }).await;

                tokio::select! {
                    biased;
                    _ = cancel_for_task.cancelled() => {
                        let _ = tx
                            .send(AgentEvent::Error {
                                kind: "cancelled".to_string(),
                                message: "agent run was cancelled".to_string(),
                        })
                            .await;
                    }
                    result = agent.run(input, &ctx) => {
                        match result {
                            Ok(summary) => {
                                let _ = tx.send(AgentEvent::AgentComplete { summary }).await;
                            }
                            Err(err) => {
                                let _ = tx
                                    .send(AgentEvent::Error {
                                        kind: "failed".to_string(),
                                        message: err.to_string(),
                                })
                                    .await;
                            }
                        }
                    }
                }
            }
                .instrument(span),
        );

        (rx, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::Skill;
    use serde_json::json;
    use tokio::time::{sleep, Duration};

    struct Greeter;
    #[async_trait]
    impl Skill for Greeter {
        fn name(&self) -> &str {
            "greet"
        }
        async fn call(&self, args: Value, _cancel: &CancellationToken) -> anyhow::Result<Value> {
            Ok(json!({ "greeting": format!("hello {}", args["who"]) }))
        }
    }

    struct Greeting;
    #[async_trait]
    impl Agent for Greeting {
        fn kind(&self) -> &str {
            "greeting"
        }
        async fn run(&self, input: Value, ctx: &RunContext) -> anyhow::Result<Option<String>> {
            let out = ctx.call_skill("greet", input).await?;
            ctx.emit(AgentEvent::Message {
                    role: "assistant".to_string(),
                    text: out["greeting"].as_str().unwrap_or_default().to_string(),
            })
                .await;
            Ok(Some("done".to_string()))
        }
    }

    struct Stalling;
    #[async_trait]
    impl Agent for Stalling {
        fn kind(&self) -> &str {
            "stalling"
        }
        async fn run(&self, _input: Value, ctx: &RunContext) -> anyhow::Result<Option<String>> {
            loop {
                if ctx.is_cancelled() {
                    anyhow::bail!("observed cancellation");
                }
                sleep(Duration::from_millis(10)).await;
            }
        }
    }

    #[tokio::test]
    async fn event_stream_is_ordered_and_ends_with_agent_complete() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(Greeter));
        let runtime = AgentRuntime::new(registry);

        let (mut rx, _cancel) = runtime.run(Arc::new(Greeting), json!({"who": "world"}));
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }

        let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "agent_start",
                "skill_call",
                "skill_output",
                "message",
                "agent_complete"
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_terminates_the_stream_with_a_cancelled_error() {
        let runtime = AgentRuntime::new(SkillRegistry::new());
        let (mut rx, cancel) = runtime.run(Arc::new(Stalling), json!({}));

        let start = rx.recv().await.unwrap();
        assert_eq!(start.kind(), "agent_start");

        cancel.cancel();
        let terminal = rx.recv().await.unwrap();
        assert!(matches!(terminal, AgentEvent::Error { ref kind,.. } if kind == "cancelled"));
    }
}
