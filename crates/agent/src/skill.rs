//! Skill registry: agents expose a declarative set of named,
//! typed callables registered at construction time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("skill '{0}' is not registered")]
    NotFound(String),
    #[error("skill '{0}' was cancelled")]
    Cancelled(String),
    #[error("skill '{0}' failed: {1}")]
    Failed(String, String),
}

/// One named, typed callable an agent can invoke. Skills must re-check
/// `cancel` at their own suspension points; the registry does not pre-empt them.
#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;
    async fn call(&self, args: Value, cancel: &CancellationToken) -> anyhow::Result<Value>;
}

/// Skills registered at agent-definition time, keyed by name.
#[derive(Clone, Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        self.skills.insert(skill.name().to_string(), skill);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, SkillError> {
        let skill = self
            .get(name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;

        if cancel.is_cancelled() {
            return Err(SkillError::Cancelled(name.to_string()));
        }

        tokio::select! {
            result = skill.call(args, cancel) => {
                result.map_err(|e| SkillError::Failed(name.to_string(), e.to_string()))
            }
            _ = cancel.cancelled() => Err(SkillError::Cancelled(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;
    #[async_trait]
    impl Skill for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn call(&self, args: Value, _cancel: &CancellationToken) -> anyhow::Result<Value> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn invokes_a_registered_skill() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(Echo));
        let cancel = CancellationToken::new();
        let out = registry.invoke("echo", json!({"x": 1}), &cancel).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_skill_is_not_found() {
        let registry = SkillRegistry::new();
        let cancel = CancellationToken::new();
        let err = registry.invoke("missing", json!({}), &cancel).await.unwrap_err();
        assert!(matches!(err, SkillError::NotFound(_)));
    }

    #[tokio::test]
    async fn pre_cancelled_token_refuses_invocation() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(Echo));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = registry.invoke("echo", json!({}), &cancel).await.unwrap_err();
        assert!(matches!(err, SkillError::Cancelled(_)));
    }
}
