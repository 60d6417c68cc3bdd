//! Task queue: the background plane's work list. Workers pull
//! by kind; `dedup_key` collisions hand back the existing task rather than
//! enqueuing a duplicate; leases give at-most-once handoff per worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lp_domain::{AgentTask, TaskStatus};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub kind: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    fn matches(&self, task: &AgentTask) -> bool {
        if let Some(k) = &self.kind {
            if &task.agent_kind != k {
                return false;
            }
        }
        if let Some(s) = self.status {
            if task.status != s {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, kind: &str, args: Value, dedup_key: Option<&str>) -> Uuid;
    async fn status(&self, task_id: Uuid) -> Option<AgentTask>;
    async fn list_pending(&self, filter: &TaskFilter) -> Vec<AgentTask>;
    /// Leases one queued task of `kind` for `visibility_timeout`: the task
    /// becomes invisible to other `lease` calls until the timeout elapses,
    /// at which point it is treated as abandoned and becomes leasable again.
    async fn lease(&self, kind: &str, visibility_timeout: Duration) -> Option<AgentTask>;
    async fn complete(&self, task_id: Uuid);
    /// Marks a task failed, retaining the error.
    async fn fail(&self, task_id: Uuid, error: String);
}

struct Entry {
    task: AgentTask,
    dedup_key: Option<String>,
    lease_expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryTaskQueue {
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, kind: &str, args: Value, dedup_key: Option<&str>) -> Uuid {
        let mut entries = self.entries.lock().await;

        if let Some(key) = dedup_key {
            if let Some(existing) = entries
                .values()
                .find(|e| e.dedup_key.as_deref() == Some(key))
            {
                return existing.task.task_id;
            }
        }

        let task_id = Uuid::new_v4();
        entries.insert(
            task_id,
            Entry {
                task: AgentTask {
                    task_id,
                    agent_kind: kind.to_string(),
                    input: args,
                    status: TaskStatus::Queued,
                    started_at: None,
                    finished_at: None,
                    error: None,
                },
                dedup_key: dedup_key.map(str::to_string),
                lease_expires_at: None,
            },
        );
        task_id
    }

    async fn status(&self, task_id: Uuid) -> Option<AgentTask> {
        self.entries.lock().await.get(&task_id).map(|e| e.task.clone())
    }

    async fn list_pending(&self, filter: &TaskFilter) -> Vec<AgentTask> {
        let now = Utc::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| {
                let leasable = e.task.status == TaskStatus::Queued
                || (e.task.status == TaskStatus::Started
                    && e.lease_expires_at.is_some_and(|t| t <= now));
                leasable && filter.matches(&e.task)
        })
            .map(|e| e.task.clone())
            .collect()
    }

    async fn lease(&self, kind: &str, visibility_timeout: Duration) -> Option<AgentTask> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let candidate = entries.values_mut().find(|e| {
                e.task.agent_kind == kind
                && (e.task.status == TaskStatus::Queued
                    || (e.task.status == TaskStatus::Started
                        && e.lease_expires_at.is_some_and(|t| t <= now)))
        })?;

        candidate.task.status = TaskStatus::Started;
        candidate.task.started_at = Some(now);
        candidate.lease_expires_at = Some(
            now + chrono::Duration::from_std(visibility_timeout).unwrap_or(chrono::Duration::seconds(30)),
        );
        Some(candidate.task.clone())
    }

    async fn complete(&self, task_id: Uuid) {
        if let Some(entry) = self.entries.lock().await.get_mut(&task_id) {
            entry.task.status = TaskStatus::Finished;
            entry.task.finished_at = Some(Utc::now());
            entry.lease_expires_at = None;
        }
    }

    async fn fail(&self, task_id: Uuid, error: String) {
        if let Some(entry) = self.entries.lock().await.get_mut(&task_id) {
            entry.task.status = TaskStatus::Failed;
            entry.task.finished_at = Some(Utc::now());
            entry.task.error = Some(error);
            entry.lease_expires_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dedup_key_collision_returns_existing_task() {
        let queue = InMemoryTaskQueue::new();
        let first = queue.enqueue("reindex", json!({"chapter": "ch1"}), Some("reindex:ch1")).await;
        let second = queue.enqueue("reindex", json!({"chapter": "ch1"}), Some("reindex:ch1")).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn lease_then_abandon_makes_task_leasable_again() {
        let queue = InMemoryTaskQueue::new();
        let id = queue.enqueue("reindex", json!({}), None).await;

        let leased = queue.lease("reindex", Duration::from_millis(1)).await.unwrap();
        assert_eq!(leased.task_id, id);
        assert!(queue.lease("reindex", Duration::from_secs(30)).await.is_none());

        tokio::time::sleep(Duration::from_millis(5)).await;
        let re_leased = queue.lease("reindex", Duration::from_secs(30)).await.unwrap();
        assert_eq!(re_leased.task_id, id);
    }

    #[tokio::test]
    async fn failed_tasks_retain_their_last_error() {
        let queue = InMemoryTaskQueue::new();
        let id = queue.enqueue("reindex", json!({}), None).await;
        queue.lease("reindex", Duration::from_secs(30)).await;
        queue.fail(id, "embedding provider unavailable".to_string()).await;

        let status = queue.status(id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("embedding provider unavailable"));
    }

    #[tokio::test]
    async fn list_pending_filters_by_kind() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue("reindex", json!({}), None).await;
        queue.enqueue("agent_run", json!({}), None).await;

        let pending = queue
            .list_pending(&TaskFilter {
                kind: Some("reindex".to_string()),
                status: None,
        })
            .await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].agent_kind, "reindex");
    }
}
