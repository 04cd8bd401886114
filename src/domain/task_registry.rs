//! Memory-based task registry for background refresh/scrape work
//!
//! Tasks live only in process memory: the registry tracks their lifecycle
//! (`pending → running → completed | failed`) and a periodic sweep drops
//! terminal tasks once they are older than the retention window.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Terminal states are final; everything else may move forward or stay put.
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => true,
            Self::Running => !matches!(next, Self::Pending),
            Self::Completed | Self::Failed => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A tracked unit of asynchronous work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 0-100
    pub progress: u8,
    pub params: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Task counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct TaskEntry {
    // Insertion order, breaks ties between tasks created in the same instant
    seq: u64,
    task: Task,
}

#[derive(Debug, Default)]
struct RegistryState {
    tasks: HashMap<String, TaskEntry>,
    next_seq: u64,
}

/// Thread-safe task registry
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `pending` task
    pub async fn register(
        &self,
        id: impl Into<String>,
        task_type: impl Into<String>,
        params: Value,
    ) -> Result<Task, TaskError> {
        let id = id.into();
        let mut state = self.state.write().await;
        if state.tasks.contains_key(&id) {
            return Err(TaskError::AlreadyExists(id));
        }

        let now = Utc::now();
        let task = Task {
            id: id.clone(),
            task_type: task_type.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            progress: 0,
            params,
            result: None,
            error: None,
        };

        let seq = state.next_seq;
        state.next_seq += 1;
        state.tasks.insert(
            id.clone(),
            TaskEntry {
                seq,
                task: task.clone(),
            },
        );

        info!("Registered task {} ({})", id, task.task_type);
        Ok(task)
    }

    /// Update a task. Returns `Ok(None)` when no task has this id.
    ///
    /// Progress is clamped to 100 and forced to 100 on completion. `result`
    /// and `error` only overwrite the stored values when given.
    pub async fn update(
        &self,
        id: &str,
        status: TaskStatus,
        progress: Option<u8>,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<Option<Task>, TaskError> {
        let mut state = self.state.write().await;
        let Some(entry) = state.tasks.get_mut(id) else {
            return Ok(None);
        };
        let task = &mut entry.task;

        if !task.status.can_transition_to(status) {
            return Err(TaskError::InvalidTransition {
                id: id.to_string(),
                from: task.status,
                to: status,
            });
        }

        task.status = status;
        if let Some(p) = progress {
            task.progress = p.min(100);
        }
        if status == TaskStatus::Completed {
            task.progress = 100;
        }
        if result.is_some() {
            task.result = result;
        }
        if error.is_some() {
            task.error = error;
        }
        task.updated_at = Utc::now().max(task.updated_at);

        debug!("Task {} -> {} ({}%)", id, task.status, task.progress);
        Ok(Some(task.clone()))
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        let state = self.state.read().await;
        state.tasks.get(id).map(|entry| entry.task.clone())
    }

    /// Tasks matching the optional filters, newest first
    pub async fn list(&self, task_type: Option<&str>, status: Option<TaskStatus>) -> Vec<Task> {
        let state = self.state.read().await;
        let mut entries: Vec<&TaskEntry> = state
            .tasks
            .values()
            .filter(|e| task_type.is_none_or(|t| e.task.task_type == t))
            .filter(|e| status.is_none_or(|s| e.task.status == s))
            .collect();

        entries.sort_by(|a, b| {
            b.task
                .created_at
                .cmp(&a.task.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        entries.into_iter().map(|e| e.task.clone()).collect()
    }

    /// Remove terminal tasks whose last update is at least `max_age` old.
    /// Returns the number of removed tasks.
    pub async fn gc(&self, max_age: Duration) -> usize {
        // Ages beyond chrono's range can never be reached
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };

        let now = Utc::now();
        let mut state = self.state.write().await;
        let before = state.tasks.len();
        state
            .tasks
            .retain(|_, e| !(e.task.status.is_terminal() && now - e.task.updated_at >= max_age));
        let removed = before - state.tasks.len();

        if removed > 0 {
            info!("Task gc removed {} finished tasks", removed);
        }
        removed
    }

    pub async fn stats(&self) -> TaskStats {
        let state = self.state.read().await;
        let mut stats = TaskStats {
            total: state.tasks.len(),
            ..TaskStats::default()
        };
        for entry in state.tasks.values() {
            match entry.task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Run `gc(retention)` every `interval` until `cancel` fires
    pub fn spawn_gc_loop(
        &self,
        interval: Duration,
        retention: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Task gc loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        registry.gc(retention).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_task_lifecycle() {
        let registry = TaskRegistry::new();

        let task = registry
            .register("refresh_product_1", "product_refresh", json!({"product_id": 1}))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);

        let task = registry
            .update("refresh_product_1", TaskStatus::Running, Some(10), None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.progress, 10);

        let task = registry
            .update(
                "refresh_product_1",
                TaskStatus::Completed,
                None,
                Some(json!({"updated": 2})),
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.result, Some(json!({"updated": 2})));

        assert_eq!(registry.gc(Duration::ZERO).await, 1);
        assert!(registry.get("refresh_product_1").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let registry = TaskRegistry::new();
        registry.register("t1", "scrape", Value::Null).await.unwrap();

        let err = registry.register("t1", "scrape", Value::Null).await.unwrap_err();
        assert_eq!(err, TaskError::AlreadyExists("t1".to_string()));
    }

    #[tokio::test]
    async fn test_update_missing_task_returns_none() {
        let registry = TaskRegistry::new();
        let updated = registry
            .update("nope", TaskStatus::Running, Some(5), None, None)
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let registry = TaskRegistry::new();
        registry.register("t1", "scrape", Value::Null).await.unwrap();
        registry
            .update("t1", TaskStatus::Failed, None, None, Some("boom".into()))
            .await
            .unwrap();

        let err = registry
            .update("t1", TaskStatus::Running, Some(50), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition { .. }));

        let task = registry.get("t1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_running_cannot_go_back_to_pending() {
        let registry = TaskRegistry::new();
        registry.register("t1", "scrape", Value::Null).await.unwrap();
        registry
            .update("t1", TaskStatus::Running, Some(10), None, None)
            .await
            .unwrap();
        // Progress updates within the same state are fine
        registry
            .update("t1", TaskStatus::Running, Some(250), None, None)
            .await
            .unwrap();
        assert_eq!(registry.get("t1").await.unwrap().progress, 100);

        assert!(
            registry
                .update("t1", TaskStatus::Pending, None, None, None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filtered() {
        let registry = TaskRegistry::new();
        registry.register("a", "scrape", Value::Null).await.unwrap();
        registry.register("b", "product_refresh", Value::Null).await.unwrap();
        registry.register("c", "scrape", Value::Null).await.unwrap();
        registry
            .update("c", TaskStatus::Running, None, None, None)
            .await
            .unwrap();

        let ids: Vec<String> = registry.list(None, None).await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let scrapes = registry.list(Some("scrape"), None).await;
        assert_eq!(scrapes.len(), 2);

        let running = registry.list(Some("scrape"), Some(TaskStatus::Running)).await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "c");
    }

    #[tokio::test]
    async fn test_gc_keeps_active_and_recent_tasks() {
        let registry = TaskRegistry::new();
        registry.register("active", "scrape", Value::Null).await.unwrap();
        registry.register("done", "scrape", Value::Null).await.unwrap();
        registry
            .update("done", TaskStatus::Completed, None, None, None)
            .await
            .unwrap();

        assert_eq!(registry.gc(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.gc(Duration::ZERO).await, 1);
        assert!(registry.get("active").await.is_some());

        let stats = registry.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn test_gc_loop_stops_on_cancel() {
        let registry = TaskRegistry::new();
        let cancel = CancellationToken::new();
        let handle = registry.spawn_gc_loop(
            Duration::from_millis(10),
            Duration::ZERO,
            cancel.clone(),
        );

        registry.register("t", "scrape", Value::Null).await.unwrap();
        registry
            .update("t", TaskStatus::Completed, None, None, None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.get("t").await.is_none());

        cancel.cancel();
        handle.await.unwrap();
    }
}
