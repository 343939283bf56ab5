//! Progress tasks shown by the extension host while a server is launched

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub state: TaskState,
    pub labels: BTreeMap<String, String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory task store shared with the host UI
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task in `loading` state and return its id
    pub fn create_task(&self, name: impl Into<String>, labels: &BTreeMap<String, String>) -> String {
        let now = Utc::now();
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            state: TaskState::Loading,
            labels: labels.clone(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        let id = task.id.clone();
        self.tasks.write().insert(id.clone(), task);
        id
    }

    pub fn succeed(&self, id: &str) {
        self.update(id, TaskState::Success, None);
    }

    pub fn fail(&self, id: &str, error: impl Into<String>) {
        self.update(id, TaskState::Error, Some(error.into()));
    }

    fn update(&self, id: &str, state: TaskState, error: Option<String>) {
        if let Some(task) = self.tasks.write().get_mut(id) {
            task.state = state;
            task.error = error;
            task.updated_at = Utc::now();
        } else {
            tracing::debug!(task = id, "update for unknown task ignored");
        }
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().get(id).cloned()
    }

    /// Every task, oldest first
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Tasks whose labels contain all of `filter`
    pub fn tasks_with_labels(&self, filter: &BTreeMap<String, String>) -> Vec<Task> {
        self.tasks()
            .into_iter()
            .filter(|t| matches_labels(t, filter))
            .collect()
    }

    /// Remove a task, returning it if it existed
    pub fn delete(&self, id: &str) -> Option<Task> {
        self.tasks.write().remove(id)
    }

    /// Remove every task whose labels contain all of `filter`; returns how many went
    pub fn delete_by_labels(&self, filter: &BTreeMap<String, String>) -> usize {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, t| !matches_labels(t, filter));
        before - tasks.len()
    }
}

fn matches_labels(task: &Task, filter: &BTreeMap<String, String>) -> bool {
    filter.iter().all(|(k, v)| task.labels.get(k) == Some(v))
}
