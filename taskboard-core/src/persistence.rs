//! Contract with the backend that stores projects, columns and tasks.
//!
//! The engine only needs these operations; the REST binding lives in the
//! `taskboard-client` crate.
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Column, ColumnId, LabelRef, Priority, Task, TaskId, UserRef};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskRequest {
    pub task_id: TaskId,
    pub column_id: ColumnId,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Editable task fields, as submitted from a task form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignee_ids: Vec<i64>,
    #[serde(default)]
    pub label_ids: Vec<i64>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copy the draft's fields onto `task`, keeping id, score and column.
    /// Assignee and label names are kept for ids that stay selected.
    pub fn apply_to(&self, task: &Task) -> Task {
        let mut patched = task.clone();
        patched.name = self.name.clone();
        patched.description = self.description.clone();
        patched.priority = self.priority;
        patched.due_at = self.due_at;
        patched.assignees.retain(|a| self.assignee_ids.contains(&a.id));
        patched.labels.retain(|l| self.label_ids.contains(&l.id));
        patched
    }
}

/// A task as the backend returns it after a create or update. The backend
/// may leave out the placement; it is then taken from the local copy.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedTask {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub assignees: Vec<UserRef>,
    pub labels: Vec<LabelRef>,
    pub due_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub related_column: Option<ColumnId>,
}

impl SavedTask {
    /// Full task, with missing score or column filled from `local`.
    pub fn into_task(self, local: &Task) -> Task {
        Task {
            id: self.id,
            name: self.name,
            description: self.description,
            priority: self.priority,
            assignees: self.assignees,
            labels: self.labels,
            due_at: self.due_at,
            score: self.score.unwrap_or(local.score),
            related_column: self.related_column.unwrap_or(local.related_column),
        }
    }
}

impl From<Task> for SavedTask {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            name: task.name,
            description: task.description,
            priority: task.priority,
            assignees: task.assignees,
            labels: task.labels,
            due_at: task.due_at,
            score: Some(task.score),
            related_column: Some(task.related_column),
        }
    }
}

/// Backend operations used by the engine. Any error is a failure; the
/// engine does not tell transport errors, timeouts and rejections apart.
pub trait PersistenceApi: Send + Sync {
    fn fetch_columns(
        &self,
        project_id: i64,
    ) -> impl Future<Output = Result<Vec<Column>, PersistenceError>> + Send;

    fn move_task(
        &self,
        request: MoveTaskRequest,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn create_column(
        &self,
        project_id: i64,
        request: ColumnRequest,
    ) -> impl Future<Output = Result<Column, PersistenceError>> + Send;

    fn update_column(
        &self,
        column_id: ColumnId,
        request: ColumnRequest,
    ) -> impl Future<Output = Result<Column, PersistenceError>> + Send;

    fn delete_column(
        &self,
        column_id: ColumnId,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn create_task(
        &self,
        project_id: i64,
        draft: TaskDraft,
    ) -> impl Future<Output = Result<SavedTask, PersistenceError>> + Send;

    fn update_task(
        &self,
        task_id: TaskId,
        project_id: i64,
        draft: TaskDraft,
    ) -> impl Future<Output = Result<SavedTask, PersistenceError>> + Send;

    fn delete_task(
        &self,
        task_id: TaskId,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
