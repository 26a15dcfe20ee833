//! Validation errors raised when an action cannot be applied to the board.
use crate::types::{ColumnId, TaskId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("Column not found: {0}")]
    ColumnNotFound(ColumnId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Column {0} is not persisted yet")]
    ColumnNotPersisted(ColumnId),

    #[error("Task {0} is not persisted yet")]
    TaskNotPersisted(TaskId),

    #[error("Column {0} is already persisted")]
    ColumnAlreadyPersisted(ColumnId),

    #[error("Column {pending} is still waiting to be saved")]
    PendingColumnExists { pending: ColumnId },

    #[error("Column name cannot be empty")]
    EmptyColumnName,

    #[error("Task name cannot be empty")]
    EmptyTaskName,

    #[error("Score {0} is not a finite number")]
    InvalidScore(f64),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),
}

/// Failure of an engine operation. The board is already consistent again
/// when this is returned, and a notice has been emitted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] BoardError),

    #[error(transparent)]
    Persistence(#[from] crate::persistence::PersistenceError),
}
