//! Kanban board state, drag resolution and optimistic persistence.
pub mod action;
pub mod drag;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod reducer;
pub mod scoring;
pub mod store;
pub mod types;

pub use action::Action;
pub use drag::{DragOutcome, DragSession, Draggable, Droppable};
pub use engine::{BoardEngine, MoveResult};
pub use error::{BoardError, EngineError};
pub use persistence::{
    ColumnRequest, MoveTaskRequest, PersistenceApi, PersistenceError, SavedTask, TaskDraft,
};
pub use reducer::BoardState;
pub use scoring::ScoringConfig;
pub use store::{BoardEvent, BoardStore, Notice, NoticeLevel};
pub use types::{Board, Column, ColumnId, Priority, Task, TaskId};
