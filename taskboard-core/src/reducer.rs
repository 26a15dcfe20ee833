//! Board state and the reducer that applies [`Action`]s to it.
//!
//! Every action is validated before anything is touched, so a rejected
//! action leaves the state exactly as it was.
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::BoardError;
use crate::types::{Board, Column, ColumnId, Task, TaskId};

/// In-memory state owned by one board view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub board: Board,
    /// The single column that is waiting for a server id, if any.
    pub pending_creation: Option<ColumnId>,
    /// Monotonic counter, incremented on every applied action.
    pub revision: u64,
}

impl BoardState {
    pub fn new(board: Board) -> Self {
        let pending_creation = pending_column(&board);
        Self {
            board,
            pending_creation,
            revision: 0,
        }
    }

    /// Apply one action. On error nothing is changed.
    pub fn reduce(&mut self, action: Action) -> Result<(), BoardError> {
        match action {
            Action::BoardLoaded { board } | Action::BoardRestored { board } => {
                self.pending_creation = pending_column(&board);
                self.board = board;
            }
            Action::TaskMoved {
                task_id,
                column_id,
                score,
            } => {
                self.board = apply_move(&self.board, task_id, column_id, score)?;
            }
            Action::TaskCreated { task } | Action::TaskUpdated { task } => {
                check_score(task.score)?;
                upsert_task(&mut self.board, task)?;
            }
            Action::TaskConfirmed { temporary_id, task } => {
                check_score(task.score)?;
                if self.board.task(temporary_id).is_none() {
                    return Err(BoardError::TaskNotFound(temporary_id));
                }
                if task.id != temporary_id && self.board.task(task.id).is_some() {
                    return Err(BoardError::DuplicateId(task.id.to_string()));
                }
                if self.board.column(task.related_column).is_none() {
                    return Err(BoardError::ColumnNotFound(task.related_column));
                }
                remove_task(&mut self.board, temporary_id);
                upsert_task(&mut self.board, task)?;
            }
            Action::TaskDeleted { task_id } => {
                if !remove_task(&mut self.board, task_id) {
                    return Err(BoardError::TaskNotFound(task_id));
                }
            }
            Action::ColumnStaged {
                column_id,
                name,
                score,
            } => {
                if let Some(pending) = self.pending_creation {
                    return Err(BoardError::PendingColumnExists { pending });
                }
                check_score(score)?;
                if self.board.column(column_id).is_some() {
                    return Err(BoardError::DuplicateId(column_id.to_string()));
                }
                let mut column = Column::new(column_id, name, score);
                column.is_not_persisted = true;
                self.board.columns.push(column);
                self.pending_creation = Some(column_id);
            }
            Action::ColumnCreated {
                temporary_id,
                column,
            } => {
                if column.id != temporary_id && self.board.column(column.id).is_some() {
                    return Err(BoardError::DuplicateId(column.id.to_string()));
                }
                let staged = self
                    .board
                    .column_mut(temporary_id)
                    .ok_or(BoardError::ColumnNotFound(temporary_id))?;
                staged.id = column.id;
                staged.name = column.name;
                if column.score.is_finite() {
                    staged.score = column.score;
                }
                staged.is_not_persisted = false;
                for task in &mut staged.tasks {
                    task.related_column = column.id;
                }
                if self.pending_creation == Some(temporary_id) {
                    self.pending_creation = None;
                }
            }
            Action::ColumnDiscarded { column_id } => {
                let column = self
                    .board
                    .column(column_id)
                    .ok_or(BoardError::ColumnNotFound(column_id))?;
                if !column.is_not_persisted {
                    return Err(BoardError::ColumnAlreadyPersisted(column_id));
                }
                self.board.columns.retain(|c| c.id != column_id);
                if self.pending_creation == Some(column_id) {
                    self.pending_creation = None;
                }
            }
            Action::ColumnRenamed { column_id, name } => {
                if name.trim().is_empty() {
                    return Err(BoardError::EmptyColumnName);
                }
                let column = self
                    .board
                    .column_mut(column_id)
                    .ok_or(BoardError::ColumnNotFound(column_id))?;
                column.name = name;
            }
            Action::ColumnMoved { column_id, score } => {
                check_score(score)?;
                let column = self
                    .board
                    .column_mut(column_id)
                    .ok_or(BoardError::ColumnNotFound(column_id))?;
                column.score = score;
            }
            Action::ColumnDeleted { column_id } => {
                if self.board.column(column_id).is_none() {
                    return Err(BoardError::ColumnNotFound(column_id));
                }
                self.board.columns.retain(|c| c.id != column_id);
                if self.pending_creation == Some(column_id) {
                    self.pending_creation = None;
                }
            }
        }
        self.revision += 1;
        Ok(())
    }
}

/// Move a task to `destination` with a new score.
///
/// Across columns the task leaves its source list and is appended to the
/// destination list; inside one column only its score changes.
pub fn apply_move(
    board: &Board,
    task_id: TaskId,
    destination: ColumnId,
    score: f64,
) -> Result<Board, BoardError> {
    check_score(score)?;
    let source = board
        .column_of(task_id)
        .map(|c| c.id)
        .ok_or(BoardError::TaskNotFound(task_id))?;
    if board.column(destination).is_none() {
        return Err(BoardError::ColumnNotFound(destination));
    }

    let mut next = board.clone();
    if source == destination {
        if let Some(task) = next
            .column_mut(source)
            .and_then(|c| c.tasks.iter_mut().find(|t| t.id == task_id))
        {
            task.score = score;
        }
        return Ok(next);
    }

    let mut moved = None;
    if let Some(column) = next.column_mut(source) {
        if let Some(pos) = column.tasks.iter().position(|t| t.id == task_id) {
            moved = Some(column.tasks.remove(pos));
        }
    }
    let mut task = moved.ok_or(BoardError::TaskNotFound(task_id))?;
    task.related_column = destination;
    task.score = score;
    if let Some(column) = next.column_mut(destination) {
        column.tasks.push(task);
    }
    Ok(next)
}

fn check_score(score: f64) -> Result<(), BoardError> {
    if score.is_finite() {
        Ok(())
    } else {
        Err(BoardError::InvalidScore(score))
    }
}

fn pending_column(board: &Board) -> Option<ColumnId> {
    board
        .columns
        .iter()
        .find(|c| c.is_not_persisted)
        .map(|c| c.id)
}

/// Insert or replace a task keyed by id. A task that changed columns is
/// taken out of its old column first.
fn upsert_task(board: &mut Board, task: Task) -> Result<(), BoardError> {
    if board.column(task.related_column).is_none() {
        return Err(BoardError::ColumnNotFound(task.related_column));
    }
    if let Some(current) = board.column_of(task.id).map(|c| c.id) {
        if current != task.related_column {
            remove_task(board, task.id);
        }
    }
    if let Some(column) = board.column_mut(task.related_column) {
        match column.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => column.tasks.push(task),
        }
    }
    Ok(())
}

fn remove_task(board: &mut Board, task_id: TaskId) -> bool {
    for column in &mut board.columns {
        if let Some(pos) = column.tasks.iter().position(|t| t.id == task_id) {
            column.tasks.remove(pos);
            return true;
        }
    }
    false
}
