//! Optimistic board engine.
//!
//! Each mutation is applied to the store first, then sent to the
//! [`PersistenceApi`]. Failures put the board back and emit a notice.
//! The store lock is only held for synchronous steps, never across an
//! await, so several requests can be in flight at once. Each one is
//! reconciled against the affected entity id when it completes.
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::action::Action;
use crate::drag::{ColumnMove, DragOutcome, DragSession, Draggable, Droppable, TaskMove};
use crate::error::{BoardError, EngineError};
use crate::persistence::{ColumnRequest, MoveTaskRequest, PersistenceApi, TaskDraft};
use crate::reducer::BoardState;
use crate::scoring::ScoringConfig;
use crate::store::{BoardEvent, BoardStore, NoticeLevel};
use crate::types::{Board, Column, ColumnId, Task, TaskId};

/// What a finished gesture (or programmatic move) did.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveResult {
    Cancelled,
    NoOp,
    TaskMoved {
        task_id: TaskId,
        column_id: ColumnId,
        score: f64,
    },
    ColumnMoved {
        column_id: ColumnId,
        score: f64,
    },
}

pub struct BoardEngine<P> {
    api: P,
    scoring: ScoringConfig,
    store: Mutex<BoardStore>,
    next_temporary_id: AtomicI64,
}

impl<P: PersistenceApi> BoardEngine<P> {
    pub fn new(api: P, scoring: ScoringConfig) -> Self {
        Self {
            api,
            scoring,
            store: Mutex::new(BoardStore::new(Board::default())),
            next_temporary_id: AtomicI64::new(-1),
        }
    }

    pub fn api(&self) -> &P {
        &self.api
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.with_store(|s| s.subscribe())
    }

    /// Copy of the current state.
    pub fn state(&self) -> BoardState {
        self.with_store(|s| s.state().clone())
    }

    pub fn board(&self) -> Board {
        self.with_store(|s| s.board().clone())
    }

    fn with_store<R>(&self, f: impl FnOnce(&mut BoardStore) -> R) -> R {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    fn dispatch(&self, action: Action) -> Result<u64, BoardError> {
        self.with_store(|s| s.dispatch(action))
    }

    fn temporary_id(&self) -> i64 {
        self.next_temporary_id.fetch_sub(1, Ordering::Relaxed)
    }

    fn notify_error(&self, message: &str) {
        self.with_store(|s| s.notify(NoticeLevel::Error, message));
    }

    /// Surface a client-side rejection. Nothing was sent.
    fn reject<T>(&self, error: BoardError) -> Result<T, EngineError> {
        self.notify_error(&error.to_string());
        Err(EngineError::Rejected(error))
    }

    /// Surface a failed request after the board has been put back.
    fn fail<T>(&self, message: &str, error: impl Into<EngineError>) -> Result<T, EngineError> {
        let error = error.into();
        log::warn!("[taskboard.engine] {}: {}", message, error);
        self.notify_error(message);
        Err(error)
    }

    /// Fetch the project's columns and replace the board. On failure the
    /// board is left empty.
    pub async fn load(&self, project_id: i64) -> Result<(), EngineError> {
        log::info!("[taskboard.engine] Loading columns for project {}", project_id);
        match self.api.fetch_columns(project_id).await {
            Ok(columns) => {
                let board = normalize(project_id, columns);
                log::info!(
                    "[taskboard.engine] Loaded {} columns, {} tasks",
                    board.columns.len(),
                    board.task_count()
                );
                self.dispatch(Action::BoardLoaded { board })?;
                Ok(())
            }
            Err(e) => {
                let _ = self.dispatch(Action::BoardLoaded {
                    board: Board::new(project_id, Vec::new()),
                });
                self.fail("An error happened when fetching the columns", e)
            }
        }
    }

    pub fn begin_drag(&self, active: Draggable) -> DragSession {
        self.with_store(|s| DragSession::start(s.state(), active))
    }

    /// Resolve a finished gesture and persist the resulting move, if any.
    pub async fn finish_drag(&self, session: DragSession) -> Result<MoveResult, EngineError> {
        let outcome = self.with_store(|s| session.finish(s.board(), &self.scoring));
        match outcome {
            DragOutcome::Cancelled {
                snapshot,
                snapshot_revision,
            } => {
                self.with_store(|s| {
                    // Only when nothing landed in between; never clobber other edits.
                    if s.revision() == snapshot_revision {
                        let _ = s.dispatch(Action::BoardRestored { board: snapshot });
                    }
                });
                Ok(MoveResult::Cancelled)
            }
            DragOutcome::NoOp => Ok(MoveResult::NoOp),
            DragOutcome::MoveTask(m) => self.commit_task_move(m).await,
            DragOutcome::MoveColumn(m) => self.commit_column_move(m).await,
        }
    }

    /// Move a task to display slot `index` of `destination`, the same way a
    /// drop before the task currently in that slot would.
    pub async fn move_task(
        &self,
        task_id: TaskId,
        destination: ColumnId,
        index: usize,
    ) -> Result<MoveResult, EngineError> {
        let session = self.with_store(|s| {
            let board = s.board();
            if board.column_of(task_id).is_none() {
                return Err(BoardError::TaskNotFound(task_id));
            }
            let column = board
                .column(destination)
                .ok_or(BoardError::ColumnNotFound(destination))?;
            let over = column
                .sorted_tasks()
                .iter()
                .map(|t| t.id)
                .filter(|id| *id != task_id)
                .nth(index)
                .map(Droppable::Task)
                .unwrap_or(Droppable::ColumnBody(destination));
            let mut session = DragSession::start(s.state(), Draggable::Task(task_id));
            session.set_over(Some(over));
            Ok(session)
        });
        match session {
            Ok(session) => self.finish_drag(session).await,
            Err(e) => self.reject(e),
        }
    }

    /// Move a column to display slot `index`.
    pub async fn move_column(
        &self,
        column_id: ColumnId,
        index: usize,
    ) -> Result<MoveResult, EngineError> {
        let session = self.with_store(|s| {
            let board = s.board();
            if board.column(column_id).is_none() {
                return Err(BoardError::ColumnNotFound(column_id));
            }
            let sorted = board.sorted_columns();
            let target = sorted
                .get(index.min(sorted.len().saturating_sub(1)))
                .map(|c| c.id)
                .unwrap_or(column_id);
            let mut session = DragSession::start(s.state(), Draggable::Column(column_id));
            session.set_over(Some(Droppable::Column(target)));
            Ok(session)
        });
        match session {
            Ok(session) => self.finish_drag(session).await,
            Err(e) => self.reject(e),
        }
    }

    async fn commit_task_move(&self, m: TaskMove) -> Result<MoveResult, EngineError> {
        if m.task_id.is_temporary() {
            return self.reject(BoardError::TaskNotPersisted(m.task_id));
        }
        if m.destination.is_temporary() {
            return self.reject(BoardError::ColumnNotPersisted(m.destination));
        }
        let applied_revision = match self.dispatch(Action::TaskMoved {
            task_id: m.task_id,
            column_id: m.destination,
            score: m.score,
        }) {
            Ok(revision) => revision,
            Err(e) => return self.reject(e),
        };

        let request = MoveTaskRequest {
            task_id: m.task_id,
            column_id: m.destination,
            score: m.score,
        };
        match self.api.move_task(request).await {
            Ok(()) => {
                log::info!(
                    "[taskboard.engine] Moved {} to {} (score {})",
                    m.task_id,
                    m.destination,
                    m.score
                );
                Ok(MoveResult::TaskMoved {
                    task_id: m.task_id,
                    column_id: m.destination,
                    score: m.score,
                })
            }
            Err(e) => {
                self.with_store(|s| rollback_task_move(s, &m, applied_revision));
                self.fail("An error happened when moving the task", e)
            }
        }
    }

    async fn commit_column_move(&self, m: ColumnMove) -> Result<MoveResult, EngineError> {
        let applied = self.with_store(|s| {
            let column = s
                .board()
                .column(m.column_id)
                .ok_or(BoardError::ColumnNotFound(m.column_id))?;
            if column.is_not_persisted {
                return Err(BoardError::ColumnNotPersisted(m.column_id));
            }
            let name = column.name.clone();
            s.dispatch(Action::ColumnMoved {
                column_id: m.column_id,
                score: m.score,
            })?;
            Ok(name)
        });
        let name = match applied {
            Ok(name) => name,
            Err(e) => return self.reject(e),
        };

        let request = ColumnRequest {
            name,
            score: Some(m.score),
        };
        match self.api.update_column(m.column_id, request).await {
            Ok(_) => Ok(MoveResult::ColumnMoved {
                column_id: m.column_id,
                score: m.score,
            }),
            Err(e) => {
                self.with_store(|s| {
                    if s.board().column(m.column_id).map(|c| c.score) == Some(m.score) {
                        let _ = s.dispatch(Action::ColumnMoved {
                            column_id: m.column_id,
                            score: m.previous_score,
                        });
                    }
                });
                self.fail("An error happened when moving the column", e)
            }
        }
    }

    /// Insert an unnamed, not-yet-persisted column at display slot `index`.
    /// Only one such column may exist at a time.
    pub fn stage_column(&self, index: usize) -> Result<ColumnId, EngineError> {
        let column_id = ColumnId(self.temporary_id());
        let staged = self.with_store(|s| {
            if let Some(pending) = s.state().pending_creation {
                return Err(BoardError::PendingColumnExists { pending });
            }
            let scores: Vec<f64> = s.board().sorted_columns().iter().map(|c| c.score).collect();
            let score = self.scoring.column_score(&scores, index);
            s.dispatch(Action::ColumnStaged {
                column_id,
                name: String::new(),
                score,
            })
        });
        match staged {
            Ok(_) => Ok(column_id),
            Err(e @ BoardError::PendingColumnExists { .. }) => {
                self.notify_error("Finish the new column before adding another one");
                Err(EngineError::Rejected(e))
            }
            Err(e) => self.reject(e),
        }
    }

    /// Name a staged column and create it on the server. A blank name drops
    /// the staged column without any request.
    pub async fn persist_column(
        &self,
        column_id: ColumnId,
        name: &str,
    ) -> Result<ColumnId, EngineError> {
        let name = name.trim().to_string();
        let staged = self.with_store(|s| {
            let column = s
                .board()
                .column(column_id)
                .ok_or(BoardError::ColumnNotFound(column_id))?;
            if !column.is_not_persisted {
                return Err(BoardError::ColumnAlreadyPersisted(column_id));
            }
            let score = column.score;
            if name.is_empty() {
                s.dispatch(Action::ColumnDiscarded { column_id })?;
                return Err(BoardError::EmptyColumnName);
            }
            s.dispatch(Action::ColumnRenamed {
                column_id,
                name: name.clone(),
            })?;
            Ok((score, s.board().project_id))
        });
        let (score, project_id) = match staged {
            Ok(staged) => staged,
            Err(e) => return self.reject(e),
        };

        let request = ColumnRequest {
            name,
            score: Some(score),
        };
        match self.api.create_column(project_id, request).await {
            Ok(column) => {
                let id = column.id;
                if let Err(e) = self.dispatch(Action::ColumnCreated {
                    temporary_id: column_id,
                    column,
                }) {
                    log::warn!(
                        "[taskboard.engine] Created {} but the staged column is gone: {}",
                        id,
                        e
                    );
                }
                Ok(id)
            }
            Err(e) => {
                let _ = self.dispatch(Action::ColumnDiscarded { column_id });
                self.fail("An error happened when creating the column", e)
            }
        }
    }

    /// Stage and persist a column in one go.
    pub async fn create_column(&self, name: &str, index: usize) -> Result<ColumnId, EngineError> {
        if name.trim().is_empty() {
            return self.reject(BoardError::EmptyColumnName);
        }
        let column_id = self.stage_column(index)?;
        self.persist_column(column_id, name).await
    }

    /// Rename a column. A name that trims to nothing means delete.
    pub async fn rename_column(&self, column_id: ColumnId, name: &str) -> Result<(), EngineError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            log::info!("[taskboard.engine] Blank name for {}, deleting it", column_id);
            return self.delete_column(column_id).await;
        }
        let renamed = self.with_store(|s| {
            let column = s
                .board()
                .column(column_id)
                .ok_or(BoardError::ColumnNotFound(column_id))?;
            let previous = column.name.clone();
            let local_only = column.is_not_persisted;
            s.dispatch(Action::ColumnRenamed {
                column_id,
                name: name.clone(),
            })?;
            Ok((previous, local_only))
        });
        let (previous, local_only) = match renamed {
            Ok(renamed) => renamed,
            Err(e) => return self.reject(e),
        };
        if local_only {
            return Ok(());
        }

        let request = ColumnRequest {
            name: name.clone(),
            score: None,
        };
        match self.api.update_column(column_id, request).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.with_store(|s| {
                    let unchanged = s
                        .board()
                        .column(column_id)
                        .map(|c| c.name == name)
                        .unwrap_or(false);
                    if unchanged {
                        let _ = s.dispatch(Action::ColumnRenamed {
                            column_id,
                            name: previous,
                        });
                    }
                });
                self.fail("An error happened when renaming the column", e)
            }
        }
    }

    /// Delete a column. Staged columns are dropped locally; persisted ones
    /// leave the board once the server confirms.
    pub async fn delete_column(&self, column_id: ColumnId) -> Result<(), EngineError> {
        let staged = self.with_store(|s| s.board().column(column_id).map(|c| c.is_not_persisted));
        match staged {
            None => return self.reject(BoardError::ColumnNotFound(column_id)),
            Some(true) => {
                return match self.dispatch(Action::ColumnDiscarded { column_id }) {
                    Ok(_) => Ok(()),
                    Err(e) => self.reject(e),
                };
            }
            Some(false) => {}
        }
        match self.api.delete_column(column_id).await {
            Ok(()) => {
                // May already be gone after a reload.
                let _ = self.dispatch(Action::ColumnDeleted { column_id });
                log::info!("[taskboard.engine] Deleted {}", column_id);
                Ok(())
            }
            Err(e) => self.fail("An error happened when deleting the column", e),
        }
    }

    /// Add a task at the top of `column_id`, then swap in the server's copy.
    pub async fn create_task(
        &self,
        column_id: ColumnId,
        draft: TaskDraft,
    ) -> Result<TaskId, EngineError> {
        if draft.name.trim().is_empty() {
            return self.reject(BoardError::EmptyTaskName);
        }
        let temporary_id = TaskId(self.temporary_id());
        let staged = self.with_store(|s| {
            let column = s
                .board()
                .column(column_id)
                .ok_or(BoardError::ColumnNotFound(column_id))?;
            if column.is_not_persisted {
                return Err(BoardError::ColumnNotPersisted(column_id));
            }
            let scores: Vec<f64> = column.sorted_tasks().iter().map(|t| t.score).collect();
            let task = Task {
                id: temporary_id,
                name: draft.name.clone(),
                description: draft.description.clone(),
                priority: draft.priority,
                assignees: Vec::new(),
                labels: Vec::new(),
                due_at: draft.due_at,
                score: self.scoring.task_score(&scores, 0),
                related_column: column_id,
            };
            s.dispatch(Action::TaskCreated { task })?;
            Ok(s.board().project_id)
        });
        let project_id = match staged {
            Ok(project_id) => project_id,
            Err(e) => return self.reject(e),
        };

        match self.api.create_task(project_id, draft).await {
            Ok(saved) => {
                let id = saved.id;
                let confirmed = self.with_store(|s| {
                    let local = s
                        .board()
                        .task(temporary_id)
                        .cloned()
                        .ok_or(BoardError::TaskNotFound(temporary_id))?;
                    s.dispatch(Action::TaskConfirmed {
                        temporary_id,
                        task: saved.into_task(&local),
                    })
                });
                if let Err(e) = confirmed {
                    log::warn!("[taskboard.engine] Could not merge created {}: {}", id, e);
                    let _ = self.dispatch(Action::TaskDeleted {
                        task_id: temporary_id,
                    });
                }
                Ok(id)
            }
            Err(e) => {
                let _ = self.dispatch(Action::TaskDeleted {
                    task_id: temporary_id,
                });
                self.fail("An error happened when creating the task", e)
            }
        }
    }

    /// Patch a task's fields. Placement (column, score) is left to moves.
    pub async fn update_task(&self, task_id: TaskId, draft: TaskDraft) -> Result<(), EngineError> {
        if draft.name.trim().is_empty() {
            return self.reject(BoardError::EmptyTaskName);
        }
        if task_id.is_temporary() {
            return self.reject(BoardError::TaskNotPersisted(task_id));
        }
        let patched = self.with_store(|s| {
            let previous = s
                .board()
                .task(task_id)
                .cloned()
                .ok_or(BoardError::TaskNotFound(task_id))?;
            s.dispatch(Action::TaskUpdated {
                task: draft.apply_to(&previous),
            })?;
            Ok((previous, s.board().project_id))
        });
        let (previous, project_id) = match patched {
            Ok(patched) => patched,
            Err(e) => return self.reject(e),
        };

        match self.api.update_task(task_id, project_id, draft).await {
            Ok(saved) => {
                self.with_store(|s| merge_task(s, task_id, saved.into_task(&previous)));
                Ok(())
            }
            Err(e) => {
                self.with_store(|s| merge_task(s, task_id, previous));
                self.fail("An error happened when updating the task", e)
            }
        }
    }

    /// Remove a task; it comes back if the server refuses.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<(), EngineError> {
        if task_id.is_temporary() {
            return self.reject(BoardError::TaskNotPersisted(task_id));
        }
        let removed = self.with_store(|s| {
            let task = s
                .board()
                .task(task_id)
                .cloned()
                .ok_or(BoardError::TaskNotFound(task_id))?;
            s.dispatch(Action::TaskDeleted { task_id })?;
            Ok(task)
        });
        let removed = match removed {
            Ok(task) => task,
            Err(e) => return self.reject(e),
        };

        match self.api.delete_task(task_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(restore) = self.dispatch(Action::TaskCreated { task: removed }) {
                    log::warn!("[taskboard.engine] Could not restore {}: {}", task_id, restore);
                }
                self.fail("An error occurred when deleting the task", e)
            }
        }
    }

    /// Renumber a column's tasks with evenly spaced scores when neighbours
    /// got too close. Returns how many tasks were rescored.
    pub async fn rebalance_column(&self, column_id: ColumnId) -> Result<usize, EngineError> {
        let planned = self.with_store(|s| {
            let plan = rebalance_plan(s.board(), column_id, &self.scoring)?;
            for (task_id, _, score) in &plan {
                s.dispatch(Action::TaskMoved {
                    task_id: *task_id,
                    column_id,
                    score: *score,
                })?;
            }
            Ok(plan)
        });
        let plan = match planned {
            Ok(plan) => plan,
            Err(e) => return self.reject(e),
        };

        for (done, (task_id, _, score)) in plan.iter().enumerate() {
            let request = MoveTaskRequest {
                task_id: *task_id,
                column_id,
                score: *score,
            };
            if let Err(e) = self.api.move_task(request).await {
                self.with_store(|s| {
                    for (task_id, old, new) in &plan[done..] {
                        let untouched = s
                            .board()
                            .task(*task_id)
                            .map(|t| t.score == *new && t.related_column == column_id)
                            .unwrap_or(false);
                        if untouched {
                            let _ = s.dispatch(Action::TaskMoved {
                                task_id: *task_id,
                                column_id,
                                score: *old,
                            });
                        }
                    }
                });
                return self.fail("An error happened when reordering the column", e);
            }
        }
        if !plan.is_empty() {
            log::info!(
                "[taskboard.engine] Rebalanced {} tasks in {}",
                plan.len(),
                column_id
            );
        }
        Ok(plan.len())
    }
}

/// Point every task at the column it was delivered in.
fn normalize(project_id: i64, mut columns: Vec<Column>) -> Board {
    for column in &mut columns {
        for task in &mut column.tasks {
            task.related_column = column.id;
        }
    }
    Board::new(project_id, columns)
}

/// Undo a failed task move. When nothing else happened since the drag
/// started the snapshot goes back wholesale; otherwise only the moved task
/// returns to its old column and score.
fn rollback_task_move(store: &mut BoardStore, m: &TaskMove, applied_revision: u64) {
    if store.revision() == applied_revision && applied_revision == m.snapshot_revision + 1 {
        let _ = store.dispatch(Action::BoardRestored {
            board: m.snapshot.clone(),
        });
        return;
    }
    let Some(original) = m.snapshot.task(m.task_id) else {
        return;
    };
    let board = store.board();
    if board.task(m.task_id).is_some() && board.column(original.related_column).is_some() {
        let _ = store.dispatch(Action::TaskMoved {
            task_id: m.task_id,
            column_id: original.related_column,
            score: original.score,
        });
    }
}

/// Write `task`'s fields over the board's copy, keeping the board's
/// column and score.
fn merge_task(store: &mut BoardStore, task_id: TaskId, mut task: Task) {
    let Some(current) = store.board().task(task_id) else {
        return;
    };
    task.id = task_id;
    task.score = current.score;
    task.related_column = current.related_column;
    let _ = store.dispatch(Action::TaskUpdated { task });
}

/// `(task, old score, new score)` for every task, in the order the moves
/// are sent. Each new score lies outside the column's current range, so the
/// display order holds after any prefix of the moves.
fn rebalance_plan(
    board: &Board,
    column_id: ColumnId,
    scoring: &ScoringConfig,
) -> Result<Vec<(TaskId, f64, f64)>, BoardError> {
    let column = board
        .column(column_id)
        .ok_or(BoardError::ColumnNotFound(column_id))?;
    if column.is_not_persisted {
        return Err(BoardError::ColumnNotPersisted(column_id));
    }
    let sorted = column.sorted_tasks();
    if let Some(t) = sorted.iter().find(|t| t.id.is_temporary()) {
        return Err(BoardError::TaskNotPersisted(t.id));
    }
    let scores: Vec<f64> = sorted.iter().map(|t| t.score).collect();
    if !scoring.needs_rebalance(&scores) {
        return Ok(Vec::new());
    }
    let lowest = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let highest = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spaced = scoring.rebalanced_task_scores(sorted.len());
    let pair_up = |new: Vec<f64>| -> Vec<(TaskId, f64, f64)> {
        sorted
            .iter()
            .zip(new)
            .map(|(t, new)| (t.id, t.score, new))
            .collect()
    };

    if spaced.iter().all(|s| *s > highest) {
        // Top task first.
        return Ok(pair_up(spaced));
    }
    let below = if spaced.iter().all(|s| *s < lowest) {
        spaced
    } else {
        (0..sorted.len())
            .map(|i| lowest - scoring.step * (i + 1) as f64)
            .collect()
    };
    // Bottom task first.
    let mut plan = pair_up(below);
    plan.reverse();
    Ok(plan)
}
