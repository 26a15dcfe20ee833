//! Drag sessions: collision detection and drop resolution.
//!
//! A session turns a pointer or keyboard gesture into at most one move.
//! The board itself is never touched here; the resolved [`DragOutcome`]
//! is handed to the engine.
use serde::{Deserialize, Serialize};

use crate::reducer::BoardState;
use crate::scoring::ScoringConfig;
use crate::types::{Board, ColumnId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right() && p.y >= self.top && p.y <= self.bottom()
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.left.max(other.left);
        let h = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }

    /// Top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.top),
            Point::new(self.right(), self.top),
            Point::new(self.left, self.bottom()),
            Point::new(self.right(), self.bottom()),
        ]
    }
}

/// Something that can be dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum Draggable {
    Task(TaskId),
    Column(ColumnId),
}

/// Something that can be dropped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum Droppable {
    /// A task card; the dragged task is inserted before it.
    Task(TaskId),
    /// Empty space at the column level; inserts at the top.
    Column(ColumnId),
    /// Column body with no card hovered; appends at the bottom.
    ColumnBody(ColumnId),
}

impl Droppable {
    pub fn is_column_zone(&self) -> bool {
        matches!(self, Droppable::Column(_) | Droppable::ColumnBody(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DroppableRegion {
    pub id: Droppable,
    pub rect: Rect,
}

/// Regions containing the pointer, closest first (mean distance to corners).
pub fn pointer_within(pointer: Point, regions: &[DroppableRegion]) -> Vec<Droppable> {
    let mut hits: Vec<(f64, Droppable)> = regions
        .iter()
        .filter(|r| r.rect.contains(pointer))
        .map(|r| {
            let d = r.rect.corners().iter().map(|c| c.distance(pointer)).sum::<f64>() / 4.0;
            (d, r.id)
        })
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.into_iter().map(|(_, id)| id).collect()
}

/// Regions overlapping `dragged`, largest intersection-over-union first.
pub fn rect_intersection(dragged: &Rect, regions: &[DroppableRegion]) -> Vec<Droppable> {
    let mut hits: Vec<(f64, Droppable)> = regions
        .iter()
        .filter_map(|r| {
            let overlap = dragged.intersection_area(&r.rect);
            if overlap <= 0.0 {
                return None;
            }
            let union = dragged.area() + r.rect.area() - overlap;
            Some((overlap / union, r.id))
        })
        .collect();
    hits.sort_by(|a, b| b.0.total_cmp(&a.0));
    hits.into_iter().map(|(_, id)| id).collect()
}

/// All regions, nearest first by mean distance between matching corners.
pub fn closest_corners(dragged: &Rect, regions: &[DroppableRegion]) -> Vec<Droppable> {
    let ours = dragged.corners();
    let mut hits: Vec<(f64, Droppable)> = regions
        .iter()
        .map(|r| {
            let theirs = r.rect.corners();
            let d = ours
                .iter()
                .zip(theirs.iter())
                .map(|(a, b)| a.distance(*b))
                .sum::<f64>()
                / 4.0;
            (d, r.id)
        })
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.into_iter().map(|(_, id)| id).collect()
}

/// Pick the drop target for one frame.
///
/// Pointer containment wins. A dragged task that is over nothing falls back
/// to column zones only, so gaps between cards do not flicker. Everything
/// else uses nearest corners. `pointer` is `None` for keyboard drags.
pub fn detect_collision(
    active: Draggable,
    pointer: Option<Point>,
    dragged: &Rect,
    regions: &[DroppableRegion],
) -> Option<Droppable> {
    if let Some(pointer) = pointer {
        if let Some(hit) = pointer_within(pointer, regions).into_iter().next() {
            return Some(hit);
        }
    }
    if let Draggable::Task(_) = active {
        let columns: Vec<DroppableRegion> = regions
            .iter()
            .filter(|r| r.id.is_column_zone())
            .copied()
            .collect();
        if let Some(hit) = rect_intersection(dragged, &columns).into_iter().next() {
            return Some(hit);
        }
    }
    closest_corners(dragged, regions).into_iter().next()
}

/// A resolved task move, ready for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMove {
    pub task_id: TaskId,
    pub source: ColumnId,
    pub destination: ColumnId,
    /// Slot in the destination's display order, moved task excluded.
    pub index: usize,
    pub score: f64,
    /// Board as it was when the drag started.
    pub snapshot: Board,
    pub snapshot_revision: u64,
}

/// A resolved column move.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMove {
    pub column_id: ColumnId,
    pub index: usize,
    pub score: f64,
    pub previous_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Dropped outside every target: put the snapshot back.
    Cancelled {
        snapshot: Board,
        snapshot_revision: u64,
    },
    /// Dropped where it already was.
    NoOp,
    MoveTask(TaskMove),
    MoveColumn(ColumnMove),
}

/// One drag gesture from pick-up to drop.
#[derive(Debug, Clone)]
pub struct DragSession {
    active: Draggable,
    snapshot: Board,
    snapshot_revision: u64,
    over: Option<Droppable>,
}

impl DragSession {
    /// Start dragging `active`, capturing the board for rollback.
    pub fn start(state: &BoardState, active: Draggable) -> Self {
        log::debug!("[taskboard.drag] start {:?}", active);
        Self {
            active,
            snapshot: state.board.clone(),
            snapshot_revision: state.revision,
            over: None,
        }
    }

    pub fn active(&self) -> Draggable {
        self.active
    }

    /// Active task id, when a task is being dragged.
    pub fn active_task(&self) -> Option<TaskId> {
        match self.active {
            Draggable::Task(id) => Some(id),
            Draggable::Column(_) => None,
        }
    }

    pub fn snapshot(&self) -> &Board {
        &self.snapshot
    }

    pub fn over(&self) -> Option<Droppable> {
        self.over
    }

    /// Run collision detection for one pointer-move frame.
    pub fn hover(
        &mut self,
        pointer: Option<Point>,
        dragged: &Rect,
        regions: &[DroppableRegion],
    ) -> Option<Droppable> {
        self.over = detect_collision(self.active, pointer, dragged, regions);
        self.over
    }

    /// Set the target directly (keyboard navigation, tests).
    pub fn set_over(&mut self, over: Option<Droppable>) {
        self.over = over;
    }

    /// End the gesture and resolve it against the current board.
    pub fn finish(self, board: &Board, scoring: &ScoringConfig) -> DragOutcome {
        let outcome = match (self.active, self.over) {
            (_, None) => None,
            (Draggable::Task(task_id), Some(over)) => resolve_task_drop(
                board,
                task_id,
                over,
                scoring,
                &self.snapshot,
                self.snapshot_revision,
            ),
            (Draggable::Column(column_id), Some(over)) => {
                resolve_column_drop(board, column_id, over, scoring)
            }
        };
        match outcome {
            Some(outcome) => outcome,
            None => {
                log::debug!("[taskboard.drag] {:?} dropped outside any target", self.active);
                DragOutcome::Cancelled {
                    snapshot: self.snapshot,
                    snapshot_revision: self.snapshot_revision,
                }
            }
        }
    }
}

/// `None` means the target no longer resolves to a column.
fn resolve_task_drop(
    board: &Board,
    task_id: TaskId,
    over: Droppable,
    scoring: &ScoringConfig,
    snapshot: &Board,
    snapshot_revision: u64,
) -> Option<DragOutcome> {
    if over == Droppable::Task(task_id) {
        return Some(DragOutcome::NoOp);
    }
    let source = board.column_of(task_id)?.id;
    let destination = match over {
        Droppable::Task(hovered) => board.column_of(hovered)?,
        Droppable::Column(id) | Droppable::ColumnBody(id) => board.column(id)?,
    };

    let sorted = destination.sorted_tasks();
    let current = sorted.iter().position(|t| t.id == task_id);
    let siblings: Vec<f64> = sorted
        .iter()
        .filter(|t| t.id != task_id)
        .map(|t| t.score)
        .collect();

    let mut index = match over {
        Droppable::Task(hovered) => {
            let hovered_at = sorted
                .iter()
                .position(|t| t.id == hovered)
                .unwrap_or(sorted.len());
            match current {
                // Removing the moved task shifts everything below it up.
                Some(c) if c < hovered_at => hovered_at - 1,
                _ => hovered_at,
            }
        }
        Droppable::Column(_) => 0,
        Droppable::ColumnBody(_) => siblings.len(),
    };
    index = index.min(siblings.len());

    if current == Some(index) {
        return Some(DragOutcome::NoOp);
    }

    let score = scoring.task_score(&siblings, index);
    log::debug!(
        "[taskboard.drag] {} -> {} slot {} score {}",
        task_id,
        destination.id,
        index,
        score
    );
    Some(DragOutcome::MoveTask(TaskMove {
        task_id,
        source,
        destination: destination.id,
        index,
        score,
        snapshot: snapshot.clone(),
        snapshot_revision,
    }))
}

/// Columns take the hovered column's slot.
fn resolve_column_drop(
    board: &Board,
    column_id: ColumnId,
    over: Droppable,
    scoring: &ScoringConfig,
) -> Option<DragOutcome> {
    let moving = board.column(column_id)?;
    let target = match over {
        Droppable::Task(hovered) => board.column_of(hovered)?.id,
        Droppable::Column(id) | Droppable::ColumnBody(id) => board.column(id)?.id,
    };
    if target == column_id {
        return Some(DragOutcome::NoOp);
    }
    let sorted = board.sorted_columns();
    let index = sorted.iter().position(|c| c.id == target)?;
    let siblings: Vec<f64> = sorted
        .iter()
        .filter(|c| c.id != column_id)
        .map(|c| c.score)
        .collect();
    let score = scoring.column_score(&siblings, index);
    Some(DragOutcome::MoveColumn(ColumnMove {
        column_id,
        index,
        score,
        previous_score: moving.score,
    }))
}
