//! Typed board actions.
//!
//! Every change to the in-memory board goes through one of these values.
//! On the wire they look like `{"type": "task.moved", "payload": {...}}`.
use serde::{Deserialize, Serialize};

use crate::types::{Board, Column, ColumnId, Task, TaskId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
    /// Replace the whole board with freshly fetched data.
    #[serde(rename = "board.loaded")]
    BoardLoaded { board: Board },

    /// Put back a snapshot taken before a risky operation.
    #[serde(rename = "board.restored")]
    BoardRestored { board: Board },

    #[serde(rename = "task.moved", rename_all = "camelCase")]
    TaskMoved {
        task_id: TaskId,
        column_id: ColumnId,
        score: f64,
    },

    /// Insert a task into its column, or replace it when the id is known.
    #[serde(rename = "task.created")]
    TaskCreated { task: Task },

    #[serde(rename = "task.updated")]
    TaskUpdated { task: Task },

    /// Swap a locally created task for the one returned by the server.
    #[serde(rename = "task.confirmed", rename_all = "camelCase")]
    TaskConfirmed { temporary_id: TaskId, task: Task },

    #[serde(rename = "task.deleted", rename_all = "camelCase")]
    TaskDeleted { task_id: TaskId },

    /// Insert a not-yet-persisted column with a local id.
    #[serde(rename = "column.staged", rename_all = "camelCase")]
    ColumnStaged {
        column_id: ColumnId,
        name: String,
        score: f64,
    },

    /// The server accepted a staged column.
    #[serde(rename = "column.created", rename_all = "camelCase")]
    ColumnCreated {
        temporary_id: ColumnId,
        column: Column,
    },

    /// Drop a staged column that will not be saved.
    #[serde(rename = "column.discarded", rename_all = "camelCase")]
    ColumnDiscarded { column_id: ColumnId },

    #[serde(rename = "column.renamed", rename_all = "camelCase")]
    ColumnRenamed { column_id: ColumnId, name: String },

    #[serde(rename = "column.moved", rename_all = "camelCase")]
    ColumnMoved { column_id: ColumnId, score: f64 },

    #[serde(rename = "column.deleted", rename_all = "camelCase")]
    ColumnDeleted { column_id: ColumnId },
}

impl Action {
    /// Wire name of the action, e.g. `task.moved`.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::BoardLoaded { .. } => "board.loaded",
            Action::BoardRestored { .. } => "board.restored",
            Action::TaskMoved { .. } => "task.moved",
            Action::TaskCreated { .. } => "task.created",
            Action::TaskUpdated { .. } => "task.updated",
            Action::TaskConfirmed { .. } => "task.confirmed",
            Action::TaskDeleted { .. } => "task.deleted",
            Action::ColumnStaged { .. } => "column.staged",
            Action::ColumnCreated { .. } => "column.created",
            Action::ColumnDiscarded { .. } => "column.discarded",
            Action::ColumnRenamed { .. } => "column.renamed",
            Action::ColumnMoved { .. } => "column.moved",
            Action::ColumnDeleted { .. } => "column.deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_moved_wire_shape() {
        let action = Action::TaskMoved {
            task_id: TaskId(4),
            column_id: ColumnId(2),
            score: 300.0,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "task.moved");
        assert_eq!(json["payload"]["taskId"], 4);
        assert_eq!(json["payload"]["columnId"], 2);
        assert_eq!(action.kind(), "task.moved");
    }

    #[test]
    fn test_unknown_action_rejected() {
        let raw = r#"{"type":"task.teleported","payload":{"taskId":1}}"#;
        assert!(serde_json::from_str::<Action>(raw).is_err());
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let raw = r#"{"type":"column.renamed","payload":{"columnId":"three"}}"#;
        assert!(serde_json::from_str::<Action>(raw).is_err());
    }

    #[test]
    fn test_parse_column_deleted() {
        let raw = r#"{"type":"column.deleted","payload":{"columnId":7}}"#;
        let action: Action = serde_json::from_str(raw).unwrap();
        assert_eq!(
            action,
            Action::ColumnDeleted {
                column_id: ColumnId(7)
            }
        );
    }
}
