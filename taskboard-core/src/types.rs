//! Board data model: columns holding score-ordered tasks.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column identifier. Server ids are positive; ids minted locally for
/// not-yet-persisted columns are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(pub i64);

/// Task identifier. Same sign convention as [`ColumnId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl ColumnId {
    pub fn is_temporary(self) -> bool {
        self.0 < 0
    }
}

impl TaskId {
    pub fn is_temporary(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column-{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub related_column: ColumnId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub score: f64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_not_persisted: bool,
}

impl Column {
    pub fn new(id: ColumnId, name: impl Into<String>, score: f64) -> Self {
        Self {
            id,
            name: name.into(),
            score,
            tasks: Vec::new(),
            is_not_persisted: false,
        }
    }

    /// Tasks in display order: highest score first, ties in insertion order.
    pub fn sorted_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by(|a, b| b.score.total_cmp(&a.score));
        tasks
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn contains_task(&self, task_id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == task_id)
    }
}

/// All columns of one project, as held by the client view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub project_id: i64,
    pub columns: Vec<Column>,
}

impl Board {
    pub fn new(project_id: i64, columns: Vec<Column>) -> Self {
        Self {
            project_id,
            columns,
        }
    }

    /// Columns in display order: lowest score first, ties in insertion order.
    pub fn sorted_columns(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.iter().collect();
        columns.sort_by(|a, b| a.score.total_cmp(&b.score));
        columns
    }

    pub fn column(&self, column_id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn column_mut(&mut self, column_id: ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == column_id)
    }

    /// Column currently holding the task.
    pub fn column_of(&self, task_id: TaskId) -> Option<&Column> {
        self.columns.iter().find(|c| c.contains_task(task_id))
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.columns.iter().find_map(|c| c.task(task_id))
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Check that every task points at the column that holds it and that
    /// every score is finite. Returns the first offending task, if any.
    pub fn find_inconsistency(&self) -> Option<String> {
        for column in &self.columns {
            if !column.score.is_finite() {
                return Some(format!("{} has a non-finite score", column.id));
            }
            for task in &column.tasks {
                if task.related_column != column.id {
                    return Some(format!(
                        "{} sits in {} but references {}",
                        task.id, column.id, task.related_column
                    ));
                }
                if !task.score.is_finite() {
                    return Some(format!("{} has a non-finite score", task.id));
                }
            }
        }
        None
    }

    /// Past its due date and not yet in the last (highest-scored) column.
    pub fn is_overdue(&self, task: &Task, now: DateTime<Utc>) -> bool {
        let Some(due_at) = task.due_at else {
            return false;
        };
        let Some(column) = self.column(task.related_column) else {
            return false;
        };
        let last = self
            .columns
            .iter()
            .map(|c| c.score)
            .fold(f64::NEG_INFINITY, f64::max);
        due_at < now && column.score < last
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_sorted_tasks_descending() {
        let board = board(vec![(1, "Todo", 0.0, vec![(1, 100.0), (2, 300.0), (3, 200.0)])]);
        let ids: Vec<i64> = board.columns[0].sorted_tasks().iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_sorted_columns_ascending_with_stable_ties() {
        let board = board(vec![
            (1, "Done", 1000.0, vec![]),
            (2, "Backlog", 0.0, vec![]),
            (3, "Review", 1000.0, vec![]),
        ]);
        let names: Vec<&str> = board.sorted_columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Backlog", "Done", "Review"]);
    }

    #[test]
    fn test_column_of() {
        let board = board(vec![(1, "A", 0.0, vec![(10, 1.0)]), (2, "B", 1.0, vec![(20, 1.0)])]);
        assert_eq!(board.column_of(TaskId(20)).map(|c| c.id), Some(ColumnId(2)));
        assert!(board.column_of(TaskId(99)).is_none());
    }

    #[test]
    fn test_find_inconsistency() {
        let mut board = board(vec![(1, "A", 0.0, vec![(10, 1.0)])]);
        assert!(board.find_inconsistency().is_none());
        board.columns[0].tasks[0].related_column = ColumnId(7);
        assert!(board.find_inconsistency().is_some());
    }

    #[test]
    fn test_overdue_except_in_last_column() {
        let now = "2025-03-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let past = "2025-03-01T09:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut board = board(vec![
            (1, "Todo", 0.0, vec![(10, 1.0), (11, 2.0)]),
            (2, "Done", 1000.0, vec![(20, 1.0)]),
        ]);
        board.columns[0].tasks[0].due_at = Some(past);
        board.columns[0].tasks[1].due_at = Some(now + chrono::Duration::days(1));
        board.columns[1].tasks[0].due_at = Some(past);

        assert!(board.is_overdue(&board.columns[0].tasks[0], now));
        assert!(!board.is_overdue(&board.columns[0].tasks[1], now));
        assert!(!board.is_overdue(&board.columns[1].tasks[0], now));
        assert!(!board.is_overdue(&task(12, 1, 3.0), now));
    }

    #[test]
    fn test_priority_wire_format() {
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"urgent\"");
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("soon".parse::<Priority>().is_err());
    }

    #[test]
    fn test_column_json_shape() {
        let json = r#"{"id":3,"name":"Doing","score":500,"tasks":[
            {"id":9,"name":"Write docs","description":"","priority":"low",
             "assignees":[{"id":1,"name":"Ann"}],"labels":[],"dueAt":null,
             "score":200,"relatedColumn":3}]}"#;
        let column: Column = serde_json::from_str(json).unwrap();
        assert_eq!(column.id, ColumnId(3));
        assert!(!column.is_not_persisted);
        assert_eq!(column.tasks[0].priority, Priority::Low);
        assert_eq!(column.tasks[0].related_column, ColumnId(3));
    }
}
