//! JSON shapes of the REST backend and their conversion to board types.
//!
//! Responses nest the owning column as `relatedColumn: {id}` and call
//! labels `tags` in some payloads. Single-task responses may leave out the
//! score and send `relatedColumn` as an empty object. Requests send scores as integers when
//! they are whole, since the server types them as `int`.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use taskboard_core::types::{LabelRef, UserRef};
use taskboard_core::{
    Column, ColumnId, ColumnRequest, MoveTaskRequest, PersistenceError, Priority, SavedTask, Task,
    TaskDraft, TaskId,
};

/// Whole scores go out as JSON integers, anything else as a float.
pub fn serialize_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if score.fract() == 0.0 && score.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*score as i64)
    } else {
        serializer.serialize_f64(*score)
    }
}

fn serialize_optional_score<S: Serializer>(
    score: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match score {
        Some(score) => serialize_score(score, serializer),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireRef {
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    #[serde(default, alias = "tags")]
    pub labels: Vec<LabelRef>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub related_column: Option<WireRef>,
}

impl WireTask {
    /// Convert a create or update response. Placement the server left out
    /// stays `None`.
    pub fn into_saved(self) -> Result<SavedTask, PersistenceError> {
        if let Some(score) = self.score {
            if !score.is_finite() {
                return Err(PersistenceError::Decode(format!(
                    "task {} has an invalid score",
                    self.id
                )));
            }
        }
        Ok(SavedTask {
            id: TaskId(self.id),
            name: self.name,
            description: self.description.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            assignees: self.assignees,
            labels: self.labels,
            due_at: self.due_at,
            score: self.score,
            related_column: self.related_column.and_then(|c| c.id).map(ColumnId),
        })
    }

    /// Convert a task listed inside `column`. The enclosing column wins over
    /// `relatedColumn`; a missing score counts as 0.
    pub fn into_task(self, column: ColumnId) -> Result<Task, PersistenceError> {
        let saved = self.into_saved()?;
        Ok(Task {
            id: saved.id,
            name: saved.name,
            description: saved.description,
            priority: saved.priority,
            assignees: saved.assignees,
            labels: saved.labels,
            due_at: saved.due_at,
            score: saved.score.unwrap_or(0.0),
            related_column: column,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireColumn {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub tasks: Vec<WireTask>,
}

impl WireColumn {
    pub fn into_column(self) -> Result<Column, PersistenceError> {
        let id = ColumnId(self.id);
        let score = self.score.unwrap_or(0.0);
        if !score.is_finite() {
            return Err(PersistenceError::Decode(format!("{} has an invalid score", id)));
        }
        let mut column = Column::new(id, self.name, score);
        column.tasks = self
            .tasks
            .into_iter()
            .map(|t| t.into_task(id))
            .collect::<Result<_, _>>()?;
        Ok(column)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskBody {
    pub id: i64,
    pub column_id: i64,
    #[serde(serialize_with = "serialize_score")]
    pub score: f64,
}

impl From<&MoveTaskRequest> for MoveTaskBody {
    fn from(request: &MoveTaskRequest) -> Self {
        Self {
            id: request.task_id.0,
            column_id: request.column_id.0,
            score: request.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnBody {
    pub name: String,
    #[serde(
        serialize_with = "serialize_optional_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<f64>,
}

impl From<&ColumnRequest> for ColumnBody {
    fn from(request: &ColumnRequest) -> Self {
        Self {
            name: request.name.clone(),
            score: request.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBody {
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub project_id: i64,
    pub assignees_ids: Vec<i64>,
    pub labels_ids: Vec<i64>,
    pub due_at: Option<DateTime<Utc>>,
}

impl TaskBody {
    pub fn new(project_id: i64, draft: &TaskDraft) -> Self {
        Self {
            name: draft.name.trim().to_string(),
            description: draft.description.clone(),
            priority: draft.priority,
            project_id,
            assignees_ids: draft.assignee_ids.clone(),
            labels_ids: draft.label_ids.clone(),
            due_at: draft.due_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_columns_response_decodes() {
        let raw = json!([
            {
                "id": 3,
                "name": "Todo",
                "score": 100.0,
                "tasks": [{
                    "id": 7,
                    "name": "Write docs",
                    "description": null,
                    "priority": "high",
                    "assignees": [{"id": 1, "name": "Sam"}],
                    "tags": [{"id": 2, "name": "docs"}],
                    "dueAt": "2025-03-01T09:00:00+00:00",
                    "createdAt": "2025-02-01T09:00:00+00:00",
                    "score": 250,
                    "relatedColumn": {"id": 3}
                }]
            },
            {"id": 4, "name": "Done", "score": 200, "color": "#fff"}
        ]);
        let columns: Vec<WireColumn> = serde_json::from_value(raw).unwrap();
        let columns: Vec<Column> = columns
            .into_iter()
            .map(WireColumn::into_column)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(columns.len(), 2);
        let task = &columns[0].tasks[0];
        assert_eq!(task.related_column, ColumnId(3));
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.description, "");
        assert_eq!(task.labels[0].name, "docs");
        assert_eq!(task.score, 250.0);
        assert!(task.due_at.is_some());
        assert!(columns[1].tasks.is_empty());
    }

    #[test]
    fn test_saved_task_without_placement_decodes() {
        // Shape of a create or update response: no score, empty relatedColumn.
        let raw = json!({
            "id": 31,
            "name": "Release notes",
            "description": "",
            "priority": "low",
            "assignees": [],
            "tags": [{"id": 2, "name": "docs"}],
            "dueAt": null,
            "relatedColumn": {}
        });
        let wire: WireTask = serde_json::from_value(raw).unwrap();
        let saved = wire.into_saved().unwrap();
        assert_eq!(saved.id, TaskId(31));
        assert_eq!(saved.score, None);
        assert_eq!(saved.related_column, None);
        assert_eq!(saved.labels[0].name, "docs");

        let raw = json!({"id": 7, "name": "x", "score": 40, "relatedColumn": {"id": 3}});
        let saved = serde_json::from_value::<WireTask>(raw)
            .unwrap()
            .into_saved()
            .unwrap();
        assert_eq!(saved.score, Some(40.0));
        assert_eq!(saved.related_column, Some(ColumnId(3)));
    }

    #[test]
    fn test_listed_task_without_score_decodes() {
        let raw = json!({"id": 7, "name": "x", "relatedColumn": {}});
        let wire: WireTask = serde_json::from_value(raw).unwrap();
        let task = wire.into_task(ColumnId(4)).unwrap();
        assert_eq!(task.score, 0.0);
        assert_eq!(task.related_column, ColumnId(4));
    }

    #[test]
    fn test_whole_scores_serialize_as_integers() {
        let body = MoveTaskBody {
            id: 1,
            column_id: 2,
            score: 300.0,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"id":1,"columnId":2,"score":300}"#
        );
        let body = ColumnBody {
            name: "Done".into(),
            score: Some(-100.0),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "Done", "score": -100})
        );
        let body = ColumnBody {
            name: "Done".into(),
            score: Some(12.5),
        };
        assert_eq!(serde_json::to_value(&body).unwrap()["score"], json!(12.5));
    }

    #[test]
    fn test_task_body_field_names() {
        let draft = TaskDraft {
            assignee_ids: vec![3],
            ..TaskDraft::named(" Fix login ")
        };
        let value = serde_json::to_value(TaskBody::new(5, &draft)).unwrap();
        assert_eq!(value["name"], "Fix login");
        assert_eq!(value["projectId"], 5);
        assert_eq!(value["assigneesIds"], json!([3]));
        assert_eq!(value["labelsIds"], json!([]));
        assert_eq!(value["priority"], "medium");
        assert_eq!(value["dueAt"], serde_json::Value::Null);
    }
}
