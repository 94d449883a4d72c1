use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskTypeID = i64;
pub type CategoryID = i64;

/// A referenced document reduced to its id and display name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskType {
    pub id: TaskTypeID,
    pub name: String,
}

/// A category under a task type. `T` is either the bare type id or the
/// populated `NamedRef`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Category<T = TaskTypeID> {
    pub id: CategoryID,
    pub name: String,
    pub description: Option<String>,
    pub task_type: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<serde_json::Value>,
}
