use serde::Deserialize;

use crate::tasks::repo_types::{NewTask, Priority};

/// Request body for task creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: String,
    #[serde(default)]
    pub priority: Priority,
    pub category_id: Option<i64>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(r: CreateTaskRequest) -> Self {
        Self {
            title: r.title,
            description: r.description,
            due_date: r.due_date,
            priority: r.priority,
            category_id: r.category_id,
        }
    }
}
