use tracing::{info, warn};

use crate::auth::repo_types::Session;
use crate::categories::repo_types::Category;
use crate::records::{RecordStore, StoreError, StoreResult, CATEGORIES, TASKS};
use crate::tasks::repo_types::{NewTask, Task, TaskStatus, TaskUpdate, TaskView};
use crate::tasks::services::{format_due_date, now_iso, sort_by_due_date};

fn require_title(title: &str) -> StoreResult<()> {
    if title.trim().is_empty() {
        warn!("task without title");
        return Err(StoreError::InvalidInput("title is required".into()));
    }
    Ok(())
}

impl Task {
    /// Appends a pending task owned by the session's user.
    pub async fn create(store: &RecordStore, session: &Session, new: NewTask) -> StoreResult<Task> {
        let owner = Session::require(store, session).await?;
        require_title(&new.title)?;

        let _guard = store.lock(TASKS).await;
        let mut tasks: Vec<Task> = store.load(TASKS).await?;
        let floor = tasks.iter().map(|t| t.id).max().unwrap_or(0);
        let task = Task {
            id: store.next_id(floor),
            user_id: owner.id,
            title: new.title,
            description: new.description,
            due_date: new.due_date,
            status: TaskStatus::Pending,
            priority: new.priority,
            category_id: new.category_id,
            created_at: now_iso(),
            updated_at: None,
        };
        tasks.push(task.clone());
        store.save(TASKS, &tasks).await?;

        info!(task_id = task.id, user_id = task.user_id, "task created");
        Ok(task)
    }

    /// All tasks of `user_id` with their category resolved, ascending by due date.
    pub async fn list_for_user(store: &RecordStore, user_id: i64) -> StoreResult<Vec<TaskView>> {
        let tasks: Vec<Task> = store.load(TASKS).await?;
        let categories: Vec<Category> = store.load(CATEGORIES).await?;

        let mut views: Vec<TaskView> = tasks
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .map(|task| {
                let category = task
                    .category_id
                    .and_then(|id| categories.iter().find(|c| c.id == id).cloned());
                let due_label = format_due_date(&task.due_date);
                TaskView {
                    task,
                    category,
                    due_label,
                }
            })
            .collect();
        sort_by_due_date(&mut views);
        Ok(views)
    }

    pub async fn find(store: &RecordStore, task_id: i64) -> StoreResult<Option<Task>> {
        let tasks: Vec<Task> = store.load(TASKS).await?;
        Ok(tasks.into_iter().find(|t| t.id == task_id))
    }

    /// Merges `update` onto the task and refreshes `updatedAt`.
    pub async fn update(store: &RecordStore, task_id: i64, update: TaskUpdate) -> StoreResult<Task> {
        if let Some(title) = update.title.as_deref() {
            require_title(title)?;
        }

        let _guard = store.lock(TASKS).await;
        let mut tasks: Vec<Task> = store.load(TASKS).await?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
            warn!(task_id, "update of unknown task");
            return Err(StoreError::TaskNotFound(task_id));
        };
        task.apply(update);
        task.updated_at = Some(now_iso());
        let updated = task.clone();
        store.save(TASKS, &tasks).await?;

        info!(task_id, status = ?updated.status, "task updated");
        Ok(updated)
    }

    /// Flips pending and completed.
    pub async fn toggle(store: &RecordStore, task_id: i64) -> StoreResult<Task> {
        let _guard = store.lock(TASKS).await;
        let mut tasks: Vec<Task> = store.load(TASKS).await?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
            return Err(StoreError::TaskNotFound(task_id));
        };
        task.apply(TaskUpdate::status(task.status.toggled()));
        task.updated_at = Some(now_iso());
        let updated = task.clone();
        store.save(TASKS, &tasks).await?;

        info!(task_id, status = ?updated.status, "task toggled");
        Ok(updated)
    }

    /// Removes the task. Absent ids succeed without writing; returns whether
    /// anything was removed.
    pub async fn delete(store: &RecordStore, task_id: i64) -> StoreResult<bool> {
        let _guard = store.lock(TASKS).await;
        let mut tasks: Vec<Task> = store.load(TASKS).await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        if tasks.len() == before {
            return Ok(false);
        }
        store.save(TASKS, &tasks).await?;

        info!(task_id, "task deleted");
        Ok(true)
    }
}
