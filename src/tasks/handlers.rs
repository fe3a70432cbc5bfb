use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    app::rejection,
    auth::extractors::CurrentSession,
    notifications::scheduler::NotifyError,
    records::StoreError,
    state::AppState,
};

use super::dto::CreateTaskRequest;
use super::repo_types::{Task, TaskStats, TaskUpdate, TaskView};
use super::services::{stats, TaskQuery};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/stats", get(task_stats))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create_task))
        .route("/tasks/:id", patch(update_task).delete(delete_task))
        .route("/tasks/:id/toggle", post(toggle_task))
}

// --- handlers ---

#[instrument(skip(state, session))]
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<TaskView>>, (StatusCode, String)> {
    let views = Task::list_for_user(&state.store, session.id)
        .await
        .map_err(rejection)?;
    Ok(Json(query.apply(views)))
}

#[instrument(skip(state, session))]
pub async fn task_stats(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<TaskStats>, (StatusCode, String)> {
    let views = Task::list_for_user(&state.store, session.id)
        .await
        .map_err(rejection)?;
    Ok(Json(stats(&views)))
}

#[instrument(skip(state, session, body))]
pub async fn create_task(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Task>), (StatusCode, String)> {
    let task = Task::create(&state.store, &session, body.into())
        .await
        .map_err(rejection)?;
    spawn_reminder(&state, &task);

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/tasks/{}", task.id)) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(task)))
}

#[instrument(skip(state, session, update))]
pub async fn update_task(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, (StatusCode, String)> {
    ensure_owner(&state, session.id, id).await?;
    let task = Task::update(&state.store, id, update)
        .await
        .map_err(rejection)?;
    spawn_reminder(&state, &task);
    Ok(Json(task))
}

#[instrument(skip(state, session))]
pub async fn toggle_task(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
) -> Result<Json<Task>, (StatusCode, String)> {
    ensure_owner(&state, session.id, id).await?;
    let task = Task::toggle(&state.store, id).await.map_err(rejection)?;
    Ok(Json(task))
}

#[instrument(skip(state, session))]
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    match Task::find(&state.store, id).await.map_err(rejection)? {
        Some(task) if task.user_id != session.id => {
            return Err(rejection(StoreError::TaskNotFound(id)));
        }
        _ => {}
    }
    if Task::delete(&state.store, id).await.map_err(rejection)? {
        let notifier = Arc::clone(&state.notifier);
        tokio::spawn(async move { notifier.forget_task(id).await });
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- helpers ---

async fn ensure_owner(state: &AppState, user_id: i64, task_id: i64) -> Result<(), (StatusCode, String)> {
    match Task::find(&state.store, task_id).await.map_err(rejection)? {
        Some(task) if task.user_id == user_id => Ok(()),
        _ => Err(rejection(StoreError::TaskNotFound(task_id))),
    }
}

/// Reminder scheduling never blocks or fails the task write.
fn spawn_reminder(state: &AppState, task: &Task) {
    let notifier = Arc::clone(&state.notifier);
    let (task_id, title, due_date) = (task.id, task.title.clone(), task.due_date.clone());
    tokio::spawn(async move {
        match notifier.schedule_task_reminder(task_id, &title, &due_date).await {
            Ok(reminder_id) => info!(task_id, %reminder_id, "reminder queued"),
            Err(NotifyError::TaskDeleted(_)) => debug!(task_id, "task deleted before its reminder was stored"),
            Err(e) => warn!(task_id, error = %e, "reminder not scheduled"),
        }
    });
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRequestParts;
    use axum::http::Request;

    use super::*;
    use crate::auth::repo_types::{Session, User};
    use crate::notifications::{NotificationScheduler, TokioPlatform};
    use crate::tasks::repo_types::{Priority, TaskStatus};
    use crate::tasks::services::{SortKey, StatusFilter};

    async fn login(state: &AppState, email: &str) -> CurrentSession {
        User::register(&state.store, email, "pw").await.unwrap();
        let session: Session = User::validate(&state.store, email, "pw").await.unwrap().unwrap();
        CurrentSession(session)
    }

    fn body(title: &str, due: &str, priority: Priority) -> Json<CreateTaskRequest> {
        Json(CreateTaskRequest {
            title: title.into(),
            description: String::new(),
            due_date: due.into(),
            priority,
            category_id: None,
        })
    }

    #[tokio::test]
    async fn session_extractor_rejects_when_logged_out() {
        let state = AppState::fake();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let Err((status, msg)) = CurrentSession::from_request_parts(&mut parts, &state).await else {
            panic!("expected rejection");
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "No user logged in");
    }

    #[tokio::test]
    async fn create_list_and_stats() {
        let state = AppState::fake();
        let CurrentSession(session) = login(&state, "ann@example.com").await;

        let (status, headers, Json(task)) = create_task(
            State(state.clone()),
            CurrentSession(session.clone()),
            body("Later", "2024-06-05T00:00:00.000Z", Priority::Low),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            headers.get(LOCATION).unwrap().to_str().unwrap(),
            format!("/api/v1/tasks/{}", task.id)
        );

        create_task(
            State(state.clone()),
            CurrentSession(session.clone()),
            body("Sooner", "2024-06-01T00:00:00.000Z", Priority::High),
        )
        .await
        .unwrap();

        toggle_task(State(state.clone()), CurrentSession(session.clone()), Path(task.id))
            .await
            .unwrap();

        let Json(all) = list_tasks(
            State(state.clone()),
            CurrentSession(session.clone()),
            Query(TaskQuery::default()),
        )
        .await
        .unwrap();
        let titles: Vec<&str> = all.iter().map(|v| v.task.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner", "Later"]);

        let Json(done) = list_tasks(
            State(state.clone()),
            CurrentSession(session.clone()),
            Query(TaskQuery {
                status: StatusFilter::Completed,
                sort: SortKey::Priority,
                ..TaskQuery::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].task.status, TaskStatus::Completed);

        let Json(counts) = task_stats(State(state.clone()), CurrentSession(session)).await.unwrap();
        assert_eq!(
            counts,
            TaskStats {
                total: 2,
                pending: 1,
                completed: 1
            }
        );
    }

    #[tokio::test]
    async fn denied_notifications_do_not_block_task_writes() {
        let base = AppState::fake();
        let muted = Arc::new(NotificationScheduler::new(
            Arc::new(TokioPlatform::new(false)),
            &base.config.notify,
        ));
        let state = AppState::from_parts(base.config.clone(), base.store.clone(), muted);
        let CurrentSession(session) = login(&state, "ann@example.com").await;

        let (status, _, Json(task)) = create_task(
            State(state.clone()),
            CurrentSession(session.clone()),
            body("Quiet", "2024-06-01T00:00:00.000Z", Priority::Medium),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(updated) = update_task(
            State(state.clone()),
            CurrentSession(session),
            Path(task.id),
            Json(TaskUpdate::status(TaskStatus::Completed)),
        )
        .await
        .unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);

        // let the spawned reminder attempts run and fail
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        let stored = Task::find(&state.store, task.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Quiet");
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(state.notifier.reminder_for(task.id), None);
    }

    #[tokio::test]
    async fn other_users_tasks_are_not_found() {
        let state = AppState::fake();
        let CurrentSession(ann) = login(&state, "ann@example.com").await;
        let (_, _, Json(task)) = create_task(
            State(state.clone()),
            CurrentSession(ann),
            body("Mine", "2024-06-01", Priority::Medium),
        )
        .await
        .unwrap();

        let CurrentSession(bob) = login(&state, "bob@example.com").await;
        let (status, _) = update_task(
            State(state.clone()),
            CurrentSession(bob.clone()),
            Path(task.id),
            Json(TaskUpdate::status(TaskStatus::Completed)),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete_task(State(state.clone()), CurrentSession(bob), Path(task.id))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(Task::find(&state.store, task.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_is_no_content_even_when_absent() {
        let state = AppState::fake();
        let CurrentSession(session) = login(&state, "ann@example.com").await;
        let status = delete_task(State(state), CurrentSession(session), Path(12345))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn blank_title_is_bad_request() {
        let state = AppState::fake();
        let CurrentSession(session) = login(&state, "ann@example.com").await;
        let (status, msg) = create_task(
            State(state),
            CurrentSession(session),
            body("  ", "2024-06-01", Priority::Medium),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "title is required");
    }
}
