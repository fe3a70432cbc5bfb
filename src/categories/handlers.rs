use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::instrument;

use crate::{app::rejection, auth::extractors::CurrentSession, state::AppState};

use super::dto::CreateCategoryRequest;
use super::repo_types::Category;

pub fn category_routes() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories).post(create_category))
}

#[instrument(skip(state, _session))]
pub async fn list_categories(
    State(state): State<AppState>,
    _session: CurrentSession,
) -> Result<Json<Vec<Category>>, (StatusCode, String)> {
    let categories = Category::list(&state.store).await.map_err(rejection)?;
    Ok(Json(categories))
}

#[instrument(skip(state, _session, body))]
pub async fn create_category(
    State(state): State<AppState>,
    _session: CurrentSession,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), (StatusCode, String)> {
    let category = Category::create(&state.store, &body.name, &body.color)
        .await
        .map_err(rejection)?;
    Ok((StatusCode::CREATED, Json(category)))
}
