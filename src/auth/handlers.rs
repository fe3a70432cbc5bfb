use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    app::rejection,
    auth::{
        dto::{LoginRequest, RegisterRequest},
        extractors::CurrentSession,
        repo_types::{PublicUser, Session, User},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    if !payload.is_complete() {
        warn!("register with empty fields");
        return Err((StatusCode::BAD_REQUEST, "Please fill in all fields".into()));
    }

    let user = User::register(&state.store, &payload.email, &payload.password)
        .await
        .map_err(rejection)?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Session>, (StatusCode, String)> {
    if !payload.is_complete() {
        warn!("login with empty fields");
        return Err((StatusCode::BAD_REQUEST, "Please fill in all fields".into()));
    }

    match User::validate(&state.store, &payload.email, &payload.password).await {
        Ok(Some(session)) => {
            info!(user_id = session.id, "login ok");
            Ok(Json(session))
        }
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into())),
        Err(e) => Err(rejection(e)),
    }
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    Session::logout(&state.store).await.map_err(rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(_state))]
pub async fn get_me(
    State(_state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Json<Session> {
    Json(session)
}
