use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use tracing::warn;

use crate::app::rejection;
use crate::auth::repo_types::Session;
use crate::records::StoreError;
use crate::state::AppState;

/// Resolves the persisted session, rejecting with 401 when nobody is logged in.
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Session::current(&state.store).await {
            Ok(Some(session)) => Ok(CurrentSession(session)),
            Ok(None) => {
                warn!("request without session");
                Err(rejection(StoreError::NoUserLoggedIn))
            }
            Err(e) => Err(rejection(e)),
        }
    }
}
