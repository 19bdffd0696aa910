use axum::{
    extract::{FromRef, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{extractors::AuthUser, services::AccountService},
    error::AuthError,
    state::AppState,
    users::repo_types::User,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/users", get(list_users))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, AuthError> {
    let user = AccountService::from_ref(&state).profile(user_id).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<User>>, AuthError> {
    let users = AccountService::from_ref(&state).list_users(user_id).await?;
    Ok(Json(users))
}
