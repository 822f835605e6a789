pub mod auth;
pub mod error;
pub mod extract;
pub mod likes;
pub mod messages;
pub mod middleware;
pub mod users;
pub mod views;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tracing::error;

use warbler_db::{Database, DbError};

use crate::auth::AppState;
use crate::error::ApiError;

/// Build the full API router: public auth routes plus everything behind
/// bearer-token auth.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/timeline", get(messages::timeline))
        .route("/users", get(users::list_users))
        .route("/users/me", patch(users::edit_profile).delete(users::delete_me))
        .route("/users/{user_id}", get(users::show_user))
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/likes", get(users::show_likes))
        .route("/users/{user_id}/follow", post(users::follow).delete(users::unfollow))
        .route("/messages", post(messages::create_message))
        .route(
            "/messages/{message_id}",
            get(messages::show_message).delete(messages::delete_message),
        )
        .route("/messages/{message_id}/like", post(likes::toggle_like))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Run a blocking database call off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
