use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use warbler_db::DEFAULT_PAGE_SIZE;
use warbler_types::api::Claims;
use warbler_types::forms::{MessageForm, Validate};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::run_db;
use crate::views::message_views;

/// GET /timeline — the caller's messages and those of everyone they follow.
pub async fn timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let messages = run_db(&state, move |db| {
        let rows = db.home_timeline(&uid, DEFAULT_PAGE_SIZE)?;
        message_views(db, &uid, rows)
    })
    .await?;

    Ok(Json(messages))
}

pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(form): JsonBody<MessageForm>,
) -> Result<impl IntoResponse, ApiError> {
    form.validate()?;

    let uid = claims.sub.to_string();
    let mut messages = run_db(&state, move |db| {
        let row = db.create_message(&uid, &form.text)?;
        message_views(db, &uid, vec![row])
    })
    .await?;

    let message = messages.pop().ok_or(ApiError::Internal)?;
    info!("User {} posted message {}", claims.username, message.id);

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn show_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let mid = message_id.to_string();
    let viewer = claims.sub.to_string();
    let mut messages = run_db(&state, move |db| {
        let rows: Vec<_> = db.get_message(&mid)?.into_iter().collect();
        message_views(db, &viewer, rows)
    })
    .await?;

    let message = messages.pop().ok_or(ApiError::NotFound)?;
    Ok(Json(message))
}

/// DELETE /messages/{message_id} — only the author may delete.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let mid = message_id.to_string();
    let uid = claims.sub.to_string();

    let owned = run_db(&state, move |db| {
        let Some(message) = db.get_message(&mid)? else {
            return Ok(None);
        };
        if message.user_id != uid {
            return Ok(Some(false));
        }
        db.delete_message(&mid)?;
        Ok(Some(true))
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    if !owned {
        return Err(ApiError::Forbidden("not your message".into()));
    }

    Ok(StatusCode::NO_CONTENT)
}
