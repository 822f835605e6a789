use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use warbler_types::api::{Claims, LikeResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

enum LikeOutcome {
    Missing,
    OwnMessage,
    Toggled(bool),
}

/// POST /messages/{message_id}/like — toggle the caller's like.
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let mid = message_id.to_string();
    let uid = claims.sub.to_string();

    let outcome = run_db(&state, move |db| {
        let Some(message) = db.get_message(&mid)? else {
            return Ok(LikeOutcome::Missing);
        };
        if message.user_id == uid {
            return Ok(LikeOutcome::OwnMessage);
        }
        db.toggle_like(&uid, &mid).map(LikeOutcome::Toggled)
    })
    .await?;

    match outcome {
        LikeOutcome::Missing => Err(ApiError::NotFound),
        LikeOutcome::OwnMessage => Err(ApiError::Forbidden("cannot like your own message".into())),
        LikeOutcome::Toggled(liked) => Ok(Json(LikeResponse { liked })),
    }
}
