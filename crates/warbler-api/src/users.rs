use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use warbler_db::{DEFAULT_PAGE_SIZE, ProfileUpdate};
use warbler_types::api::{Claims, FollowResponse, UserDetailResponse, UserSearchQuery};
use warbler_types::forms::{UserEditForm, Validate};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::run_db;
use crate::views::{message_views, user_view, user_views};

/// GET /users?q= — every user, or those whose username contains `q`.
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.list_users(query.q.as_deref())).await?;
    Ok(Json(user_views(&rows)))
}

/// GET /users/{user_id} — profile, counts, follow state and recent messages.
pub async fn show_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let viewer = claims.sub.to_string();

    let detail = run_db(&state, move |db| {
        let Some(user) = db.get_user(&uid)? else {
            return Ok(None);
        };

        let stats = db.user_stats(&uid)?;
        let is_following = db.is_following(&viewer, &uid)?;
        let follows_you = db.is_followed_by(&viewer, &uid)?;
        let rows = db.messages_for_user(&uid, DEFAULT_PAGE_SIZE)?;
        let messages = message_views(db, &viewer, rows)?;

        Ok(Some(UserDetailResponse {
            user: user_view(&user),
            stats,
            is_following,
            follows_you,
            messages,
        }))
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(detail))
}

/// GET /users/{user_id}/following
pub async fn show_following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let rows = run_db(&state, move |db| {
        if db.get_user(&uid)?.is_none() {
            return Ok(None);
        }
        db.following(&uid).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(user_views(&rows)))
}

/// GET /users/{user_id}/followers
pub async fn show_followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let rows = run_db(&state, move |db| {
        if db.get_user(&uid)?.is_none() {
            return Ok(None);
        }
        db.followers(&uid).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(user_views(&rows)))
}

/// GET /users/{user_id}/likes — messages the user has liked.
pub async fn show_likes(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let viewer = claims.sub.to_string();
    let messages = run_db(&state, move |db| {
        if db.get_user(&uid)?.is_none() {
            return Ok(None);
        }
        let rows = db.liked_messages(&uid)?;
        message_views(db, &viewer, rows).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(messages))
}

/// POST /users/{user_id}/follow
pub async fn follow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == claims.sub {
        return Err(ApiError::BadRequest("cannot follow yourself".into()));
    }

    let follower = claims.sub.to_string();
    let followed = user_id.to_string();
    run_db(&state, move |db| db.follow(&follower, &followed)).await?;

    Ok(Json(FollowResponse { following: true }))
}

/// DELETE /users/{user_id}/follow
pub async fn unfollow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let follower = claims.sub.to_string();
    let followed = user_id.to_string();
    run_db(&state, move |db| db.unfollow(&follower, &followed)).await?;

    Ok(Json(FollowResponse { following: false }))
}

/// PATCH /users/me — the form's password must match the current account.
pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(form): JsonBody<UserEditForm>,
) -> Result<impl IntoResponse, ApiError> {
    form.validate()?;

    let uid = claims.sub.to_string();
    let updated = run_db(&state, move |db| {
        let update = ProfileUpdate {
            username: form.username,
            email: form.email,
            image_url: form.image_url,
            header_image_url: form.header_image_url,
            bio: form.bio,
        };
        db.update_profile_confirmed(&uid, &form.password, &update)
    })
    .await?
    .ok_or(ApiError::Unauthorized)?;

    info!("User {} updated their profile", updated.id);
    Ok(Json(user_view(&updated)))
}

/// DELETE /users/me — removes the account with its messages, likes and
/// follow edges.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    if !run_db(&state, move |db| db.delete_user(&uid)).await? {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
