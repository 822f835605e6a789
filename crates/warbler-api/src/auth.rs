use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use warbler_db::{Database, NewUser};
use warbler_types::api::{AuthResponse, Claims};
use warbler_types::forms::{LoginForm, UserAddForm, Validate};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::run_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

pub async fn signup(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<UserAddForm>,
) -> Result<impl IntoResponse, ApiError> {
    form.validate()?;

    let new_user = NewUser {
        username: form.username,
        email: form.email,
        password: form.password,
        image_url: form.image_url,
    };
    let user = run_db(&state, move |db| db.signup(&new_user)).await?;

    let user_id = parse_user_id(&user.id)?;
    let token = create_token(&state, user_id, &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            username: user.username,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    form.validate()?;

    let user = run_db(&state, move |db| db.authenticate(&form.username, &form.password))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let user_id = parse_user_id(&user.id)?;
    let token = create_token(&state, user_id, &user.username)?;
    info!("User {} logged in", user.username);

    Ok(Json(AuthResponse {
        user_id,
        username: user.username,
        token,
    }))
}

fn parse_user_id(id: &str) -> Result<Uuid, ApiError> {
    id.parse().map_err(|e| {
        error!("Corrupt user id '{}': {}", id, e);
        ApiError::Internal
    })
}

fn create_token(state: &AppStateInner, user_id: Uuid, username: &str) -> Result<String, ApiError> {
    let expires = chrono::TimeDelta::try_days(state.token_ttl_days)
        .filter(|ttl| *ttl > chrono::TimeDelta::zero())
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            error!("Token TTL of {} days is out of range", state.token_ttl_days);
            ApiError::Internal
        })?;

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: expires.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })
}
