use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use agora_db::Database;
use agora_types::api::{SignInRequest, SignInResponse, SignUpRequest};
use agora_types::models::User;

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::password;
use crate::token::TokenService;
use crate::validate::Validate;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub photo_dir: PathBuf,
}

/// Response headers carrying the session token and the user id it was issued for.
pub const TOKEN_HEADER: &str = "token";
pub const TOKEN_ID_HEADER: &str = "token_id";

pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    req.validate()?;

    let user = blocking(move || {
        // Hashing stays on the blocking pool.
        let password_hash = password::hash(&req.password)
            .map_err(|e| ApiError::Storage(anyhow::anyhow!(e)))?;

        let user = User {
            id: Uuid::new_v4(),
            username: req.username.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            created_at: Utc::now(),
        };

        if !state.db.insert_user(&user, &password_hash)? {
            return Err(ApiError::Conflict("email already registered".into()));
        }

        info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    req.validate()?;

    let db_state = state.clone();
    let user = blocking(move || {
        let email = req.email.trim().to_lowercase();
        let Some(row) = db_state.db.get_user_by_email(&email)? else {
            password::verify_dummy(&req.password);
            warn!("Sign-in for unknown email");
            return Err(ApiError::Unauthenticated);
        };
        if !password::verify(&req.password, &row.password_hash) {
            warn!("Sign-in with wrong password for {}", row.user.id);
            return Err(ApiError::Unauthenticated);
        }
        Ok(row.user)
    })
    .await?;

    let token = state
        .tokens
        .issue(user.id)
        .map_err(|e| ApiError::Storage(anyhow::anyhow!(e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        TOKEN_HEADER,
        HeaderValue::from_str(&token).map_err(|e| ApiError::Storage(e.into()))?,
    );
    headers.insert(
        TOKEN_ID_HEADER,
        HeaderValue::from_str(&user.id.to_string()).map_err(|e| ApiError::Storage(e.into()))?,
    );

    Ok((headers, Json(SignInResponse { user })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let user = blocking(move || state.db.get_user_by_id(user_id).map_err(ApiError::from))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user))
}
