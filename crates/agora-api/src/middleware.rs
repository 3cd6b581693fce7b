use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::auth::{AppState, TOKEN_HEADER};
use crate::error::ApiError;
use crate::guard;

/// Pulls the session token from `Authorization: Bearer ...` or, for older
/// clients, the bare `token` header.
fn extract_token(req: &Request) -> Option<String> {
    if let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    req.headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Validates the session token and makes the caller's `AuthUser` available to handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&req).ok_or(ApiError::Unauthenticated)?;
    let user = guard::authenticate(&state.tokens, &token)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
