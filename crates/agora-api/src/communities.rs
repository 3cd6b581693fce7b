use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use agora_db::models::JoinOutcome;
use agora_types::api::{CreateCommunityRequest, JoinCommunityRequest};
use agora_types::models::{Community, Offer};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::guard::{self, AuthUser};
use crate::validate::Validate;

/// POST /communities — the creator becomes owner and member.
pub async fn create_community(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateCommunityRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    req.validate()?;

    let draft = Community {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        country: req.country.trim().to_string(),
        city: req.city.trim().to_string(),
        owner_id: None,
        created_at: Utc::now(),
    };

    let community = blocking(move || {
        let community = state.db.create_owned_community(&draft, user.0)?;
        info!("{} created community {} ({})", user.0, community.name, community.id);
        Ok(community)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(community)))
}

/// Adds `user_id` to a community on behalf of a token that must speak for `user_id`.
pub fn join(
    state: &AppState,
    token: &str,
    user_id: Uuid,
    community_id: Uuid,
) -> ApiResult<JoinOutcome> {
    let me = guard::authenticate(&state.tokens, token)?;
    guard::assert_owner(user_id, me)?;

    match state.db.add_member(me.0, community_id)? {
        JoinOutcome::UnknownUser | JoinOutcome::UnknownCommunity => Err(ApiError::NotFound),
        outcome => {
            if outcome == JoinOutcome::Joined {
                info!("{} joined community {}", me.0, community_id);
            }
            Ok(outcome)
        }
    }
}

/// POST /communities/join — token travels in the body as `user_token`.
/// Joining twice is not an error.
pub async fn join_community(
    State(state): State<AppState>,
    payload: Result<Json<JoinCommunityRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    req.validate()?;

    blocking(move || join(&state, &req.user_token, req.user_id, req.community_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_communities(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Community>>> {
    let communities =
        blocking(move || Ok(state.db.list_communities_for_user(user.0)?)).await?;
    Ok(Json(communities))
}

pub async fn list_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
) -> ApiResult<Json<Vec<Community>>> {
    let communities =
        blocking(move || Ok(state.db.list_communities_by_country(country.trim())?)).await?;
    Ok(Json(communities))
}

/// Offers of a community, members only.
pub async fn community_offers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(community_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Offer>>> {
    let offers = blocking(move || {
        guard::assert_member(&state.db, user, community_id)?;
        Ok(state.db.list_offers_for_community(community_id)?)
    })
    .await?;
    Ok(Json(offers))
}
