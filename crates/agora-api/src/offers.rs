use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use agora_types::api::{CommunityOffers, CreateOfferRequest, CreateOfferResponse, OfferDetail};
use agora_types::models::{Offer, User};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::guard::{self, AuthUser};
use crate::validate::Validate;

/// Fields of a new offer as supplied by the caller.
pub struct NewOffer {
    pub declared_user_id: Uuid,
    pub community_id: Uuid,
    pub title: String,
    pub description: String,
    pub photo_id: Option<Uuid>,
}

/// Authenticates, checks the declared author against the token and the author's
/// membership, then stores the offer. Nothing is written if any check fails.
///
/// The photo link is attempted afterwards and may fail on its own; the offer
/// stays and `photo_attached` reports the outcome.
pub fn create(state: &AppState, token: &str, new: NewOffer) -> ApiResult<CreateOfferResponse> {
    let me = guard::authenticate(&state.tokens, token)?;
    guard::assert_owner(new.declared_user_id, me)?;
    guard::assert_member(&state.db, me, new.community_id)?;

    let offer = Offer {
        id: Uuid::new_v4(),
        title: new.title.trim().to_string(),
        description: new.description.trim().to_string(),
        user_id: me.0,
        community_id: new.community_id,
        created_at: Utc::now(),
    };
    state.db.insert_offer(&offer)?;
    info!("{} posted offer {} in {}", me.0, offer.id, offer.community_id);

    let photo_attached = match new.photo_id {
        None => false,
        Some(photo_id) => match state.db.attach_photo(photo_id, offer.id, me.0) {
            Ok(true) => true,
            Ok(false) => {
                warn!("Photo {} not attachable to offer {}", photo_id, offer.id);
                false
            }
            Err(e) => {
                warn!("Attaching photo {} to offer {} failed: {:#}", photo_id, offer.id, e);
                false
            }
        },
    };

    Ok(CreateOfferResponse {
        offer,
        photo_attached,
    })
}

/// POST /offers — token travels in the body as `user_token`.
pub async fn create_offer(
    State(state): State<AppState>,
    payload: Result<Json<CreateOfferRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    req.validate()?;

    let created = blocking(move || {
        create(
            &state,
            &req.user_token,
            NewOffer {
                declared_user_id: req.user_id,
                community_id: req.community_id,
                title: req.title,
                description: req.description,
                photo_id: req.image_id,
            },
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /offers/{offer_id} — members of the offer's community only.
pub async fn get_offer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(offer_id): Path<Uuid>,
) -> ApiResult<Json<OfferDetail>> {
    let detail = blocking(move || {
        let offer = guard::readable_offer(&state.db, user, offer_id)?;
        let photos = state.db.list_photos_for_offer(offer.id)?;
        Ok(OfferDetail { offer, photos })
    })
    .await?;
    Ok(Json(detail))
}

/// GET /offers/{offer_id}/correspondents — owner only.
pub async fn correspondents(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(offer_id): Path<Uuid>,
) -> ApiResult<Json<Vec<User>>> {
    let users = blocking(move || {
        let ids = guard::correspondents(&state.db, user, offer_id)?;
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            match state.db.get_user_by_id(id)? {
                Some(u) => users.push(u),
                None => warn!("Correspondent {} on offer {} has no user row", id, offer_id),
            }
        }
        Ok(users)
    })
    .await?;
    Ok(Json(users))
}

/// GET /feed — offers from every community the caller belongs to.
pub async fn feed(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<CommunityOffers>>> {
    let feed = blocking(move || {
        let communities = state.db.list_communities_for_user(user.0)?;
        let mut feed = Vec::with_capacity(communities.len());
        for community in communities {
            let offers = state.db.list_offers_for_community(community.id)?;
            feed.push(CommunityOffers { community, offers });
        }
        Ok(feed)
    })
    .await?;
    Ok(Json(feed))
}
