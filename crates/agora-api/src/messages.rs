use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use agora_types::api::{ConversationMessage, ConversationQuery, SendMessageRequest};
use agora_db::Database;
use agora_types::models::{Message, Offer};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::guard::{self, AuthUser};
use crate::validate::Validate;

/// Stores a message from `me`. Sending needs no shared community: anyone
/// signed in may write to anyone about anything.
///
/// The offer link is applied after the message is stored and is silently
/// skipped when the offer does not resolve.
pub fn send(
    state: &AppState,
    me: AuthUser,
    receiver_id: Uuid,
    text: &str,
    offer_id: Option<Uuid>,
) -> ApiResult<Message> {
    if state.db.get_user_by_id(receiver_id)?.is_none() {
        return Err(ApiError::NotFound);
    }

    let mut message = Message {
        id: Uuid::new_v4(),
        text: text.to_string(),
        sender_id: me.0,
        receiver_id,
        offer_id: None,
        created_at: Utc::now(),
    };
    state.db.insert_message(&message)?;

    if let Some(offer_id) = offer_id {
        match state.db.get_offer(offer_id) {
            Ok(Some(offer)) => link_offer(&state.db, &mut message, &offer),
            Ok(None) => debug!("Message {} names unknown offer {}", message.id, offer_id),
            Err(e) => warn!("Resolving offer {} for message {} failed: {:#}", offer_id, message.id, e),
        }
    }

    Ok(message)
}

/// Best-effort: the message is already stored, so a failed link only loses the tag.
fn link_offer(db: &Database, message: &mut Message, offer: &Offer) {
    match db.set_message_offer(message.id, offer.id) {
        Ok(true) => message.offer_id = Some(offer.id),
        Ok(false) => warn!("Message {} vanished before offer {} was linked", message.id, offer.id),
        Err(e) => warn!("Linking message {} to offer {} failed: {:#}", message.id, offer.id, e),
    }
}

/// Both directions between `me` and `other`, oldest first, each tagged with
/// whether `me` wrote it.
pub fn conversation(
    state: &AppState,
    me: AuthUser,
    other: Uuid,
    offer_id: Option<Uuid>,
) -> ApiResult<Vec<ConversationMessage>> {
    let messages = state.db.list_conversation(me.0, other, offer_id)?;

    Ok(messages
        .into_iter()
        .filter(|m| guard::is_participant(m, me))
        .map(|message| ConversationMessage {
            is_mine: message.sender_id == me.0,
            message,
        })
        .collect())
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    req.validate()?;

    let message =
        blocking(move || send(&state, user, req.receiver_id, &req.text, req.offer_id)).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages?other_user_id=..[&offer_id=..]
pub async fn list_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<ConversationQuery>, axum::extract::rejection::QueryRejection>,
) -> ApiResult<Json<Vec<ConversationMessage>>> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;

    let messages = blocking(move || {
        conversation(&state, user, query.other_user_id, query.offer_id)
    })
    .await?;
    Ok(Json(messages))
}
