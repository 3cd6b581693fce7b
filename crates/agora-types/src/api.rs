use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Community, Message, Offer, Photo, User};

// -- Session token claims --

/// Claims carried inside a session token. Only the token service reads these;
/// every other caller treats the token as an opaque string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Body of a successful sign-in. The token itself travels in the `token` and
/// `token_id` response headers.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    pub user: User,
}

// -- Communities --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub country: String,
    pub city: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinCommunityRequest {
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub user_token: String,
}

// -- Offers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOfferRequest {
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub user_token: String,
    #[serde(default)]
    pub image_id: Option<Uuid>,
}

/// `photo_attached` is false when an image id was supplied but could not be
/// linked; the offer itself was still created.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOfferResponse {
    pub offer: Offer,
    pub photo_attached: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OfferDetail {
    #[serde(flatten)]
    pub offer: Offer,
    pub photos: Vec<Photo>,
}

/// Offers of one community, as shown in a user's feed.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommunityOffers {
    pub community: Community,
    pub offers: Vec<Offer>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
    pub receiver_id: Uuid,
    #[serde(default)]
    pub offer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub other_user_id: Uuid,
    pub offer_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationMessage {
    #[serde(flatten)]
    pub message: Message,
    pub is_mine: bool,
}

// -- Photos --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadPhotoResponse {
    pub photo_id: Uuid,
    pub path: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
