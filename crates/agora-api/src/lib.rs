pub mod auth;
pub mod communities;
pub mod error;
pub mod guard;
pub mod messages;
pub mod middleware;
pub mod offers;
pub mod password;
pub mod photos;
pub mod token;
pub mod validate;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tracing::error;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Runs store work on the blocking pool.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(e.into())
    })?
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/signup", post(auth::sign_up))
        .route("/signin", post(auth::sign_in))
        .route("/users/{user_id}", get(auth::get_user))
        .route("/communities/join", post(communities::join_community))
        .route("/communities/country/{country}", get(communities::list_by_country))
        .route("/offers", post(offers::create_offer))
        .route("/photos/{photo_id}", get(photos::get_photo));

    let protected_routes = Router::new()
        .route("/communities", post(communities::create_community))
        .route("/communities/mine", get(communities::my_communities))
        .route("/communities/{community_id}/offers", get(communities::community_offers))
        .route("/offers/{offer_id}", get(offers::get_offer))
        .route("/offers/{offer_id}/correspondents", get(offers::correspondents))
        .route("/feed", get(offers::feed))
        .route("/messages", get(messages::list_conversation).post(messages::send_message))
        .route(
            "/photos",
            post(photos::upload_photo).layer(DefaultBodyLimit::max(photos::MAX_PHOTO_SIZE)),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
