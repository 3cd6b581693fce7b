//! End-to-end scenarios against the full router
//!
//! Tests cover:
//! - Sign-up / sign-in and the token headers
//! - Community creation, joining and idempotent re-joins
//! - Offer creation gated by token subject and membership
//! - Messaging, correspondents and conversation ordering
//! - Photo upload and attachment

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use agora_api::auth::AppStateInner;
use agora_api::token::TokenService;
use agora_db::Database;

struct TestApp {
    router: Router,
    _photos: TempDir,
}

struct Session {
    id: Uuid,
    token: String,
}

impl TestApp {
    fn new() -> Self {
        let photos = TempDir::new().unwrap();
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            tokens: TokenService::new("scenario-secret"),
            photo_dir: photos.path().to_path_buf(),
        });
        Self {
            router: agora_api::router(state),
            _photos: photos,
        }
    }

    async fn call(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let (status, _, body) = self
            .call(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        (status, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            // Legacy header form, to exercise both token transports.
            builder = builder.header("token", token);
        }
        let (status, _, body) = self.call(builder.body(Body::empty()).unwrap()).await;
        (status, body)
    }

    async fn sign_up(&self, name: &str) -> StatusCode {
        let (status, _) = self
            .post_json(
                "/signup",
                None,
                json!({ "username": name, "email": format!("{}@x.com", name), "password": "pw" }),
            )
            .await;
        status
    }

    async fn sign_in(&self, name: &str) -> Session {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/signin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "email": format!("{}@x.com", name), "password": "pw" }).to_string(),
            ))
            .unwrap();
        let (status, headers, body) = self.call(req).await;
        assert_eq!(status, StatusCode::OK);

        let token = headers.get("token").unwrap().to_str().unwrap().to_string();
        let id: Uuid = headers.get("token_id").unwrap().to_str().unwrap().parse().unwrap();
        assert_eq!(body["user"]["id"], json!(id));
        assert!(body["user"].get("password_hash").is_none());
        Session { id, token }
    }

    async fn register(&self, name: &str) -> Session {
        assert_eq!(self.sign_up(name).await, StatusCode::CREATED);
        self.sign_in(name).await
    }

    async fn create_community(&self, who: &Session, name: &str) -> Uuid {
        let (status, body) = self
            .post_json(
                "/communities",
                Some(&who.token),
                json!({ "name": name, "country": "NZ", "city": "Hamilton" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["owner_id"], json!(who.id));
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn join(&self, who: &Session, community: Uuid) -> StatusCode {
        let (status, _) = self
            .post_json(
                "/communities/join",
                None,
                json!({ "user_id": who.id, "community_id": community, "user_token": who.token }),
            )
            .await;
        status
    }

    async fn create_offer(
        &self,
        token: &str,
        declared: Uuid,
        community: Uuid,
        image: Option<Uuid>,
    ) -> (StatusCode, Value) {
        self.post_json(
            "/offers",
            None,
            json!({
                "title": "Lawn mower",
                "description": "Lightly used",
                "user_id": declared,
                "community_id": community,
                "user_token": token,
                "image_id": image,
            }),
        )
        .await
    }

    async fn send(&self, from: &Session, to: Uuid, text: &str, offer: Option<Uuid>) -> StatusCode {
        let (status, _) = self
            .post_json(
                "/messages",
                Some(&from.token),
                json!({ "text": text, "receiver_id": to, "offer_id": offer }),
            )
            .await;
        status
    }

    async fn upload_photo(&self, who: &Session, bytes: &'static [u8]) -> Uuid {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/photos")
            .header(header::AUTHORIZATION, format!("Bearer {}", who.token))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(bytes))
            .unwrap();
        let (status, _, body) = self.call(req).await;
        assert_eq!(status, StatusCode::CREATED);
        body["photo_id"].as_str().unwrap().parse().unwrap()
    }
}

fn offer_id(body: &Value) -> Uuid {
    body["offer"]["id"].as_str().unwrap().parse().unwrap()
}

// ============================================================================
// AUTH
// ============================================================================

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new();
    assert_eq!(app.sign_up("a").await, StatusCode::CREATED);
    assert_eq!(app.sign_up("a").await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn any_accepted_password_can_sign_in() {
    let app = TestApp::new();
    let longest = "x".repeat(agora_api::validate::MAX_PASSWORD_LEN);

    for (name, password) in [("spaces", "   "), ("padded", " pw "), ("longest", longest.as_str())] {
        let email = format!("{}@x.com", name);
        let (up, _) = app
            .post_json(
                "/signup",
                None,
                json!({ "username": name, "email": email, "password": password }),
            )
            .await;
        let (inn, _) = app
            .post_json("/signin", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!((up, inn), (StatusCode::CREATED, StatusCode::OK), "{}", name);
    }

    // " pw " and "pw" are different passwords.
    let (status, _) = app
        .post_json("/signin", None, json!({ "email": "padded@x.com", "password": "pw" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn overlong_password_is_refused_on_both_paths() {
    let app = TestApp::new();
    let too_long = "x".repeat(agora_api::validate::MAX_PASSWORD_LEN + 1);

    let (up, _) = app
        .post_json(
            "/signup",
            None,
            json!({ "username": "long", "email": "long@x.com", "password": too_long }),
        )
        .await;
    let (inn, _) = app
        .post_json("/signin", None, json!({ "email": "long@x.com", "password": too_long }))
        .await;
    assert_eq!((up, inn), (StatusCode::BAD_REQUEST, StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn sign_in_failures_look_identical() {
    let app = TestApp::new();
    app.sign_up("a").await;

    let (wrong_pw, wrong_body) = app
        .post_json("/signin", None, json!({ "email": "a@x.com", "password": "nope" }))
        .await;
    let (unknown, unknown_body) = app
        .post_json("/signin", None, json!({ "email": "ghost@x.com", "password": "pw" }))
        .await;

    assert_eq!(wrong_pw, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new();
    let (status, _) = app.get("/communities/mine", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/communities/mine", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = TokenService::new("other-secret").issue(Uuid::new_v4()).unwrap();
    let (status, _) = app.get("/communities/mine", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/signup", None, json!({ "username": "a", "email": "a@x.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .post_json("/signup", None, json!({ "username": " ", "email": "a@x.com", "password": "pw" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_user_lookup_hides_the_hash() {
    let app = TestApp::new();
    let a = app.register("a").await;

    let (status, body) = app.get(&format!("/users/{}", a.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "a");
    assert!(body.get("password_hash").is_none());

    let (status, _) = app.get(&format!("/users/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// COMMUNITIES & OFFERS
// ============================================================================

#[tokio::test]
async fn riverside_join_flow() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let riverside = app.create_community(&a, "Riverside").await;

    let (_, mine) = app.get("/communities/mine", Some(&a.token)).await;
    assert_eq!(mine[0]["id"], json!(riverside));

    let b = app.register("b").await;
    let (status, _) = app.create_offer(&b.token, b.id, riverside, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(app.join(&b, riverside).await, StatusCode::NO_CONTENT);
    let (status, body) = app.create_offer(&b.token, b.id, riverside, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["offer"]["user_id"], json!(b.id));
    assert_eq!(body["photo_attached"], json!(false));
}

#[tokio::test]
async fn declared_user_must_match_token_subject() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;
    let riverside = app.create_community(&a, "Riverside").await;
    app.join(&b, riverside).await;

    // Both are members; B's token claiming to be A is still refused.
    let (status, _) = app.create_offer(&b.token, a.id, riverside, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Same for joining on someone else's behalf.
    let (status, _) = app
        .post_json(
            "/communities/join",
            None,
            json!({ "user_id": a.id, "community_id": riverside, "user_token": b.token }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn joining_twice_is_idempotent() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;
    let riverside = app.create_community(&a, "Riverside").await;

    assert_eq!(app.join(&b, riverside).await, StatusCode::NO_CONTENT);
    assert_eq!(app.join(&b, riverside).await, StatusCode::NO_CONTENT);

    let (_, mine) = app.get("/communities/mine", Some(&b.token)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn joining_unknown_community_is_not_found() {
    let app = TestApp::new();
    let a = app.register("a").await;
    assert_eq!(app.join(&a, Uuid::new_v4()).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_reads_are_members_only_and_uniform() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;
    let riverside = app.create_community(&a, "Riverside").await;
    let (_, created) = app.create_offer(&a.token, a.id, riverside, None).await;
    let offer = offer_id(&created);

    let (status, body) = app.get(&format!("/offers/{}", offer), Some(&a.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Lawn mower");

    let (hidden, hidden_body) = app.get(&format!("/offers/{}", offer), Some(&b.token)).await;
    let (missing, missing_body) = app
        .get(&format!("/offers/{}", Uuid::new_v4()), Some(&b.token))
        .await;
    assert_eq!(hidden, StatusCode::FORBIDDEN);
    assert_eq!(missing, StatusCode::FORBIDDEN);
    assert_eq!(hidden_body, missing_body);

    let (status, _) = app
        .get(&format!("/communities/{}/offers", riverside), Some(&b.token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = app
        .get(&format!("/communities/{}/offers", riverside), Some(&a.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn feed_groups_offers_by_community() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let riverside = app.create_community(&a, "Riverside").await;
    let hillside = app.create_community(&a, "Hillside").await;
    app.create_offer(&a.token, a.id, riverside, None).await;
    app.create_offer(&a.token, a.id, riverside, None).await;
    app.create_offer(&a.token, a.id, hillside, None).await;

    let (status, feed) = app.get("/feed", Some(&a.token)).await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0]["community"]["id"], json!(riverside));
    assert_eq!(feed[0]["offers"].as_array().unwrap().len(), 2);
    assert_eq!(feed[1]["offers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn communities_listed_by_country() {
    let app = TestApp::new();
    let a = app.register("a").await;
    app.create_community(&a, "Riverside").await;

    let (status, list) = app.get("/communities/country/NZ", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["name"], "Riverside");

    let (_, empty) = app.get("/communities/country/DE", None).await;
    assert!(empty.as_array().unwrap().is_empty());
}

// ============================================================================
// PHOTOS
// ============================================================================

#[tokio::test]
async fn uploaded_photo_attaches_to_new_offer() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let riverside = app.create_community(&a, "Riverside").await;
    let photo = app.upload_photo(&a, b"\x89PNG fake image").await;

    let (status, created) = app.create_offer(&a.token, a.id, riverside, Some(photo)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["photo_attached"], json!(true));

    let (_, detail) = app
        .get(&format!("/offers/{}", offer_id(&created)), Some(&a.token))
        .await;
    assert_eq!(detail["photos"][0]["id"], json!(photo));

    let req = Request::builder()
        .uri(format!("/photos/{}", photo))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"\x89PNG fake image");
}

#[tokio::test]
async fn failed_attachment_still_creates_offer() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;
    let riverside = app.create_community(&a, "Riverside").await;
    let bs_photo = app.upload_photo(&b, b"not yours").await;

    let (status, created) = app.create_offer(&a.token, a.id, riverside, Some(bs_photo)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["photo_attached"], json!(false));

    let (status, _) = app.create_offer(&a.token, a.id, riverside, Some(Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, list) = app
        .get(&format!("/communities/{}/offers", riverside), Some(&a.token))
        .await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

// ============================================================================
// MESSAGES
// ============================================================================

#[tokio::test]
async fn correspondents_are_distinct_and_exclude_owner() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;
    let riverside = app.create_community(&a, "Riverside").await;
    let (_, created) = app.create_offer(&a.token, a.id, riverside, None).await;
    let offer = offer_id(&created);

    // B is not in Riverside; messaging only needs a session.
    assert_eq!(app.send(&b, a.id, "still available?", Some(offer)).await, StatusCode::CREATED);
    assert_eq!(app.send(&b, a.id, "hello?", Some(offer)).await, StatusCode::CREATED);
    assert_eq!(app.send(&a, a.id, "note to self", Some(offer)).await, StatusCode::CREATED);

    let (status, users) = app
        .get(&format!("/offers/{}/correspondents", offer), Some(&a.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<Value> = users.as_array().unwrap().iter().map(|u| u["id"].clone()).collect();
    assert_eq!(ids, vec![json!(b.id)]);

    let (status, _) = app
        .get(&format!("/offers/{}/correspondents", offer), Some(&b.token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn conversation_is_ordered_and_tagged_per_requester() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;
    let c = app.register("c").await;

    app.send(&a, b.id, "one", None).await;
    app.send(&b, a.id, "two", None).await;
    app.send(&c, a.id, "elsewhere", None).await;
    app.send(&a, b.id, "three", None).await;

    let (status, from_a) = app
        .get(&format!("/messages?other_user_id={}", b.id), Some(&a.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = from_a
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    let mine: Vec<bool> = from_a
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["is_mine"].as_bool().unwrap())
        .collect();
    assert_eq!(mine, vec![true, false, true]);

    let (_, from_b) = app
        .get(&format!("/messages?other_user_id={}", a.id), Some(&b.token))
        .await;
    let mine: Vec<bool> = from_b
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["is_mine"].as_bool().unwrap())
        .collect();
    assert_eq!(mine, vec![false, true, false]);
}

#[tokio::test]
async fn unknown_offer_on_message_is_ignored() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;

    let (status, body) = app
        .post_json(
            "/messages",
            Some(&b.token),
            json!({ "text": "hi", "receiver_id": a.id, "offer_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["offer_id"], Value::Null);
    assert_eq!(body["sender_id"], json!(b.id));
}

#[tokio::test]
async fn message_to_unknown_user_is_not_found() {
    let app = TestApp::new();
    let a = app.register("a").await;
    assert_eq!(app.send(&a, Uuid::new_v4(), "hi", None).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conversation_can_be_narrowed_to_an_offer() {
    let app = TestApp::new();
    let a = app.register("a").await;
    let b = app.register("b").await;
    let riverside = app.create_community(&a, "Riverside").await;
    let (_, created) = app.create_offer(&a.token, a.id, riverside, None).await;
    let offer = offer_id(&created);

    app.send(&b, a.id, "about the mower", Some(offer)).await;
    app.send(&b, a.id, "unrelated", None).await;

    let (_, thread) = app
        .get(
            &format!("/messages?other_user_id={}&offer_id={}", b.id, offer),
            Some(&a.token),
        )
        .await;
    let thread = thread.as_array().unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0]["text"], "about the mower");
}
