use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use reservo_events::RecordingSink;
use reservo_infra::handlers::register_all;
use reservo_infra::mailer::RecordingMailer;
use reservo_infra::store::InMemoryStore;
use reservo_infra::{AppConfig, AppDeps};

struct TestServer {
    base_url: String,
    store: InMemoryStore,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let store = InMemoryStore::new();
        let deps = AppDeps::build(
            AppConfig::for_tests(),
            Arc::new(store.clone()),
            Arc::new(RecordingMailer::new()),
            Arc::new(RecordingSink::new()),
        );
        register_all(&deps).unwrap();

        let app = reservo_api::app::build_app(deps);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/auth{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn sign_up(client: &reqwest::Client, srv: &TestServer, email: &str) -> Value {
    let res = client
        .post(srv.url("/sign-up"))
        .json(&json!({
            "email": email,
            "password": "P@ssw0rd1",
            "firstName": "Ada",
            "lastName": "Lovelace",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

fn token<'a>(body: &'a Value, field: &str) -> &'a str {
    body[field].as_str().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn sign_up_returns_credentials_and_rejects_duplicates() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body = sign_up(&client, &srv, "ada@example.com").await;
    assert!(!token(&body, "accessToken").is_empty());
    assert!(!token(&body, "refreshToken").is_empty());
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("passwordHash").is_none());

    let res = client
        .post(srv.url("/sign-up"))
        .json(&json!({
            "email": "ADA@example.com",
            "password": "whatever",
            "firstName": "A",
            "lastName": "L",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "conflict");
    assert_eq!(srv.store.read(|t| t.users.len()).await, 1);
}

#[tokio::test]
async fn protected_routes_require_the_right_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let body = sign_up(&client, &srv, "ada@example.com").await;

    let res = client
        .post(srv.url("/change-password"))
        .json(&json!({ "oldPassword": "P@ssw0rd1", "newPassword": "N3w" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Access and refresh tokens are signed with different secrets.
    let res = client
        .put(srv.url("/refresh-tokens"))
        .bearer_auth(token(&body, "accessToken"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let now = Utc::now();
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "userId": body["user"]["id"],
            "refreshTokenId": body["user"]["id"],
            "iat": now.timestamp(),
            "exp": (now + ChronoDuration::minutes(10)).timestamp(),
        }),
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .expect("failed to encode jwt");
    let res = client
        .post(srv.url("/change-password"))
        .bearer_auth(forged)
        .json(&json!({ "oldPassword": "P@ssw0rd1", "newPassword": "N3w" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_and_replay_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let body = sign_up(&client, &srv, "ada@example.com").await;
    let original = token(&body, "refreshToken").to_string();

    let res = client
        .put(srv.url("/refresh-tokens"))
        .bearer_auth(&original)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fresh: Value = res.json().await.unwrap();
    assert_ne!(token(&fresh, "refreshToken"), original);

    let res = client
        .put(srv.url("/refresh-tokens"))
        .bearer_auth(&original)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/log-out"))
        .bearer_auth(token(&fresh, "refreshToken"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let status: Value = res.json().await.unwrap();
    assert_eq!(status, json!({ "status": true }));

    let res = client
        .post(srv.url("/log-out"))
        .bearer_auth(token(&fresh, "refreshToken"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    sign_up(&client, &srv, "ada@example.com").await;

    let res = client
        .post(srv.url("/forgot-password"))
        .json(&json!({ "email": "ghost@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let out: Value = res.json().await.unwrap();
    assert_eq!(out, json!({ "status": true }));

    let res = client
        .post(srv.url("/forgot-password"))
        .json(&json!({ "email": "ada@example.com" }))
        .send()
        .await
        .unwrap();
    let out: Value = res.json().await.unwrap();
    let reset_token = out["resetToken"].as_str().unwrap().to_string();

    let reset = json!({ "token": reset_token, "password": "N3w-secret" });
    let res = client
        .post(srv.url("/reset-password"))
        .json(&reset)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/reset-password"))
        .json(&reset)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/sign-in"))
        .json(&json!({ "email": "ada@example.com", "password": "P@ssw0rd1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/sign-in"))
        .json(&json!({ "email": "ada@example.com", "password": "N3w-secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/sign-in"))
        .json(&json!({ "email": "nobody@example.com", "password": "N3w-secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn change_password_with_access_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let body = sign_up(&client, &srv, "ada@example.com").await;
    let access = token(&body, "accessToken");

    let res = client
        .post(srv.url("/change-password"))
        .bearer_auth(access)
        .json(&json!({ "oldPassword": "P@ssw0rd1", "newPassword": "P@ssw0rd1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/change-password"))
        .bearer_auth(access)
        .json(&json!({ "oldPassword": "P@ssw0rd1", "newPassword": "N3w-secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Every refresh token was revoked.
    let res = client
        .put(srv.url("/refresh-tokens"))
        .bearer_auth(token(&body, "refreshToken"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
