//! End-to-end tests for the admin authentication strategy engine.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shopify_app_auth::authenticate::{AdminAuth, AuthEngine, AuthError};
use shopify_app_auth::http::{Method, Request};
use shopify_app_auth::session_store::{
    MemorySessionStore, SessionStore, SessionStorageError,
};
use shopify_app_auth::{
    ApiKey, ApiSecretKey, AppConfig, HostUrl, Session, ShopDomain,
};

const API_KEY: &str = "test-api-key";
const SECRET: &str = "test-secret";
const SHOP: &str = "test-shop.myshopify.com";

#[derive(Serialize)]
struct TestClaims {
    iss: String,
    dest: String,
    aud: String,
    sub: Option<String>,
    exp: i64,
    nbf: i64,
    iat: i64,
    jti: String,
    sid: Option<String>,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn session_token(jti: &str) -> String {
    let ts = now();
    let claims = TestClaims {
        iss: format!("https://{SHOP}/admin"),
        dest: format!("https://{SHOP}"),
        aud: API_KEY.to_string(),
        sub: None,
        exp: ts + 60,
        nbf: ts - 10,
        iat: ts,
        jti: jti.to_string(),
        sid: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn config(api_host: &str) -> AppConfig {
    AppConfig::builder()
        .api_key(ApiKey::new(API_KEY).unwrap())
        .api_secret_key(ApiSecretKey::new(SECRET).unwrap())
        .host(HostUrl::new("https://myapp.example.com").unwrap())
        .api_host(HostUrl::new(api_host).unwrap())
        .scopes("read_products".parse().unwrap())
        .build()
        .unwrap()
}

fn bearer_request(token: &str) -> Request {
    Request::builder(Method::Get, &format!("/api/data?shop={SHOP}"))
        .header("Authorization", format!("Bearer {token}"))
        .build()
}

async fn mount_exchange(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/admin/oauth/access_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(50))
                .set_body_json(serde_json::json!({
                    "access_token": "exchanged-access-token",
                    "scope": "read_products"
                })),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fresh_shop_exchanges_once_and_stores_offline_session() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;

    let engine = AuthEngine::new(config(&server.uri()), MemorySessionStore::new());
    let token = session_token("jti-1");

    let outcome = engine.authenticate_admin(&bearer_request(&token)).await.unwrap();

    match outcome {
        AdminAuth::Authenticated(ctx) => {
            assert_eq!(ctx.session.id, format!("offline_{SHOP}"));
            assert_eq!(ctx.session.shop.as_ref(), SHOP);
            assert!(!ctx.session.is_online);
            assert_eq!(ctx.session.access_token, "exchanged-access-token");
        }
        other => panic!("expected authentication, got {other:?}"),
    }

    // The session was persisted under its deterministic id
    let stored = engine
        .store()
        .load_session(&format!("offline_{SHOP}"))
        .await
        .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_second_request_reuses_stored_session_without_exchange() {
    let server = MockServer::start().await;
    // Exactly one exchange across both requests
    mount_exchange(&server, 1).await;

    let engine = AuthEngine::new(config(&server.uri()), MemorySessionStore::new());
    let token = session_token("jti-1");

    let first = engine.authenticate_admin(&bearer_request(&token)).await.unwrap();
    assert!(matches!(first, AdminAuth::Authenticated(_)));

    let second = engine.authenticate_admin(&bearer_request(&token)).await.unwrap();
    assert!(matches!(second, AdminAuth::Authenticated(_)));
}

#[tokio::test]
async fn test_concurrent_requests_with_same_token_exchange_once() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;

    let engine = Arc::new(AuthEngine::new(
        config(&server.uri()),
        MemorySessionStore::new(),
    ));
    let token = session_token("jti-1");

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let token = token.clone();
            tokio::spawn(async move {
                engine.authenticate_admin(&bearer_request(&token)).await
            })
        })
        .collect();

    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        match outcome {
            AdminAuth::Authenticated(ctx) => {
                assert_eq!(ctx.session.access_token, "exchanged-access-token");
            }
            other => panic!("expected authentication, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_stored_session_with_insufficient_scopes_is_re_exchanged() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;

    let engine = AuthEngine::new(config(&server.uri()), MemorySessionStore::new());

    // Seed a session whose grant no longer covers the configured scopes
    let shop = ShopDomain::new(SHOP).unwrap();
    let stale = Session::new(
        Session::offline_id(&shop),
        shop,
        "stale-token".to_string(),
        "read_orders".parse().unwrap(),
        false,
        None,
    );
    engine.store().store_session(stale).await.unwrap();

    let outcome = engine
        .authenticate_admin(&bearer_request(&session_token("jti-1")))
        .await
        .unwrap();

    match outcome {
        AdminAuth::Authenticated(ctx) => {
            assert_eq!(ctx.session.access_token, "exchanged-access-token");
        }
        other => panic!("expected authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn test_embedded_page_load_without_embedded_param_redirects_to_admin() {
    let server = MockServer::start().await;
    let engine = AuthEngine::new(config(&server.uri()), MemorySessionStore::new());

    let request = Request::builder(Method::Get, &format!("/app?shop={SHOP}")).build();
    let outcome = engine.authenticate_admin(&request).await.unwrap();

    let response = outcome.response().expect("expected a redirect");
    assert_eq!(response.status, 302);
    assert_eq!(
        response.header("location"),
        Some(format!("https://{SHOP}/admin/apps/{API_KEY}/app").as_str())
    );
}

#[tokio::test]
async fn test_embedded_page_load_without_id_token_redirects_to_bounce() {
    let server = MockServer::start().await;
    let engine = AuthEngine::new(config(&server.uri()), MemorySessionStore::new());

    let request =
        Request::builder(Method::Get, &format!("/app?shop={SHOP}&embedded=1")).build();
    let outcome = engine.authenticate_admin(&request).await.unwrap();

    let response = outcome.response().expect("expected a redirect");
    assert!(response
        .header("location")
        .unwrap()
        .starts_with("/session-token-bounce?shopify-reload="));
}

#[tokio::test]
async fn test_embedded_page_load_with_id_token_authenticates() {
    let server = MockServer::start().await;
    mount_exchange(&server, 1).await;

    let engine = AuthEngine::new(config(&server.uri()), MemorySessionStore::new());
    let token = session_token("jti-1");

    let request = Request::builder(
        Method::Get,
        &format!("/app?shop={SHOP}&embedded=1&id_token={token}"),
    )
    .build();

    let outcome = engine.authenticate_admin(&request).await.unwrap();
    assert!(matches!(outcome, AdminAuth::Authenticated(_)));
}

/// A store whose back end is down: every call fails.
struct BrokenStore;

#[async_trait::async_trait]
impl SessionStore for BrokenStore {
    async fn store_session(&self, _session: Session) -> Result<bool, SessionStorageError> {
        Err(SessionStorageError::Backend {
            detail: "connection refused".to_string(),
        })
    }

    async fn load_session(&self, _id: &str) -> Result<Option<Session>, SessionStorageError> {
        Err(SessionStorageError::Backend {
            detail: "connection refused".to_string(),
        })
    }

    async fn delete_session(&self, _id: &str) -> Result<bool, SessionStorageError> {
        Err(SessionStorageError::Backend {
            detail: "connection refused".to_string(),
        })
    }

    async fn delete_sessions(&self, _ids: &[String]) -> Result<bool, SessionStorageError> {
        Err(SessionStorageError::Backend {
            detail: "connection refused".to_string(),
        })
    }

    async fn find_sessions_by_shop(
        &self,
        _shop: &ShopDomain,
    ) -> Result<Vec<Session>, SessionStorageError> {
        Err(SessionStorageError::Backend {
            detail: "connection refused".to_string(),
        })
    }
}

#[tokio::test]
async fn test_storage_failure_is_an_error_not_unauthenticated() {
    let server = MockServer::start().await;
    let engine = AuthEngine::new(config(&server.uri()), BrokenStore);
    let token = session_token("jti-1");

    let result = engine.authenticate_admin(&bearer_request(&token)).await;

    match result {
        Err(error @ AuthError::Storage(_)) => {
            assert_eq!(error.response().status, 500);
        }
        other => panic!("expected storage error, got {other:?}"),
    }
}
