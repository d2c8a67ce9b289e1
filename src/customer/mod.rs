//! Customer Account OAuth flow (PKCE).
//!
//! Authenticates storefront customers against Shopify's Customer Account
//! API with an authorization-code + PKCE flow, independent of the admin
//! flow but built from the same primitives (state nonces, signed cookies,
//! HMAC helpers, [`Session`]).
//!
//! # Flow
//!
//! 1. **Begin**: generate a PKCE pair and a state nonce, sign both into
//!    short-lived cookies, discover the shop's OAuth endpoints, and
//!    redirect to the authorization endpoint with the S256 challenge.
//! 2. **Callback**: verify the returned state against the cookie (exact
//!    match, single use), require the verifier cookie (a distinct error
//!    from a state mismatch), exchange the code + verifier for tokens,
//!    decode the identity token's claims to obtain the customer id, and
//!    build a [`Session`] keyed by shop and customer with its expiry taken
//!    from `expires_in`.
//!
//! The identity token's signature is not re-verified here: it arrives over
//! the server-to-server TLS exchange, not from the browser.

use std::collections::HashMap;

use base64::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::oauth::hmac::constant_time_compare;
use crate::auth::oauth::StateParam;
use crate::auth::pkce::PkcePair;
use crate::auth::{AuthScopes, Session};
use crate::config::{AppConfig, ShopDomain};
use crate::http::cookies::verify_signed_value;
use crate::http::{Request, Response, SetCookie};

/// Cookie carrying the signed state nonce between begin and callback.
pub const STATE_COOKIE: &str = "customer_account_state";

/// Cookie carrying the signed PKCE verifier between begin and callback.
pub const VERIFIER_COOKIE: &str = "customer_account_verifier";

/// Lifetime of the flow cookies, in seconds.
pub const FLOW_COOKIE_MAX_AGE: i64 = 600;

/// Scopes requested from the Customer Account API.
const CUSTOMER_SCOPES: &str = "openid email customer-account-api:full";

/// Errors from the customer-account flow.
#[derive(Debug, Error, Clone)]
pub enum CustomerAccountError {
    /// Endpoint discovery failed.
    #[error("Customer account endpoint discovery failed with status {status}: {message}")]
    Discovery {
        /// HTTP status (0 for transport errors).
        status: u16,
        /// Error detail.
        message: String,
    },

    /// A required callback parameter is absent.
    #[error("Missing required parameter: {name}")]
    MissingParam {
        /// The parameter's name.
        name: &'static str,
    },

    /// A flow cookie is absent or unsigned.
    ///
    /// Distinct from [`StateMismatch`](Self::StateMismatch): an expired
    /// cookie means the flow can safely restart.
    #[error("Expected cookie '{name}' was not found")]
    CookieNotFound {
        /// The cookie's name.
        name: &'static str,
    },

    /// The returned state did not match the cookie value.
    #[error("State parameter did not match the value issued at authorization start")]
    StateMismatch,

    /// The code + verifier exchange failed.
    #[error("Customer token exchange failed with status {status}: {message}")]
    ExchangeFailed {
        /// HTTP status (0 for transport errors).
        status: u16,
        /// Error detail.
        message: String,
    },

    /// The identity token was missing or undecodable.
    #[error("Identity token was missing or invalid")]
    InvalidIdToken,
}

/// OAuth endpoints discovered for a shop.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerAuthEndpoints {
    /// The authorization endpoint.
    pub authorization_endpoint: String,

    /// The token endpoint.
    pub token_endpoint: String,

    /// The RP-initiated logout endpoint, when advertised.
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// Token endpoint response for the customer flow.
#[derive(Debug, Deserialize)]
struct CustomerTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Identity token claims we consume.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
}

/// Result of a completed customer-account callback.
#[derive(Debug, Clone)]
pub struct CustomerCallback {
    /// The new customer session, keyed `<shop>_customer_<id>`.
    pub session: Session,

    /// Cookies that delete the single-use flow cookies on the client.
    pub cookies: Vec<SetCookie>,
}

/// Drives the customer-account PKCE flow.
///
/// Owns a per-process discovery cache: each shop's endpoints are fetched
/// once and reused for the process lifetime.
pub struct CustomerAccountAuth {
    config: AppConfig,
    client: reqwest::Client,
    discovery: RwLock<HashMap<String, CustomerAuthEndpoints>>,
}

impl CustomerAccountAuth {
    /// Creates a flow driver for the given configuration.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            discovery: RwLock::new(HashMap::new()),
        }
    }

    /// Discovers (or returns cached) OAuth endpoints for `shop`.
    ///
    /// # Errors
    ///
    /// Returns [`CustomerAccountError::Discovery`] when the well-known
    /// document cannot be fetched or parsed.
    pub async fn discover(
        &self,
        shop: &ShopDomain,
    ) -> Result<CustomerAuthEndpoints, CustomerAccountError> {
        if let Some(cached) = self.discovery.read().await.get(shop.as_ref()) {
            return Ok(cached.clone());
        }

        let url = format!(
            "{}/.well-known/openid-configuration",
            self.config.shopify_origin(shop)
        );
        let response = self.client.get(&url).send().await.map_err(|e| {
            CustomerAccountError::Discovery {
                status: 0,
                message: format!("Network error: {e}"),
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(CustomerAccountError::Discovery {
                status,
                message: response.text().await.unwrap_or_default(),
            });
        }

        let endpoints: CustomerAuthEndpoints =
            response
                .json()
                .await
                .map_err(|e| CustomerAccountError::Discovery {
                    status,
                    message: format!("Failed to parse discovery document: {e}"),
                })?;

        self.discovery
            .write()
            .await
            .insert(shop.as_ref().to_string(), endpoints.clone());

        Ok(endpoints)
    }

    /// Begins the flow: PKCE pair + state into signed cookies, redirect to
    /// the authorization endpoint with the S256 challenge.
    ///
    /// # Errors
    ///
    /// Returns [`CustomerAccountError::Discovery`] when endpoint discovery
    /// fails.
    pub async fn begin(
        &self,
        shop: &ShopDomain,
        redirect_uri: &str,
    ) -> Result<Response, CustomerAccountError> {
        let endpoints = self.discover(shop).await?;

        let pkce = PkcePair::generate();
        let state = StateParam::new();

        let params = [
            ("client_id", self.config.api_key().as_ref()),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", CUSTOMER_SCOPES),
            ("state", state.as_ref()),
            ("code_challenge", pkce.challenge()),
            ("code_challenge_method", "S256"),
        ];
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let auth_url = format!("{}?{query}", endpoints.authorization_endpoint);

        let state_cookie = SetCookie::signed(STATE_COOKIE, state.as_ref(), &self.config)
            .max_age(FLOW_COOKIE_MAX_AGE);
        let verifier_cookie = SetCookie::signed(VERIFIER_COOKIE, pkce.verifier(), &self.config)
            .max_age(FLOW_COOKIE_MAX_AGE);

        Ok(Response::redirect(auth_url)
            .with_cookie(&state_cookie)
            .with_cookie(&verifier_cookie))
    }

    /// Completes the flow: verifies the single-use state cookie, exchanges
    /// the code + verifier, and builds the customer session.
    ///
    /// # Errors
    ///
    /// - [`CustomerAccountError::MissingParam`] when `code` or `state` is
    ///   absent from the callback query
    /// - [`CustomerAccountError::CookieNotFound`] when a flow cookie
    ///   expired (safe to restart)
    /// - [`CustomerAccountError::StateMismatch`] when the returned state
    ///   differs from the cookie value
    /// - [`CustomerAccountError::ExchangeFailed`] when the token request
    ///   fails
    /// - [`CustomerAccountError::InvalidIdToken`] when no usable identity
    ///   token is returned
    pub async fn callback(
        &self,
        shop: &ShopDomain,
        redirect_uri: &str,
        request: &Request,
    ) -> Result<CustomerCallback, CustomerAccountError> {
        let code = request
            .query_param("code")
            .ok_or(CustomerAccountError::MissingParam { name: "code" })?;
        let returned_state = request
            .query_param("state")
            .ok_or(CustomerAccountError::MissingParam { name: "state" })?;

        let cookies = request.cookies();
        let expected_state = cookies
            .get(STATE_COOKIE)
            .and_then(|raw| verify_signed_value(raw, &self.config))
            .ok_or(CustomerAccountError::CookieNotFound { name: STATE_COOKIE })?;

        if !constant_time_compare(returned_state, &expected_state) {
            tracing::warn!(shop = shop.as_ref(), "customer callback state mismatch");
            return Err(CustomerAccountError::StateMismatch);
        }

        let verifier = cookies
            .get(VERIFIER_COOKIE)
            .and_then(|raw| verify_signed_value(raw, &self.config))
            .ok_or(CustomerAccountError::CookieNotFound {
                name: VERIFIER_COOKIE,
            })?;

        let endpoints = self.discover(shop).await?;

        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.api_key().as_ref()),
            ("redirect_uri", redirect_uri),
            ("code", code),
            ("code_verifier", &verifier),
        ];

        let response = self
            .client
            .post(&endpoints.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| CustomerAccountError::ExchangeFailed {
                status: 0,
                message: format!("Network error: {e}"),
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(CustomerAccountError::ExchangeFailed {
                status,
                message: response.text().await.unwrap_or_default(),
            });
        }

        let tokens: CustomerTokenResponse =
            response
                .json()
                .await
                .map_err(|e| CustomerAccountError::ExchangeFailed {
                    status,
                    message: format!("Failed to parse token response: {e}"),
                })?;

        let id_token = tokens
            .id_token
            .as_deref()
            .ok_or(CustomerAccountError::InvalidIdToken)?;
        let customer_id = decode_customer_id(id_token)?;

        let scopes = tokens
            .scope
            .as_deref()
            .unwrap_or(CUSTOMER_SCOPES)
            .split(' ')
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut session = Session::new(
            Session::customer_id(shop, &customer_id),
            shop.clone(),
            tokens.access_token,
            AuthScopes::from(scopes),
            true,
            tokens
                .expires_in
                .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs)),
        );
        session.refresh_token = tokens.refresh_token;
        session.id_token = Some(id_token.to_string());

        // The flow cookies are single-use: delete them with the response
        let cookies = vec![
            SetCookie::expired(STATE_COOKIE),
            SetCookie::expired(VERIFIER_COOKIE),
        ];

        Ok(CustomerCallback { session, cookies })
    }

    /// Builds the RP-initiated logout URL for a session's identity token.
    ///
    /// # Errors
    ///
    /// Returns [`CustomerAccountError::Discovery`] when discovery fails or
    /// the shop advertises no logout endpoint.
    pub async fn logout_url(
        &self,
        shop: &ShopDomain,
        id_token: &str,
        post_logout_redirect_uri: &str,
    ) -> Result<String, CustomerAccountError> {
        let endpoints = self.discover(shop).await?;
        let end_session = endpoints
            .end_session_endpoint
            .ok_or(CustomerAccountError::Discovery {
                status: 0,
                message: "Shop advertises no end_session_endpoint".to_string(),
            })?;

        Ok(format!(
            "{end_session}?id_token_hint={}&post_logout_redirect_uri={}",
            urlencoding::encode(id_token),
            urlencoding::encode(post_logout_redirect_uri)
        ))
    }
}

impl std::fmt::Debug for CustomerAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerAccountAuth")
            .field("config", &self.config)
            .finish()
    }
}

/// Extracts the customer id (`sub` claim) from an identity token without
/// signature verification.
fn decode_customer_id(id_token: &str) -> Result<String, CustomerAccountError> {
    let payload_segment = id_token
        .split('.')
        .nth(1)
        .ok_or(CustomerAccountError::InvalidIdToken)?;

    let decoded = BASE64_URL_SAFE_NO_PAD
        .decode(payload_segment.as_bytes())
        .map_err(|_| CustomerAccountError::InvalidIdToken)?;

    let claims: IdTokenClaims =
        serde_json::from_slice(&decoded).map_err(|_| CustomerAccountError::InvalidIdToken)?;

    Ok(claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey, HostUrl};
    use crate::http::Method;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(api_host: &str) -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new("test-api-key").unwrap())
            .api_secret_key(ApiSecretKey::new("test-secret").unwrap())
            .api_host(HostUrl::new(api_host).unwrap())
            .build()
            .unwrap()
    }

    fn fake_id_token(sub: &str) -> String {
        let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = BASE64_URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}"}}"#).as_bytes());
        format!("{header}.{payload}.sig")
    }

    fn signed_cookie_value(name: &str, value: &str, config: &AppConfig) -> String {
        let header = SetCookie::signed(name, value, config).to_header_value();
        header
            .strip_prefix(&format!("{name}="))
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    async fn mock_discovery(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authorization_endpoint": format!("{}/oauth/authorize", server.uri()),
                "token_endpoint": format!("{}/oauth/token", server.uri()),
                "end_session_endpoint": format!("{}/oauth/logout", server.uri()),
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_begin_redirects_with_challenge_and_cookies() {
        let server = MockServer::start().await;
        mock_discovery(&server).await;
        let auth = CustomerAccountAuth::new(config_for(&server.uri()));
        let shop = ShopDomain::new("test-shop").unwrap();

        let response = auth
            .begin(&shop, "https://myapp.example.com/customer/callback")
            .await
            .unwrap();

        assert_eq!(response.status, 302);
        let location = response.header("location").unwrap();
        assert!(location.starts_with(&format!("{}/oauth/authorize?", server.uri())));
        assert!(location.contains("code_challenge="));
        assert!(location.contains("code_challenge_method=S256"));
        assert!(location.contains("state="));

        let cookie_names: Vec<&str> = response
            .headers
            .iter()
            .filter(|(name, _)| name == "Set-Cookie")
            .map(|(_, value)| value.split('=').next().unwrap())
            .collect();
        assert!(cookie_names.contains(&STATE_COOKIE));
        assert!(cookie_names.contains(&VERIFIER_COOKIE));
    }

    #[tokio::test]
    async fn test_discovery_is_cached_per_shop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authorization_endpoint": "https://a/authorize",
                "token_endpoint": "https://a/token",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = CustomerAccountAuth::new(config_for(&server.uri()));
        let shop = ShopDomain::new("test-shop").unwrap();

        auth.discover(&shop).await.unwrap();
        auth.discover(&shop).await.unwrap();
    }

    #[tokio::test]
    async fn test_callback_happy_path_builds_customer_session() {
        let server = MockServer::start().await;
        mock_discovery(&server).await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "customer-access-token",
                "refresh_token": "customer-refresh-token",
                "id_token": fake_id_token("8899"),
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let config = config_for(&server.uri());
        let auth = CustomerAccountAuth::new(config.clone());
        let shop = ShopDomain::new("test-shop").unwrap();

        let state = "the-state-value";
        let verifier = "the-verifier-value";
        let cookie_header = format!(
            "{STATE_COOKIE}={}; {VERIFIER_COOKIE}={}",
            signed_cookie_value(STATE_COOKIE, state, &config),
            signed_cookie_value(VERIFIER_COOKIE, verifier, &config),
        );

        let request = Request::builder(
            Method::Get,
            &format!("/customer/callback?code=auth-code&state={state}"),
        )
        .header("Cookie", cookie_header)
        .build();

        let result = auth
            .callback(&shop, "https://myapp.example.com/customer/callback", &request)
            .await
            .unwrap();

        assert_eq!(
            result.session.id,
            "test-shop.myshopify.com_customer_8899"
        );
        assert_eq!(result.session.access_token, "customer-access-token");
        assert!(result.session.expires.is_some());
        assert_eq!(
            result.session.refresh_token.as_deref(),
            Some("customer-refresh-token")
        );
        // Both single-use cookies are deleted
        assert_eq!(result.cookies.len(), 2);
    }

    #[tokio::test]
    async fn test_callback_state_mismatch_is_distinct_error() {
        let server = MockServer::start().await;
        mock_discovery(&server).await;
        let config = config_for(&server.uri());
        let auth = CustomerAccountAuth::new(config.clone());
        let shop = ShopDomain::new("test-shop").unwrap();

        let cookie_header = format!(
            "{STATE_COOKIE}={}; {VERIFIER_COOKIE}={}",
            signed_cookie_value(STATE_COOKIE, "issued-state", &config),
            signed_cookie_value(VERIFIER_COOKIE, "verifier", &config),
        );
        let request = Request::builder(
            Method::Get,
            "/customer/callback?code=auth-code&state=attacker-state",
        )
        .header("Cookie", cookie_header)
        .build();

        let result = auth.callback(&shop, "https://x/cb", &request).await;
        assert!(matches!(result, Err(CustomerAccountError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_callback_missing_state_cookie_is_cookie_not_found() {
        let server = MockServer::start().await;
        let config = config_for(&server.uri());
        let auth = CustomerAccountAuth::new(config);
        let shop = ShopDomain::new("test-shop").unwrap();

        let request =
            Request::builder(Method::Get, "/customer/callback?code=c&state=s").build();

        let result = auth.callback(&shop, "https://x/cb", &request).await;
        assert!(matches!(
            result,
            Err(CustomerAccountError::CookieNotFound { name }) if name == STATE_COOKIE
        ));
    }

    #[tokio::test]
    async fn test_callback_missing_verifier_cookie_is_distinct() {
        let server = MockServer::start().await;
        let config = config_for(&server.uri());
        let auth = CustomerAccountAuth::new(config.clone());
        let shop = ShopDomain::new("test-shop").unwrap();

        let state = "issued-state";
        let cookie_header = format!(
            "{STATE_COOKIE}={}",
            signed_cookie_value(STATE_COOKIE, state, &config)
        );
        let request = Request::builder(
            Method::Get,
            &format!("/customer/callback?code=c&state={state}"),
        )
        .header("Cookie", cookie_header)
        .build();

        let result = auth.callback(&shop, "https://x/cb", &request).await;
        assert!(matches!(
            result,
            Err(CustomerAccountError::CookieNotFound { name }) if name == VERIFIER_COOKIE
        ));
    }

    #[tokio::test]
    async fn test_logout_url_uses_discovered_endpoint() {
        let server = MockServer::start().await;
        mock_discovery(&server).await;
        let auth = CustomerAccountAuth::new(config_for(&server.uri()));
        let shop = ShopDomain::new("test-shop").unwrap();

        let url = auth
            .logout_url(&shop, "the-id-token", "https://myapp.example.com/")
            .await
            .unwrap();

        assert!(url.starts_with(&format!("{}/oauth/logout?", server.uri())));
        assert!(url.contains("id_token_hint=the-id-token"));
    }

    #[test]
    fn test_decode_customer_id() {
        assert_eq!(decode_customer_id(&fake_id_token("42")).unwrap(), "42");
        assert!(decode_customer_id("garbage").is_err());
        assert!(decode_customer_id("a.!!!.c").is_err());
    }
}
