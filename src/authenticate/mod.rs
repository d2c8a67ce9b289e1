//! The authentication strategy engine.
//!
//! [`AuthEngine`] is the top-level state machine: it inspects an incoming
//! request, selects the applicable strategy (bounce page, token exchange,
//! redirect-based OAuth, public session-token check, webhook signature,
//! app proxy signature), drives the redirect/response sequence for that
//! strategy, and persists the resulting [`Session`] exactly once per
//! logical identity.
//!
//! The engine is an explicitly constructed context object: it owns the
//! idempotent guard's map and the HTTP client, so tests create isolated
//! instances instead of resetting shared globals.
//!
//! # Outcomes
//!
//! Strategies return tagged outcomes instead of throwing responses:
//! [`AdminAuth::Authenticated`] carries the session and validated token,
//! while [`AdminAuth::Redirect`] / [`AdminAuth::Rejected`] carry the
//! [`Response`] a framework adapter should send (or throw, for frameworks
//! that short-circuit via exceptions).
//!
//! # Example
//!
//! ```rust,ignore
//! use shopify_app_auth::authenticate::{AdminAuth, AuthEngine};
//!
//! let engine = AuthEngine::new(config, MemorySessionStore::new());
//! match engine.authenticate_admin(&request).await? {
//!     AdminAuth::Authenticated(ctx) => serve(ctx.session),
//!     AdminAuth::Redirect(response) | AdminAuth::Rejected(response) => send(response),
//! }
//! ```

mod admin;
mod app_proxy;
mod bounce;
pub mod cors;
mod public;
mod webhook;

pub use admin::CallbackOutcome;
pub use app_proxy::AppProxyContext;
pub use public::{PublicAuth, PublicContext};
pub use webhook::{WebhookContext, WebhookError};

use std::sync::Arc;

use thiserror::Error;

use crate::auth::oauth::{OAuthError, SessionToken};
use crate::auth::Session;
use crate::config::{AppConfig, ShopDomain};
use crate::guard::IdempotentGuard;
use crate::http::{Request, Response};
use crate::session_store::{SessionStore, SessionStorageError};

/// Cookie carrying the signed OAuth state between begin and callback.
pub const STATE_COOKIE: &str = "shopify_oauth_state";

/// Cookie identifying the session for non-embedded apps.
pub const SESSION_COOKIE: &str = "shopify_app_session";

/// Lifetime of the OAuth state cookie, in seconds.
pub const STATE_COOKIE_MAX_AGE: i64 = 600;

/// Errors surfaced by the strategy engine.
///
/// Validation failures with a well-defined fallback (missing session-token
/// query parameter, absent state cookie) are recovered internally and never
/// reach this type; everything here is for the caller to convert into a
/// response via [`AuthError::response`].
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// The request is malformed (missing/invalid shop or host parameter).
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What was malformed. Not echoed to clients.
        reason: String,
    },

    /// An OAuth validation or exchange failure.
    #[error(transparent)]
    Oauth(#[from] OAuthError),

    /// An expected cookie was absent.
    ///
    /// Treated as an expired flow, not an attack: the caller may restart
    /// authentication.
    #[error("Expected cookie '{name}' was not found")]
    CookieNotFound {
        /// The cookie's name.
        name: String,
    },

    /// The storage back end failed.
    ///
    /// Never conflated with "no session": this propagates as a server
    /// error.
    #[error(transparent)]
    Storage(#[from] SessionStorageError),
}

impl AuthError {
    /// Converts the error into the response a framework adapter should
    /// send. Bodies are generic; request-supplied values are never echoed.
    #[must_use]
    pub fn response(&self) -> Response {
        match self {
            Self::InvalidRequest { .. } => Response::text(400, "Invalid request"),
            Self::Oauth(OAuthError::InvalidJwt { .. }) => {
                Response::text(401, "Invalid session token")
            }
            Self::Oauth(
                OAuthError::InvalidHmac
                | OAuthError::StateMismatch
                | OAuthError::InvalidCallback { .. },
            ) => Response::text(400, "Invalid OAuth request"),
            Self::CookieNotFound { .. } => Response::text(400, "Authentication flow expired"),
            Self::Oauth(_) | Self::Storage(_) => Response::text(500, "Authentication failed"),
        }
    }
}

/// Context returned for an authenticated admin request.
#[derive(Debug, Clone)]
pub struct AdminContext {
    /// The shop the request is authenticated for.
    pub shop: ShopDomain,

    /// The stored or freshly exchanged session.
    pub session: Session,

    /// The validated session token, when the request carried one.
    pub token: Option<SessionToken>,
}

/// Outcome of admin authentication.
#[derive(Debug, Clone)]
pub enum AdminAuth {
    /// The request is authenticated.
    Authenticated(Box<AdminContext>),

    /// The client must follow a redirect or interstitial page (embed
    /// redirect, bounce page, OAuth begin) before retrying.
    Redirect(Response),

    /// Terminal rejection (401/410, CORS preflight).
    Rejected(Response),
}

impl AdminAuth {
    /// Returns the response to send for non-authenticated outcomes.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::Authenticated(_) => None,
            Self::Redirect(response) | Self::Rejected(response) => Some(response),
        }
    }
}

/// Hook invoked after a successful OAuth callback.
///
/// Returning `Some(response)` overrides the default post-auth redirect;
/// the response is passed through unchanged.
pub type AfterAuthHook = Arc<dyn Fn(&Session) -> Option<Response> + Send + Sync>;

/// The strategy engine. See the [module documentation](self).
pub struct AuthEngine<S: SessionStore> {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) store: Arc<S>,
    pub(crate) guard: IdempotentGuard<Result<Session, AuthError>>,
    pub(crate) client: reqwest::Client,
    pub(crate) after_auth: Option<AfterAuthHook>,
}

impl<S: SessionStore> AuthEngine<S> {
    /// Creates an engine owning its own guard map and HTTP client.
    #[must_use]
    pub fn new(config: AppConfig, store: S) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            guard: IdempotentGuard::new(),
            client: reqwest::Client::new(),
            after_auth: None,
        }
    }

    /// Installs an after-auth hook run on successful OAuth callbacks.
    #[must_use]
    pub fn with_after_auth(mut self, hook: AfterAuthHook) -> Self {
        self.after_auth = Some(hook);
        self
    }

    /// Returns the engine's configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the session store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decorates a response with the CORS headers embedded fetch callers
    /// need.
    #[must_use]
    pub fn cors(&self, response: Response, request: &Request) -> Response {
        cors::add_cors_headers(response, request)
    }
}

impl<S: SessionStore> std::fmt::Debug for AuthEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEngine")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_response_mapping() {
        let invalid = AuthError::InvalidRequest {
            reason: "missing shop".to_string(),
        };
        assert_eq!(invalid.response().status, 400);

        let jwt = AuthError::Oauth(OAuthError::InvalidJwt {
            reason: "expired".to_string(),
        });
        assert_eq!(jwt.response().status, 401);

        let hmac = AuthError::Oauth(OAuthError::InvalidHmac);
        assert_eq!(hmac.response().status, 400);

        let storage = AuthError::Storage(SessionStorageError::Backend {
            detail: "down".to_string(),
        });
        assert_eq!(storage.response().status, 500);
    }

    #[test]
    fn test_error_responses_do_not_echo_input() {
        let invalid = AuthError::InvalidRequest {
            reason: "shop=<script>alert(1)</script>".to_string(),
        };
        let body = invalid.response().body.unwrap();
        assert!(!body.contains("script"));
    }

    #[test]
    fn test_engine_cors_decorates_response() {
        use crate::http::Method;
        use crate::session_store::MemorySessionStore;

        let config = AppConfig::builder()
            .api_key(crate::config::ApiKey::new("key").unwrap())
            .api_secret_key(crate::config::ApiSecretKey::new("secret").unwrap())
            .build()
            .unwrap();
        let engine = AuthEngine::new(config, MemorySessionStore::new());

        let request = Request::builder(Method::Get, "/api/data")
            .header("Origin", "https://admin.shopify.com")
            .build();
        let response = engine.cors(Response::empty(200), &request);

        assert_eq!(
            response.header("access-control-allow-origin"),
            Some("https://admin.shopify.com")
        );
    }

    #[test]
    fn test_admin_auth_response_accessor() {
        let redirect = AdminAuth::Redirect(Response::redirect("https://example.com"));
        assert_eq!(redirect.response().unwrap().status, 302);

        let rejected = AdminAuth::Rejected(Response::text(401, "Unauthorized"));
        assert_eq!(rejected.response().unwrap().status, 401);
    }
}
