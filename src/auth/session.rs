//! Session management for authenticated API access.
//!
//! This module provides the [`Session`] type representing one authenticated
//! relationship between the app and a shop, plus the token-response types
//! that sessions are built from.

use crate::auth::{AssociatedUser, AuthScopes};
use crate::config::ShopDomain;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Represents an authenticated session for API calls.
///
/// Sessions hold the credential state needed to make API requests on behalf
/// of a shop. They can be either online (user-bound, expiring) or offline
/// (app-level, long-lived). Session ids are deterministic so that repeated
/// authentications for the same identity converge on the same storage row:
///
/// - offline: `offline_<shop>`
/// - online: `<shop>_<user id>`
/// - customer account: `<shop>_customer_<customer id>`
///
/// # Thread Safety
///
/// `Session` is `Send + Sync`, making it safe to share across threads.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::{Session, ShopDomain};
///
/// let shop = ShopDomain::new("my-store").unwrap();
/// let session = Session::new(
///     Session::offline_id(&shop),
///     shop,
///     "access-token".to_string(),
///     "read_products".parse().unwrap(),
///     false, // offline session
///     None,  // no expiration
/// );
///
/// assert_eq!(session.id, "offline_my-store.myshopify.com");
/// assert!(session.is_active());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique, deterministic identifier for this session.
    pub id: String,

    /// The shop this session is for.
    pub shop: ShopDomain,

    /// Whether this is an online (user-bound) session.
    pub is_online: bool,

    /// The OAuth scopes granted to this session.
    pub scopes: AuthScopes,

    /// The access token for API authentication.
    pub access_token: String,

    /// Refresh token, present for expiring offline tokens and
    /// customer-account sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Identity token from the customer-account flow, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// When this session expires. Absent means non-expiring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,

    /// CSRF nonce generated at authorization start; single-use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Online-token metadata, present only for online sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_access_info: Option<OnlineAccessInfo>,
}

impl Session {
    /// Creates a new session with the specified parameters.
    #[must_use]
    pub const fn new(
        id: String,
        shop: ShopDomain,
        access_token: String,
        scopes: AuthScopes,
        is_online: bool,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            shop,
            is_online,
            scopes,
            access_token,
            refresh_token: None,
            id_token: None,
            expires,
            state: None,
            online_access_info: None,
        }
    }

    /// Returns the deterministic id for a shop's offline session.
    #[must_use]
    pub fn offline_id(shop: &ShopDomain) -> String {
        format!("offline_{}", shop.as_ref())
    }

    /// Returns the deterministic id for a shop/user online session.
    #[must_use]
    pub fn online_id(shop: &ShopDomain, user_id: u64) -> String {
        format!("{}_{user_id}", shop.as_ref())
    }

    /// Returns the deterministic id for a shop/customer session created by
    /// the customer-account flow.
    #[must_use]
    pub fn customer_id(shop: &ShopDomain, customer_id: &str) -> String {
        format!("{}_customer_{customer_id}", shop.as_ref())
    }

    /// Returns `true` if this session has expired.
    ///
    /// Sessions without an expiration time never expire.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires.is_some_and(|expires| Utc::now() > expires)
    }

    /// Returns `true` if this session is active (has a token and is not
    /// expired).
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.access_token.is_empty() && !self.expired()
    }

    /// Returns `true` if this session is active and its granted scopes
    /// still cover `required`.
    #[must_use]
    pub fn is_active_for(&self, required: &AuthScopes) -> bool {
        self.is_active() && self.scopes.covers(required)
    }

    /// Builds a session from a token endpoint response.
    ///
    /// The session kind is inferred from the response: a response carrying
    /// `associated_user` produces an online session keyed by shop and user
    /// id; anything else produces an offline session. `expires_in` populates
    /// [`expires`](Self::expires) in both cases, covering expiring offline
    /// tokens as well.
    #[must_use]
    pub fn from_access_token_response(shop: ShopDomain, response: &AccessTokenResponse) -> Self {
        let scopes = AuthScopes::from(
            response
                .scope
                .split(',')
                .map(str::to_string)
                .collect::<Vec<_>>(),
        );
        let expires = response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        response.associated_user.as_ref().map_or_else(
            || {
                let mut session = Self::new(
                    Self::offline_id(&shop),
                    shop.clone(),
                    response.access_token.clone(),
                    scopes.clone(),
                    false,
                    expires,
                );
                session.refresh_token = response.refresh_token.clone();
                session
            },
            |user| {
                let mut session = Self::new(
                    Self::online_id(&shop, user.id),
                    shop.clone(),
                    response.access_token.clone(),
                    scopes.clone(),
                    true,
                    expires,
                );
                session.online_access_info = Some(OnlineAccessInfo {
                    expires_in: response.expires_in,
                    associated_user_scope: response.associated_user_scope.clone(),
                    associated_user: user.clone(),
                });
                session
            },
        )
    }
}

/// Online-token metadata attached to online sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineAccessInfo {
    /// Seconds until the token expires, as reported by the token endpoint.
    pub expires_in: Option<i64>,

    /// The subset of the app's scopes available to the associated user.
    pub associated_user_scope: Option<String>,

    /// The staff user this token is bound to.
    pub associated_user: AssociatedUser,
}

/// Response body from Shopify's access token endpoint.
///
/// Shared by the authorization-code exchange and the session-token exchange;
/// the optional fields distinguish online from offline grants.
#[derive(Clone, Debug, Deserialize)]
pub struct AccessTokenResponse {
    /// The access token.
    pub access_token: String,

    /// Comma-joined granted scopes.
    pub scope: String,

    /// Seconds until expiry, for online tokens and expiring offline tokens.
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// Refresh token for expiring offline tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// The subset of scopes available to the associated user.
    #[serde(default)]
    pub associated_user_scope: Option<String>,

    /// The staff user, present for online grants only.
    #[serde(default)]
    pub associated_user: Option<AssociatedUser>,

    /// Shopify-provided session id, if any.
    #[serde(default)]
    pub session: Option<String>,
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
};
