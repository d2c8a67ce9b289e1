//! Session token (JWT) validation.
//!
//! Embedded apps prove the current viewer's identity with a short-lived
//! session token minted by the Shopify admin client. This module decodes
//! and validates those tokens against the app's secret before they are
//! trusted for token exchange or public-route authentication.
//!
//! # Validation contract
//!
//! A token is accepted only when all of the following hold:
//!
//! - it is a well-formed compact JWT signed with HMAC-SHA256
//! - the signature verifies against the API secret key (or the old key,
//!   when rotation is configured)
//! - `exp` is not in the past and `nbf` is not in the future, beyond a
//!   10-second leeway
//! - `aud` equals the app's API key
//! - `dest` and `iss` reference the same shop domain
//!
//! A token failing any check is rejected with `InvalidJwt`; there is no
//! partial trust. Validation is pure CPU work with no network calls, and
//! the underlying signature check is constant-time.

use crate::auth::oauth::OAuthError;
use crate::config::{AppConfig, ShopDomain};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Leeway for JWT time-based claims validation (10 seconds).
const JWT_LEEWAY_SECS: u64 = 10;

/// Decoded claims of a Shopify session token.
///
/// # Thread Safety
///
/// `SessionToken` is `Send + Sync`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionToken {
    /// Issuer - the admin URL that minted the token.
    ///
    /// Example: `https://shop.myshopify.com/admin`
    pub iss: String,

    /// Destination - the target shop.
    ///
    /// Example: `https://shop.myshopify.com`
    pub dest: String,

    /// Audience - must match the app's API key.
    pub aud: String,

    /// Subject - the user ID for online tokens.
    pub sub: Option<String>,

    /// Expiration timestamp (Unix).
    pub exp: i64,

    /// Not-before timestamp (Unix).
    pub nbf: i64,

    /// Issued-at timestamp (Unix).
    pub iat: i64,

    /// Unique identifier for this token.
    pub jti: String,

    /// Shopify session ID.
    pub sid: Option<String>,
}

impl SessionToken {
    /// Decodes and validates a session token.
    ///
    /// Decoding is attempted with the primary API secret key first, then
    /// with the old secret key if one is configured, so tokens minted just
    /// before a key rotation keep working.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidJwt`] when the token is malformed, the
    /// signature does not verify under any configured key, a time-based
    /// claim is outside the leeway, the audience does not match the app's
    /// API key, or `dest`/`iss` disagree about the shop.
    pub fn decode(token: &str, config: &AppConfig) -> Result<Self, OAuthError> {
        let payload = match Self::decode_with_key(token, config.api_secret_key().as_ref()) {
            Ok(payload) => payload,
            Err(primary_err) => {
                if let Some(old_key) = config.old_api_secret_key() {
                    Self::decode_with_key(token, old_key.as_ref()).map_err(|_| {
                        // Surface the primary error when both keys fail
                        OAuthError::InvalidJwt {
                            reason: format!("Error decoding session token: {primary_err}"),
                        }
                    })?
                } else {
                    return Err(OAuthError::InvalidJwt {
                        reason: format!("Error decoding session token: {primary_err}"),
                    });
                }
            }
        };

        if payload.aud != config.api_key().as_ref() {
            return Err(OAuthError::InvalidJwt {
                reason: "Session token had invalid API key".to_string(),
            });
        }

        if Self::host_of(&payload.dest) != Self::host_of(&payload.iss) {
            return Err(OAuthError::InvalidJwt {
                reason: "Session token issuer and destination reference different shops"
                    .to_string(),
            });
        }

        Ok(payload)
    }

    /// Decodes a JWT using a specific secret key.
    fn decode_with_key(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = JWT_LEEWAY_SECS;
        validation.validate_nbf = true;
        // Audience is validated manually after decoding
        validation.validate_aud = false;

        let key = DecodingKey::from_secret(secret.as_bytes());
        let token_data = decode::<Self>(token, &key, &validation)?;

        Ok(token_data.claims)
    }

    /// Returns the host portion of a claim URL, without scheme or path.
    fn host_of(claim: &str) -> &str {
        let without_scheme = claim
            .strip_prefix("https://")
            .or_else(|| claim.strip_prefix("http://"))
            .unwrap_or(claim);
        without_scheme
            .split_once('/')
            .map_or(without_scheme, |(host, _)| host)
    }

    /// Returns the shop domain extracted from the `dest` claim.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidJwt`] if the destination is not a valid
    /// shop domain.
    pub fn shop(&self) -> Result<ShopDomain, OAuthError> {
        ShopDomain::new(Self::host_of(&self.dest)).map_err(|_| OAuthError::InvalidJwt {
            reason: "Session token destination is not a valid shop domain".to_string(),
        })
    }

    /// Returns the Shopify user ID if this is an admin online session token.
    ///
    /// `Some(user_id)` is returned only when the `sub` claim is numeric and
    /// the `iss` claim ends with `/admin`. Offline and non-admin tokens
    /// yield `None`.
    #[must_use]
    pub fn shopify_user_id(&self) -> Option<u64> {
        if !self.is_admin_session_token() {
            return None;
        }

        self.sub.as_ref().and_then(|sub| {
            if Self::is_numeric(sub) {
                sub.parse().ok()
            } else {
                None
            }
        })
    }

    /// Checks if the `iss` claim ends with `/admin`.
    fn is_admin_session_token(&self) -> bool {
        self.iss.ends_with("/admin")
    }

    /// Checks if a string contains only ASCII digits.
    fn is_numeric(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
    }
}

// Verify SessionToken is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SessionToken>();
};
