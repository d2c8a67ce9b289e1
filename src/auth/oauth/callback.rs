//! OAuth callback validation and authorization-code exchange.
//!
//! After a merchant authorizes the app, Shopify redirects back to the
//! callback URL with query parameters including an authorization code.
//! This module validates that callback and exchanges the code for an
//! access token:
//!
//! 1. The HMAC query signature is verified against the API secret key
//! 2. The `state` parameter is compared with the value issued at begin
//! 3. The shop domain is sanitized
//! 4. The code is exchanged for an access token server-to-server
//!
//! Validation always precedes the network call: a request with a bad
//! signature or state never reaches the token endpoint.

use crate::auth::oauth::error::OAuthError;
use crate::auth::oauth::hmac::{compute_signature, constant_time_compare};
use crate::auth::session::AccessTokenResponse;
use crate::auth::Session;
use crate::config::{AppConfig, ShopDomain};

/// Query parameters of an OAuth callback request.
///
/// Holds every parameter Shopify sent so the HMAC can be recomputed over
/// the exact received set.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::auth::oauth::CallbackQuery;
///
/// let pairs = vec![
///     ("code".to_string(), "abc".to_string()),
///     ("shop".to_string(), "test-shop.myshopify.com".to_string()),
///     ("state".to_string(), "nonce".to_string()),
///     ("timestamp".to_string(), "1700000000".to_string()),
///     ("hmac".to_string(), "deadbeef".to_string()),
/// ];
/// let query = CallbackQuery::from_pairs(pairs).unwrap();
/// assert_eq!(query.shop(), "test-shop.myshopify.com");
/// ```
#[derive(Clone, Debug)]
pub struct CallbackQuery {
    /// All received parameters except `hmac`/`signature`, in received order.
    params: Vec<(String, String)>,
    /// The received `hmac` parameter.
    hmac: String,
}

impl CallbackQuery {
    /// Builds a callback query from decoded query pairs.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidCallback`] if `code`, `shop`, `state`,
    /// or `hmac` is missing.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, OAuthError> {
        let mut hmac = None;
        let mut params = Vec::with_capacity(pairs.len());

        for (key, value) in pairs {
            if key == "hmac" {
                hmac = Some(value);
            } else if key != "signature" {
                params.push((key, value));
            }
        }

        let hmac = hmac.ok_or_else(|| OAuthError::InvalidCallback {
            reason: "Missing hmac parameter".to_string(),
        })?;

        let query = Self { params, hmac };

        for required in ["code", "shop", "state"] {
            if query.param(required).is_none() {
                return Err(OAuthError::InvalidCallback {
                    reason: format!("Missing {required} parameter"),
                });
            }
        }

        Ok(query)
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the authorization code.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // presence checked in from_pairs
    pub fn code(&self) -> &str {
        self.param("code").expect("checked in from_pairs")
    }

    /// Returns the raw shop parameter.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // presence checked in from_pairs
    pub fn shop(&self) -> &str {
        self.param("shop").expect("checked in from_pairs")
    }

    /// Returns the state parameter.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // presence checked in from_pairs
    pub fn state(&self) -> &str {
        self.param("state").expect("checked in from_pairs")
    }

    /// Returns the received HMAC.
    #[must_use]
    pub fn hmac(&self) -> &str {
        &self.hmac
    }

    /// Returns the string the HMAC is computed over: every parameter except
    /// `hmac`/`signature` as `key=value`, sorted by key, joined with `&`.
    #[must_use]
    pub fn to_signable_string(&self) -> String {
        let mut pairs: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        pairs.sort_unstable();
        pairs.join("&")
    }
}

/// Validates the HMAC signature of an OAuth callback.
///
/// The primary API secret key is tried first, then the old key when one is
/// configured, supporting key rotation without breaking in-flight flows.
/// Both comparisons are constant-time.
#[must_use]
pub fn validate_hmac(query: &CallbackQuery, config: &AppConfig) -> bool {
    let signable = query.to_signable_string();

    let computed = compute_signature(&signable, config.api_secret_key().as_ref());
    if constant_time_compare(&computed, query.hmac()) {
        return true;
    }

    if let Some(old_secret) = config.old_api_secret_key() {
        let computed_old = compute_signature(&signable, old_secret.as_ref());
        if constant_time_compare(&computed_old, query.hmac()) {
            return true;
        }
    }

    false
}

/// Request body for the authorization-code exchange.
#[derive(serde::Serialize)]
struct CodeExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

/// Validates an OAuth callback and exchanges the code for an access token.
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `config` - App configuration
/// * `query` - The callback's query parameters
/// * `expected_state` - The state issued when the flow began
///
/// # Errors
///
/// - [`OAuthError::InvalidHmac`]: signature validation failed
/// - [`OAuthError::StateMismatch`]: state does not match the issued value
/// - [`OAuthError::InvalidCallback`]: the shop domain is invalid
/// - [`OAuthError::TokenExchangeFailed`]: the code exchange failed
pub async fn validate_callback(
    client: &reqwest::Client,
    config: &AppConfig,
    query: &CallbackQuery,
    expected_state: &str,
) -> Result<Session, OAuthError> {
    if !validate_hmac(query, config) {
        tracing::warn!(shop = query.shop(), "rejected OAuth callback: bad hmac");
        return Err(OAuthError::InvalidHmac);
    }

    if !constant_time_compare(query.state(), expected_state) {
        tracing::warn!(shop = query.shop(), "rejected OAuth callback: state mismatch");
        return Err(OAuthError::StateMismatch);
    }

    let shop = ShopDomain::new(query.shop()).map_err(|_| OAuthError::InvalidCallback {
        reason: "Invalid shop domain".to_string(),
    })?;

    let token_url = format!("{}/admin/oauth/access_token", config.shopify_origin(&shop));

    let request_body = CodeExchangeRequest {
        client_id: config.api_key().as_ref(),
        client_secret: config.api_secret_key().as_ref(),
        code: query.code(),
    };

    let response = client
        .post(&token_url)
        .json(&request_body)
        .send()
        .await
        .map_err(|e| OAuthError::TokenExchangeFailed {
            status: 0,
            message: format!("Network error: {e}"),
        })?;

    let status = response.status().as_u16();

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(OAuthError::TokenExchangeFailed {
            status,
            message: error_body,
        });
    }

    let token_response: AccessTokenResponse =
        response
            .json()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed {
                status,
                message: format!("Failed to parse token response: {e}"),
            })?;

    Ok(Session::from_access_token_response(shop, &token_response))
}
