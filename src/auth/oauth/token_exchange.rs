//! OAuth 2.0 Token Exchange for embedded apps.
//!
//! Embedded apps trade a validated session token for an access token via a
//! server-to-server call (RFC 8693), replacing the redirect-based OAuth
//! dance. The strategy engine wraps these functions in its idempotent guard
//! so concurrent requests carrying the same session token perform exactly
//! one outbound exchange.
//!
//! # Token Types
//!
//! - Grant type: `urn:ietf:params:oauth:grant-type:token-exchange`
//! - Subject token type: `urn:ietf:params:oauth:token-type:id_token`
//! - Requested token types:
//!   - Online: `urn:shopify:params:oauth:token-type:online-access-token`
//!   - Offline: `urn:shopify:params:oauth:token-type:offline-access-token`

use crate::auth::oauth::session_token::SessionToken;
use crate::auth::oauth::OAuthError;
use crate::auth::session::AccessTokenResponse;
use crate::auth::Session;
use crate::config::{AppConfig, ShopDomain};
use serde::{Deserialize, Serialize};

/// Grant type for token exchange (RFC 8693).
const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Subject token type for ID tokens.
const ID_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:id_token";

/// Requested token type for token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedTokenType {
    /// Online access token - user-bound, expires.
    Online,
    /// Offline access token - app-level, typically long-lived.
    Offline,
}

impl RequestedTokenType {
    /// Returns the URN string representation for the token endpoint.
    const fn as_urn(self) -> &'static str {
        match self {
            Self::Online => "urn:shopify:params:oauth:token-type:online-access-token",
            Self::Offline => "urn:shopify:params:oauth:token-type:offline-access-token",
        }
    }
}

/// Request body for token exchange.
#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    subject_token: &'a str,
    subject_token_type: &'a str,
    requested_token_type: &'a str,
}

/// Error response from token exchange.
#[derive(Debug, Deserialize)]
struct TokenExchangeErrorResponse {
    error: Option<String>,
}

/// Exchanges a session token for an access token.
///
/// The session token is re-validated before the request is sent; an
/// unverifiable token never reaches the network.
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `config` - App configuration (must have `is_embedded() == true`)
/// * `shop` - The shop domain
/// * `session_token` - The raw session token (JWT)
/// * `requested` - Whether to request an online or offline token
///
/// # Errors
///
/// - [`OAuthError::NotEmbeddedApp`] if the config is not for an embedded app
/// - [`OAuthError::InvalidJwt`] if the session token fails validation, or
///   if the token endpoint rejects it as an invalid subject token
/// - [`OAuthError::TokenExchangeFailed`] for any other exchange failure
///
/// # Example
///
/// ```rust,ignore
/// use shopify_app_auth::auth::oauth::{exchange_token, RequestedTokenType};
///
/// let session =
///     exchange_token(&client, &config, &shop, token, RequestedTokenType::Offline).await?;
/// assert!(!session.is_online);
/// ```
pub async fn exchange_token(
    client: &reqwest::Client,
    config: &AppConfig,
    shop: &ShopDomain,
    session_token: &str,
    requested: RequestedTokenType,
) -> Result<Session, OAuthError> {
    if !config.is_embedded() {
        return Err(OAuthError::NotEmbeddedApp);
    }

    // Re-validate before spending a network call on it
    let _payload = SessionToken::decode(session_token, config)?;

    let token_url = format!("{}/admin/oauth/access_token", config.shopify_origin(shop));

    let request_body = TokenExchangeRequest {
        client_id: config.api_key().as_ref(),
        client_secret: config.api_secret_key().as_ref(),
        grant_type: TOKEN_EXCHANGE_GRANT_TYPE,
        subject_token: session_token,
        subject_token_type: ID_TOKEN_TYPE,
        requested_token_type: requested.as_urn(),
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

        // invalid_subject_token means the session token itself was rejected
        if status == 400 {
            if let Ok(error_response) =
                serde_json::from_str::<TokenExchangeErrorResponse>(&error_body)
            {
                if error_response.error.as_deref() == Some("invalid_subject_token") {
                    return Err(OAuthError::InvalidJwt {
                        reason: "Session token was rejected by token exchange".to_string(),
                    });
                }
            }
        }

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

    Ok(Session::from_access_token_response(
        shop.clone(),
        &token_response,
    ))
}

// Verify types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RequestedTokenType>();
};
