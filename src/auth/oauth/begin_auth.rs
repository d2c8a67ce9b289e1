//! OAuth authorization URL generation.
//!
//! This module provides [`begin_auth`], the first step of the
//! authorization-code flow: generate a CSRF state parameter and the
//! authorization URL the merchant's browser should be redirected to.

use crate::auth::oauth::error::OAuthError;
use crate::auth::oauth::state::StateParam;
use crate::auth::AuthScopes;
use crate::config::{AppConfig, ShopDomain};

/// Result of initiating OAuth authorization.
///
/// The `state` value must be persisted (the strategy engine stores it in a
/// signed cookie) and compared against the `state` parameter of the
/// callback. Without that comparison the callback is forgeable.
#[derive(Clone, Debug)]
pub struct BeginAuthResult {
    /// The full authorization URL to redirect the user to.
    pub auth_url: String,

    /// The state parameter generated for this authorization request.
    pub state: StateParam,
}

/// Initiates the OAuth authorization-code flow.
///
/// # Arguments
///
/// * `config` - App configuration (must have `host` configured)
/// * `shop` - The shop domain to authorize against
/// * `is_online` - `true` for online (user-bound) tokens, `false` for
///   offline (app-level) tokens
/// * `scope_override` - Optional scope override (uses `config.scopes()`
///   when `None`)
///
/// # Errors
///
/// Returns [`OAuthError::MissingHostConfig`] if `config.host()` is `None`.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::{AppConfig, ApiKey, ApiSecretKey, HostUrl, ShopDomain};
/// use shopify_app_auth::auth::oauth::begin_auth;
///
/// let config = AppConfig::builder()
///     .api_key(ApiKey::new("api-key").unwrap())
///     .api_secret_key(ApiSecretKey::new("secret").unwrap())
///     .host(HostUrl::new("https://myapp.example.com").unwrap())
///     .scopes("read_products".parse().unwrap())
///     .build()
///     .unwrap();
///
/// let shop = ShopDomain::new("test-shop").unwrap();
/// let result = begin_auth(&config, &shop, false, None).unwrap();
/// assert!(result.auth_url.contains("oauth/authorize"));
/// ```
pub fn begin_auth(
    config: &AppConfig,
    shop: &ShopDomain,
    is_online: bool,
    scope_override: Option<&AuthScopes>,
) -> Result<BeginAuthResult, OAuthError> {
    let host = config.host().ok_or(OAuthError::MissingHostConfig)?;

    let state = StateParam::new();
    let scopes = scope_override.unwrap_or_else(|| config.scopes());
    let redirect_uri = format!("{}{}", host.as_ref(), config.callback_path());

    let mut params = vec![
        ("client_id", config.api_key().as_ref().to_string()),
        ("scope", scopes.to_string()),
        ("redirect_uri", redirect_uri),
        ("state", state.to_string()),
    ];

    // grant_options[] requests a user-bound token
    if is_online {
        params.push(("grant_options[]", "per-user".to_string()));
    }

    let query_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let auth_url = format!(
        "{}/admin/oauth/authorize?{query_string}",
        config.shopify_origin(shop)
    );

    Ok(BeginAuthResult { auth_url, state })
}

// Verify BeginAuthResult is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<BeginAuthResult>();
};
