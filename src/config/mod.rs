//! Configuration types for the app authentication core.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`AppConfig`]: The main configuration struct holding all settings
//! - [`AppConfigBuilder`]: A builder for constructing [`AppConfig`] instances
//! - [`ApiKey`]: A validated API key newtype (the app's client id)
//! - [`ApiSecretKey`]: A validated API secret key newtype with masked debug output
//! - [`ShopDomain`]: A validated, normalized shop domain
//! - [`HostUrl`]: A validated application host URL
//!
//! # Example
//!
//! ```rust
//! use shopify_app_auth::{AppConfig, ApiKey, ApiSecretKey, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .host(HostUrl::new("https://myapp.example.com").unwrap())
//!     .scopes("read_products".parse().unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert!(config.is_embedded());
//! ```

mod newtypes;

pub use newtypes::{ApiKey, ApiSecretKey, HostUrl, ShopDomain};

use crate::auth::AuthScopes;
use crate::error::ConfigError;

/// Default mount point for the OAuth begin route.
pub const DEFAULT_AUTH_PATH: &str = "/auth";

/// Default mount point for the OAuth callback route.
pub const DEFAULT_CALLBACK_PATH: &str = "/auth/callback";

/// Default mount point for the session-token bounce page.
pub const DEFAULT_BOUNCE_PATH: &str = "/session-token-bounce";

/// Configuration for the app authentication core.
///
/// This struct holds the credentials, scopes, and route layout needed to
/// drive the authentication strategy engine.
///
/// # Thread Safety
///
/// `AppConfig` is `Clone`, `Send`, and `Sync`, making it safe to share
/// across threads and async tasks.
///
/// # Key Rotation
///
/// The `old_api_secret_key` field supports seamless key rotation. When
/// validating HMAC signatures or session tokens, the primary key is tried
/// first, then the old key if configured, so in-flight OAuth flows survive
/// a rotation.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::{AppConfig, ApiKey, ApiSecretKey};
///
/// let config = AppConfig::builder()
///     .api_key(ApiKey::new("your-api-key").unwrap())
///     .api_secret_key(ApiSecretKey::new("your-secret").unwrap())
///     .use_online_tokens(true)
///     .build()
///     .unwrap();
///
/// assert!(config.use_online_tokens());
/// ```
#[derive(Clone, Debug)]
pub struct AppConfig {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: AuthScopes,
    host: Option<HostUrl>,
    api_host: Option<HostUrl>,
    is_embedded: bool,
    use_online_tokens: bool,
    auth_path: String,
    callback_path: String,
    bounce_path: String,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Returns the API key (client id).
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the API secret key.
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the old API secret key, if configured.
    ///
    /// Used during key rotation to validate signatures created with the
    /// previous secret key.
    #[must_use]
    pub const fn old_api_secret_key(&self) -> Option<&ApiSecretKey> {
        self.old_api_secret_key.as_ref()
    }

    /// Returns the OAuth scopes the app requires.
    #[must_use]
    pub const fn scopes(&self) -> &AuthScopes {
        &self.scopes
    }

    /// Returns the app's own host URL, if configured.
    #[must_use]
    pub const fn host(&self) -> Option<&HostUrl> {
        self.host.as_ref()
    }

    /// Returns the override host for Shopify endpoints, if configured.
    ///
    /// When set, OAuth authorize/token URLs are built against this host
    /// instead of `https://<shop>`. Intended for proxy setups and tests.
    #[must_use]
    pub const fn api_host(&self) -> Option<&HostUrl> {
        self.api_host.as_ref()
    }

    /// Returns whether the app is embedded in the Shopify admin.
    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        self.is_embedded
    }

    /// Returns whether token exchange should request online (user-bound) tokens.
    #[must_use]
    pub const fn use_online_tokens(&self) -> bool {
        self.use_online_tokens
    }

    /// Returns the path that begins the OAuth authorization-code flow.
    #[must_use]
    pub fn auth_path(&self) -> &str {
        &self.auth_path
    }

    /// Returns the OAuth callback path.
    #[must_use]
    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    /// Returns the session-token bounce page path.
    #[must_use]
    pub fn bounce_path(&self) -> &str {
        &self.bounce_path
    }

    /// Returns the origin to use for a shop's Shopify endpoints.
    ///
    /// This is `https://<shop>` unless an [`api_host`](Self::api_host)
    /// override is configured.
    #[must_use]
    pub fn shopify_origin(&self, shop: &ShopDomain) -> String {
        self.api_host.as_ref().map_or_else(
            || format!("https://{}", shop.as_ref()),
            |host| host.as_ref().to_string(),
        )
    }
}

// Verify AppConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppConfig>();
};

/// Builder for constructing [`AppConfig`] instances.
///
/// Required fields are `api_key` and `api_secret_key`. All other fields
/// have defaults.
///
/// # Defaults
///
/// - `is_embedded`: `true`
/// - `use_online_tokens`: `false`
/// - `scopes`: empty
/// - `auth_path`: `/auth`, `callback_path`: `/auth/callback`,
///   `bounce_path`: `/session-token-bounce`
/// - `host`, `api_host`, `old_api_secret_key`: `None`
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: Option<AuthScopes>,
    host: Option<HostUrl>,
    api_host: Option<HostUrl>,
    is_embedded: Option<bool>,
    use_online_tokens: Option<bool>,
    auth_path: Option<String>,
    callback_path: Option<String>,
    bounce_path: Option<String>,
}

impl AppConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API secret key (required).
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the old API secret key for key rotation support.
    #[must_use]
    pub fn old_api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(key);
        self
    }

    /// Sets the OAuth scopes.
    #[must_use]
    pub fn scopes(mut self, scopes: AuthScopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Sets the app's own host URL (required for redirect-based OAuth).
    #[must_use]
    pub fn host(mut self, host: HostUrl) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets an override host for Shopify endpoints (proxy/test setups).
    #[must_use]
    pub fn api_host(mut self, host: HostUrl) -> Self {
        self.api_host = Some(host);
        self
    }

    /// Sets whether the app is embedded in the Shopify admin.
    #[must_use]
    pub fn is_embedded(mut self, embedded: bool) -> Self {
        self.is_embedded = Some(embedded);
        self
    }

    /// Sets whether token exchange should request online tokens.
    #[must_use]
    pub fn use_online_tokens(mut self, online: bool) -> Self {
        self.use_online_tokens = Some(online);
        self
    }

    /// Sets the path that begins the OAuth flow.
    #[must_use]
    pub fn auth_path(mut self, path: impl Into<String>) -> Self {
        self.auth_path = Some(path.into());
        self
    }

    /// Sets the OAuth callback path.
    #[must_use]
    pub fn callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = Some(path.into());
        self
    }

    /// Sets the session-token bounce page path.
    #[must_use]
    pub fn bounce_path(mut self, path: impl Into<String>) -> Self {
        self.bounce_path = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `api_key` or
    /// `api_secret_key` is unset, or [`ConfigError::InvalidAuthPath`] if a
    /// route path is malformed.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;
        let api_secret_key = self.api_secret_key.ok_or(ConfigError::MissingRequiredField {
            field: "api_secret_key",
        })?;

        let auth_path = Self::validate_path(self.auth_path, DEFAULT_AUTH_PATH)?;
        let callback_path = Self::validate_path(self.callback_path, DEFAULT_CALLBACK_PATH)?;
        let bounce_path = Self::validate_path(self.bounce_path, DEFAULT_BOUNCE_PATH)?;

        Ok(AppConfig {
            api_key,
            api_secret_key,
            old_api_secret_key: self.old_api_secret_key,
            scopes: self.scopes.unwrap_or_default(),
            host: self.host,
            api_host: self.api_host,
            is_embedded: self.is_embedded.unwrap_or(true),
            use_online_tokens: self.use_online_tokens.unwrap_or(false),
            auth_path,
            callback_path,
            bounce_path,
        })
    }

    fn validate_path(path: Option<String>, default: &str) -> Result<String, ConfigError> {
        let path = path.unwrap_or_else(|| default.to_string());
        if !path.starts_with('/') || path.contains('?') {
            return Err(ConfigError::InvalidAuthPath { path });
        }
        Ok(path)
    }
}
