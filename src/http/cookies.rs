//! Signed cookie support.
//!
//! OAuth state and PKCE material travel between the begin and callback
//! steps in cookies. Cookies are signed with the app secret so a tampered
//! value is rejected, and are `HttpOnly`, `Secure`, `SameSite=Lax` by
//! default.
//!
//! The signed format is `<value>.<signature>` where the signature is the
//! URL-safe base64 HMAC-SHA256 of the value. Verification is constant-time
//! and falls back to the old API secret key when one is configured.

use std::collections::HashMap;

use crate::auth::oauth::hmac::{compute_signature_urlsafe, constant_time_compare};
use crate::config::AppConfig;

/// `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Sent on same-site requests and top-level navigations.
    Lax,
    /// Sent on same-site requests only.
    Strict,
    /// Sent on all requests (requires `Secure`).
    None,
}

impl SameSite {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

/// A cookie to set on a response.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::http::SetCookie;
///
/// let cookie = SetCookie::new("state", "abc").max_age(600);
/// let header = cookie.to_header_value();
/// assert!(header.starts_with("state=abc"));
/// assert!(header.contains("HttpOnly"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    path: String,
    max_age: Option<i64>,
    http_only: bool,
    secure: bool,
    same_site: SameSite,
}

impl SetCookie {
    /// Creates a cookie with the hardened defaults: `Path=/`, `HttpOnly`,
    /// `Secure`, `SameSite=Lax`, session-scoped lifetime.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age: None,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }

    /// Creates a cookie whose value is signed with the app secret.
    #[must_use]
    pub fn signed(name: impl Into<String>, value: &str, config: &AppConfig) -> Self {
        let signature = compute_signature_urlsafe(value.as_bytes(), config.api_secret_key().as_ref());
        Self::new(name, format!("{value}.{signature}"))
    }

    /// Creates an expired cookie that deletes `name` on the client.
    #[must_use]
    pub fn expired(name: impl Into<String>) -> Self {
        let mut cookie = Self::new(name, "");
        cookie.max_age = Some(0);
        cookie
    }

    /// Sets `Max-Age` in seconds.
    #[must_use]
    pub const fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets the cookie path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the `SameSite` attribute.
    #[must_use]
    pub const fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renders the `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(max_age) = self.max_age {
            header.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if self.secure {
            header.push_str("; Secure");
        }
        header.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        header
    }
}

/// Verifies a signed cookie value and returns the embedded value.
///
/// Returns `None` when the value is unsigned, the signature does not verify
/// under the current or old secret key, or the value was tampered with.
#[must_use]
pub fn verify_signed_value(raw: &str, config: &AppConfig) -> Option<String> {
    let (value, signature) = raw.rsplit_once('.')?;

    let expected = compute_signature_urlsafe(value.as_bytes(), config.api_secret_key().as_ref());
    if constant_time_compare(&expected, signature) {
        return Some(value.to_string());
    }

    if let Some(old_secret) = config.old_api_secret_key() {
        let expected_old = compute_signature_urlsafe(value.as_bytes(), old_secret.as_ref());
        if constant_time_compare(&expected_old, signature) {
            return Some(value.to_string());
        }
    }

    None
}

/// Parses a request `Cookie` header into name/value pairs.
#[must_use]
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (name, value) = part.split_once('=')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
