//! State parameter handling for OAuth CSRF protection.
//!
//! The state parameter ensures an OAuth callback was initiated by a
//! legitimate authorization request from this app: a random value is
//! generated at authorization start, carried to Shopify and back, and
//! compared against the copy stored in a signed cookie.

use crate::auth::oauth::hmac::random_bytes_urlsafe;
use std::fmt;

/// OAuth state parameter for CSRF protection.
///
/// A generated state is 32 random bytes encoded as URL-safe, unpadded
/// base64, making it safe to place in URLs and cookies without further
/// encoding. States are single-use: the stored copy is deleted as soon as
/// a callback consumes it.
///
/// # Thread Safety
///
/// `StateParam` is `Send + Sync`, making it safe to share across threads.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::auth::oauth::StateParam;
///
/// let state = StateParam::new();
/// assert_eq!(state.as_ref().len(), 43);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateParam {
    value: String,
}

// Verify StateParam is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<StateParam>();
};

impl StateParam {
    /// Number of random bytes in a generated state value.
    const STATE_BYTES: usize = 32;

    /// Creates a new state parameter with a cryptographically secure
    /// random value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: random_bytes_urlsafe(Self::STATE_BYTES),
        }
    }

    /// Creates a state parameter from a raw string.
    ///
    /// Used when reconstructing the expected state from a stored cookie.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self { value: raw.into() }
    }
}

impl Default for StateParam {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for StateParam {
    fn as_ref(&self) -> &str {
        &self.value
    }
}
