//! Associated user types for online sessions.
//!
//! When an app uses online access tokens, the token response includes
//! information about the staff user who authorized the app. That user
//! information is stored alongside the session.

use serde::{Deserialize, Serialize};

/// The Shopify staff user associated with an online session.
///
/// # Thread Safety
///
/// `AssociatedUser` is `Send + Sync`, making it safe to share across threads.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::AssociatedUser;
///
/// let user = AssociatedUser::new(12345, "jane@example.com".to_string());
/// assert_eq!(user.id, 12345);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedUser {
    /// The Shopify user ID (numeric).
    pub id: u64,

    /// The user's first name.
    #[serde(default)]
    pub first_name: String,

    /// The user's last name.
    #[serde(default)]
    pub last_name: String,

    /// The user's email address.
    #[serde(default)]
    pub email: String,

    /// Whether the user's email has been verified.
    #[serde(default)]
    pub email_verified: bool,

    /// Whether the user is the account owner.
    #[serde(default)]
    pub account_owner: bool,

    /// The user's locale preference (e.g., "en", "fr").
    #[serde(default)]
    pub locale: String,

    /// Whether the user is a collaborator.
    #[serde(default)]
    pub collaborator: bool,
}

impl AssociatedUser {
    /// Creates a new `AssociatedUser` with the required identity fields.
    ///
    /// Profile fields default to empty/false and can be set directly since
    /// all fields are public.
    #[must_use]
    pub fn new(id: u64, email: String) -> Self {
        Self {
            id,
            first_name: String::new(),
            last_name: String::new(),
            email,
            email_verified: false,
            account_owner: false,
            locale: String::new(),
            collaborator: false,
        }
    }
}

// Verify AssociatedUser is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AssociatedUser>();
};
