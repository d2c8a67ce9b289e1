//! Authentication types: sessions, scopes, and OAuth flows.
//!
//! # Overview
//!
//! - [`AuthScopes`]: a set of OAuth scopes with implied scope handling
//! - [`Session`]: one authenticated relationship between the app and a shop
//! - [`AssociatedUser`]: staff user information for online sessions
//! - [`oauth`]: authorization-code flow, token exchange, session tokens,
//!   and HMAC primitives
//! - [`pkce`]: verifier/challenge support for the customer-account flow
//!
//! # Session Types
//!
//! - **Offline sessions**: app-level tokens, long-lived, keyed
//!   `offline_<shop>`. Used for background work and webhooks.
//! - **Online sessions**: user-bound tokens that expire, keyed
//!   `<shop>_<user id>`, carrying [`AssociatedUser`] details.
//!
//! Sessions are created only by a successful OAuth callback or token
//! exchange, mutated only by re-storing a refreshed token under the same
//! id, and deleted on uninstall or explicit revocation.

mod associated_user;
pub mod oauth;
pub mod pkce;
mod scopes;
pub mod session;

pub use associated_user::AssociatedUser;
pub use scopes::AuthScopes;
pub use session::{AccessTokenResponse, OnlineAccessInfo, Session};
