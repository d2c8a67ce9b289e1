//! OAuth flows and primitives for app authentication.
//!
//! This module provides the building blocks the strategy engine drives:
//!
//! - **Authorization Code Grant** ([`begin_auth`] / [`validate_callback`]):
//!   the redirect-based flow used for installation and for apps where token
//!   exchange is unavailable or disabled.
//! - **Token Exchange** ([`exchange_token`]): trades a validated session
//!   token for an access token without redirects (embedded apps).
//! - **Session Token Validation** ([`SessionToken`]): the JWT contract for
//!   tokens minted by the embedded admin client.
//! - **HMAC primitives** ([`hmac`]): signature computation and constant-time
//!   comparison shared by callbacks, webhooks, app proxy requests, and
//!   signed cookies.
//!
//! # Security Features
//!
//! - Callback HMACs and session-token signatures are verified with
//!   constant-time comparisons
//! - The `state` parameter is random, single-use, and cookie-bound
//! - An old API secret key can be configured so in-flight flows survive key
//!   rotation
//!
//! # Example: Authorization Code Flow
//!
//! ```rust,ignore
//! use shopify_app_auth::auth::oauth::{begin_auth, validate_callback, CallbackQuery};
//!
//! // Begin: generate the redirect and persist result.state in a signed cookie
//! let result = begin_auth(&config, &shop, false, None)?;
//!
//! // Callback: recover the expected state from the cookie and validate
//! let session = validate_callback(&client, &config, &query, &stored_state).await?;
//! ```
//!
//! # Example: Token Exchange
//!
//! ```rust,ignore
//! use shopify_app_auth::auth::oauth::{exchange_token, RequestedTokenType};
//!
//! let session =
//!     exchange_token(&client, &config, &shop, session_token, RequestedTokenType::Offline)
//!         .await?;
//! ```

mod begin_auth;
mod callback;
mod error;
pub mod hmac;
mod session_token;
mod state;
mod token_exchange;

pub use begin_auth::{begin_auth, BeginAuthResult};
pub use callback::{validate_callback, validate_hmac, CallbackQuery};
pub use error::OAuthError;
pub use session_token::SessionToken;
pub use state::StateParam;
pub use token_exchange::{exchange_token, RequestedTokenType};
