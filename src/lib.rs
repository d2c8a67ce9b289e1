//! # Shopify App Auth
//!
//! Request authentication and durable session management for Shopify apps.
//!
//! ## Overview
//!
//! This crate provides:
//! - The authentication strategy engine ([`authenticate::AuthEngine`]):
//!   classifies each incoming request (bounce page, token exchange,
//!   redirect-based OAuth, public session token, webhook, app proxy) and
//!   drives the correct redirect/response sequence
//! - Session token (JWT) validation for embedded apps
//! - OAuth authorization-code flow with HMAC and state verification
//! - Token exchange with an idempotent guard against duplicate exchanges
//! - A [`session_store::SessionStore`] port with a versioned migration
//!   engine, plus an in-memory reference adapter
//! - The Customer Account PKCE sub-flow ([`customer`])
//!
//! ## Quick Start
//!
//! ```rust
//! use shopify_app_auth::{AppConfig, ApiKey, ApiSecretKey, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("your-api-secret").unwrap())
//!     .host(HostUrl::new("https://your-app.example.com").unwrap())
//!     .scopes("read_products,write_orders".parse().unwrap())
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Authenticating Admin Requests
//!
//! ```rust,ignore
//! use shopify_app_auth::authenticate::{AdminAuth, AuthEngine};
//! use shopify_app_auth::session_store::MemorySessionStore;
//!
//! let engine = AuthEngine::new(config, MemorySessionStore::new());
//!
//! match engine.authenticate_admin(&request).await? {
//!     AdminAuth::Authenticated(ctx) => {
//!         // ctx.session.access_token is ready for API calls
//!     }
//!     AdminAuth::Redirect(response) | AdminAuth::Rejected(response) => {
//!         // send (or throw) the response through your framework adapter
//!     }
//! }
//! ```
//!
//! ## Webhooks and App Proxies
//!
//! ```rust,ignore
//! let context = engine.authenticate_webhook(&request)?;
//! if context.topic == "app/uninstalled" {
//!     engine.store().delete_session(&session_id).await?;
//! }
//!
//! let proxy = engine.authenticate_app_proxy(&request)?;
//! ```
//!
//! ## Customer Account Flow
//!
//! ```rust,ignore
//! use shopify_app_auth::customer::CustomerAccountAuth;
//!
//! let customer_auth = CustomerAccountAuth::new(config);
//! let redirect = customer_auth.begin(&shop, callback_url).await?;
//! // ... later, on the callback route:
//! let result = customer_auth.callback(&shop, callback_url, &request).await?;
//! store.store_session(result.session).await?;
//! ```

pub mod auth;
pub mod authenticate;
pub mod config;
pub mod customer;
pub mod error;
pub mod guard;
pub mod http;
pub mod session_store;

pub use auth::{AccessTokenResponse, AssociatedUser, AuthScopes, OnlineAccessInfo, Session};
pub use config::{ApiKey, ApiSecretKey, AppConfig, AppConfigBuilder, HostUrl, ShopDomain};
pub use error::ConfigError;
