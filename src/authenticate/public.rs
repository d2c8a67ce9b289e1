//! Public request authentication.
//!
//! Public routes (checkout/customer-account extensions and other
//! storefront-side callers) prove identity with a bearer session token
//! alone; no stored session is consulted and no exchange is performed.

use crate::auth::oauth::SessionToken;
use crate::authenticate::{cors, AuthEngine, AuthError};
use crate::config::ShopDomain;
use crate::http::{Method, Request, Response};
use crate::session_store::SessionStore;

/// Context returned for an authenticated public request.
#[derive(Debug, Clone)]
pub struct PublicContext {
    /// The shop the token was minted for.
    pub shop: ShopDomain,

    /// The validated session token.
    pub token: SessionToken,
}

/// Outcome of public authentication.
#[derive(Debug, Clone)]
pub enum PublicAuth {
    /// The request carried a valid session token.
    Authenticated(PublicContext),

    /// Terminal response (preflight answer or 401).
    Rejected(Response),
}

impl<S: SessionStore> AuthEngine<S> {
    /// Authenticates a public request by its bearer session token.
    ///
    /// `OPTIONS` preflights are answered before any validation. Requests
    /// without a bearer token, or with one that fails validation, are
    /// rejected with a CORS-decorated 401.
    ///
    /// # Errors
    ///
    /// This strategy performs no storage or network access, so the only
    /// errors are those of the [`AuthError`] conversions at the framework
    /// boundary; validation failures are expressed as
    /// [`PublicAuth::Rejected`].
    pub fn authenticate_public(&self, request: &Request) -> Result<PublicAuth, AuthError> {
        if request.method() == Method::Options {
            return Ok(PublicAuth::Rejected(cors::preflight_response(request)));
        }

        let Some(raw_token) = request.bearer_token() else {
            return Ok(PublicAuth::Rejected(self.public_unauthorized(request)));
        };

        match SessionToken::decode(raw_token, &self.config) {
            Ok(token) => {
                let shop = token.shop()?;
                Ok(PublicAuth::Authenticated(PublicContext { shop, token }))
            }
            Err(error) => {
                tracing::warn!(%error, "rejected public session token");
                Ok(PublicAuth::Rejected(self.public_unauthorized(request)))
            }
        }
    }

    fn public_unauthorized(&self, request: &Request) -> Response {
        cors::add_cors_headers(Response::text(401, "Unauthorized"), request)
    }
}
