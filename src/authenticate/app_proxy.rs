//! App proxy request authentication.
//!
//! Requests forwarded through a Shopify app proxy carry a `signature`
//! query parameter: the hex HMAC-SHA256 of the remaining parameters,
//! sorted by key and concatenated *without* separators (multi-valued
//! parameters join their values with commas). This differs from the OAuth
//! callback signature, which joins sorted pairs with `&`.

use std::collections::BTreeMap;

use crate::auth::oauth::hmac::{compute_signature, constant_time_compare};
use crate::authenticate::{AuthEngine, AuthError};
use crate::config::ShopDomain;
use crate::http::Request;
use crate::session_store::SessionStore;

/// Verified context of an app proxy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppProxyContext {
    /// The shop the storefront request originated from.
    pub shop: ShopDomain,

    /// The logged-in customer's id, when the storefront session has one.
    /// An empty parameter (logged-out visitor) surfaces as `None`.
    pub logged_in_customer_id: Option<String>,
}

/// Builds the signable string for an app proxy query.
fn signable_string(pairs: &[(String, String)]) -> String {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, value) in pairs {
        if key != "signature" {
            grouped.entry(key.as_str()).or_default().push(value.as_str());
        }
    }

    grouped
        .into_iter()
        .map(|(key, values)| format!("{key}={}", values.join(",")))
        .collect::<String>()
}

impl<S: SessionStore> AuthEngine<S> {
    /// Authenticates an app proxy request by its query signature.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRequest`] when the `signature` or `shop`
    ///   parameter is missing or malformed
    /// - [`AuthError::Oauth`] ([`InvalidHmac`]) when the signature does not
    ///   verify under the current or old secret key
    ///
    /// [`InvalidHmac`]: crate::auth::oauth::OAuthError::InvalidHmac
    pub fn authenticate_app_proxy(
        &self,
        request: &Request,
    ) -> Result<AppProxyContext, AuthError> {
        let signature =
            request
                .query_param("signature")
                .ok_or_else(|| AuthError::InvalidRequest {
                    reason: "Missing signature parameter".to_string(),
                })?;

        let signable = signable_string(request.query_pairs());

        let computed = compute_signature(&signable, self.config.api_secret_key().as_ref());
        let mut verified = constant_time_compare(&computed, signature);

        if !verified {
            if let Some(old_secret) = self.config.old_api_secret_key() {
                let computed_old = compute_signature(&signable, old_secret.as_ref());
                verified = constant_time_compare(&computed_old, signature);
            }
        }

        if !verified {
            tracing::warn!("rejected app proxy request: bad signature");
            return Err(crate::auth::oauth::OAuthError::InvalidHmac.into());
        }

        let shop_param = request
            .query_param("shop")
            .ok_or_else(|| AuthError::InvalidRequest {
                reason: "Missing shop parameter".to_string(),
            })?;
        let shop = ShopDomain::new(shop_param).map_err(|_| AuthError::InvalidRequest {
            reason: "Invalid shop parameter".to_string(),
        })?;

        let logged_in_customer_id = request
            .query_param("logged_in_customer_id")
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        Ok(AppProxyContext {
            shop,
            logged_in_customer_id,
        })
    }
}
