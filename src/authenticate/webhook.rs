//! Webhook request authentication.
//!
//! Shopify signs webhook deliveries with HMAC-SHA256 over the raw request
//! body, base64-encoded in the `X-Shopify-Hmac-SHA256` header. This module
//! verifies that signature (constant-time, with old-key fallback for
//! rotation) and surfaces the delivery headers as a typed context.
//!
//! Only request authentication lives here; registration and delivery
//! retries belong to the webhook infrastructure around the app.

use thiserror::Error;

use crate::auth::oauth::hmac::{compute_signature_base64, constant_time_compare};
use crate::authenticate::AuthEngine;
use crate::config::ShopDomain;
use crate::http::{Request, Response};
use crate::session_store::SessionStore;

/// Header carrying the base64 HMAC-SHA256 signature.
pub const HEADER_HMAC: &str = "X-Shopify-Hmac-SHA256";

/// Header carrying the webhook topic (e.g., `orders/create`).
pub const HEADER_TOPIC: &str = "X-Shopify-Topic";

/// Header carrying the shop's myshopify.com domain.
pub const HEADER_SHOP_DOMAIN: &str = "X-Shopify-Shop-Domain";

/// Header carrying the API version of the payload.
pub const HEADER_API_VERSION: &str = "X-Shopify-API-Version";

/// Header carrying the unique delivery id.
pub const HEADER_WEBHOOK_ID: &str = "X-Shopify-Webhook-Id";

/// Errors from webhook authentication.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// A required header is absent.
    #[error("Missing required webhook header: {name}")]
    MissingHeader {
        /// The absent header's name.
        name: &'static str,
    },

    /// The body signature did not verify.
    #[error("Webhook HMAC signature validation failed")]
    InvalidSignature,

    /// The shop domain header is malformed.
    #[error("Webhook shop domain is invalid")]
    InvalidShopDomain,
}

impl WebhookError {
    /// Converts the error into the 401 response to send.
    #[must_use]
    pub fn response(&self) -> Response {
        Response::text(401, "Webhook verification failed")
    }
}

/// Verified context of a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookContext {
    /// The shop the delivery is for.
    pub shop: ShopDomain,

    /// The topic (e.g., `app/uninstalled`).
    pub topic: String,

    /// API version of the payload format, when present.
    pub api_version: Option<String>,

    /// Unique delivery id, useful for idempotent handling.
    pub webhook_id: Option<String>,
}

impl<S: SessionStore> AuthEngine<S> {
    /// Authenticates a webhook delivery.
    ///
    /// The signature is computed over the exact raw body bytes; any body
    /// transformation before this call breaks verification.
    ///
    /// # Errors
    ///
    /// - [`WebhookError::MissingHeader`] when the signature, topic, or shop
    ///   header is absent
    /// - [`WebhookError::InvalidSignature`] when the HMAC does not verify
    ///   under the current or old secret key
    /// - [`WebhookError::InvalidShopDomain`] when the shop header is
    ///   malformed
    pub fn authenticate_webhook(&self, request: &Request) -> Result<WebhookContext, WebhookError> {
        let received_hmac = request
            .header(HEADER_HMAC)
            .ok_or(WebhookError::MissingHeader { name: HEADER_HMAC })?;
        let topic = request
            .header(HEADER_TOPIC)
            .ok_or(WebhookError::MissingHeader { name: HEADER_TOPIC })?;
        let shop_header = request
            .header(HEADER_SHOP_DOMAIN)
            .ok_or(WebhookError::MissingHeader {
                name: HEADER_SHOP_DOMAIN,
            })?;

        let computed =
            compute_signature_base64(request.body(), self.config.api_secret_key().as_ref());
        let mut verified = constant_time_compare(&computed, received_hmac);

        if !verified {
            if let Some(old_secret) = self.config.old_api_secret_key() {
                let computed_old = compute_signature_base64(request.body(), old_secret.as_ref());
                verified = constant_time_compare(&computed_old, received_hmac);
            }
        }

        if !verified {
            tracing::warn!(topic, "rejected webhook: bad signature");
            return Err(WebhookError::InvalidSignature);
        }

        let shop = ShopDomain::new(shop_header).map_err(|_| WebhookError::InvalidShopDomain)?;

        Ok(WebhookContext {
            shop,
            topic: topic.to_string(),
            api_version: request.header(HEADER_API_VERSION).map(str::to_string),
            webhook_id: request.header(HEADER_WEBHOOK_ID).map(str::to_string),
        })
    }
}
