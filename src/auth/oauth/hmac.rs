//! HMAC and hashing primitives for request authentication.
//!
//! This module provides the functions used to compute and validate
//! HMAC-SHA256 signatures for OAuth callbacks, app proxy requests, webhook
//! payloads, and signed cookies, plus the random-nonce and SHA-256 helpers
//! the rest of the authentication core builds on.
//!
//! # Security
//!
//! All signature comparisons use constant-time comparison to prevent timing
//! attacks. Higher-level validators support key rotation by falling back to
//! an old secret key when the primary key fails.
//!
//! # Example
//!
//! ```rust
//! use shopify_app_auth::auth::oauth::hmac::{compute_signature, compute_signature_base64};
//!
//! // Hex-encoded signature for OAuth callbacks and app proxy requests
//! let message = "code=abc123&shop=example.myshopify.com&state=xyz";
//! let signature = compute_signature(message, "my-api-secret");
//! assert_eq!(signature.len(), 64);
//!
//! // Base64-encoded signature for webhooks
//! let webhook_sig = compute_signature_base64(b"webhook payload", "my-api-secret");
//! assert_eq!(webhook_sig.len(), 44);
//! ```

use base64::prelude::*;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn hmac_bytes(message: &[u8], secret: &str) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Computes an HMAC-SHA256 signature for the given message.
///
/// The signature is returned as a lowercase hexadecimal string, the format
/// Shopify uses for OAuth callback and app proxy signatures.
///
/// # Note
///
/// This function uses `expect()` internally but this will never panic
/// because HMAC-SHA256 accepts keys of any length.
#[must_use]
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
pub fn compute_signature(message: &str, secret: &str) -> String {
    hex::encode(hmac_bytes(message.as_bytes(), secret))
}

/// Computes an HMAC-SHA256 signature for raw bytes, returning base64 output.
///
/// This is the format Shopify sends in the `X-Shopify-Hmac-SHA256` webhook
/// header. The message is raw bytes to preserve the exact payload without
/// UTF-8 interpretation.
#[must_use]
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
pub fn compute_signature_base64(message: &[u8], secret: &str) -> String {
    BASE64_STANDARD.encode(hmac_bytes(message, secret))
}

/// Computes an HMAC-SHA256 signature as URL-safe, unpadded base64.
///
/// Used for signed cookie values, where the signature travels inside a
/// cookie and must not contain `+`, `/`, or padding.
#[must_use]
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
pub fn compute_signature_urlsafe(message: &[u8], secret: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(hmac_bytes(message, secret))
}

/// Computes the SHA-256 digest of `data` as a lowercase hex string.
///
/// Used to derive stable identifiers (e.g., the token-exchange dedup key)
/// without retaining the raw material.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Performs constant-time comparison of two strings.
///
/// Used for security-sensitive comparisons like HMAC verification and state
/// parameter validation.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    // ConstantTimeEq handles different lengths securely
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Generates `length` random bytes encoded as URL-safe, unpadded base64.
///
/// Used for PKCE code verifiers and OAuth state values.
#[must_use]
pub fn random_bytes_urlsafe(length: usize) -> String {
    let bytes: Vec<u8> = (0..length).map(|_| rand::thread_rng().gen()).collect();
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

// Internal hex encoding to avoid another dependency
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut result = String::with_capacity(bytes.len() * 2);
        for &byte in bytes {
            result.push(HEX_CHARS[(byte >> 4) as usize] as char);
            result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        result
    }
}
