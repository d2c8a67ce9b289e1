//! PKCE (Proof Key for Code Exchange) support.
//!
//! The customer-account OAuth flow is a public client, so the authorization
//! code is bound to a one-time verifier: the authorize request carries the
//! SHA-256 challenge of the verifier, and the token request must present the
//! verifier itself.

use base64::prelude::*;
use sha2::{Digest, Sha256};

use crate::auth::oauth::hmac::random_bytes_urlsafe;

/// A PKCE verifier/challenge pair.
///
/// The verifier is 32 random bytes encoded as URL-safe, unpadded base64.
/// The challenge is `base64url(SHA-256(verifier))`, also unpadded, matching
/// the `S256` code challenge method.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::auth::pkce::PkcePair;
///
/// let pair = PkcePair::generate();
/// assert_eq!(pair.challenge(), PkcePair::challenge_for(pair.verifier()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Number of random bytes in a generated verifier.
    const VERIFIER_BYTES: usize = 32;

    /// Generates a fresh verifier and its S256 challenge.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = random_bytes_urlsafe(Self::VERIFIER_BYTES);
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Computes the S256 challenge for an existing verifier.
    ///
    /// Used on the callback side to confirm a returned verifier cookie
    /// still matches the challenge that began the flow.
    #[must_use]
    pub fn challenge_for(verifier: &str) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Returns the code verifier.
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Returns the code challenge.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

// Verify PkcePair is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PkcePair>();
};
