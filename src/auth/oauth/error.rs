//! OAuth-specific error types.
//!
//! This module contains error types for OAuth operations including HMAC
//! validation, state verification, session-token validation, and token
//! exchange failures.

use thiserror::Error;

/// Errors that can occur during OAuth operations.
///
/// This enum covers all failure modes in the authorization-code flow and
/// the session-token exchange flow.
///
/// Security-sensitive variants (`InvalidHmac`, `StateMismatch`) deliberately
/// carry no request-supplied values, so attacker-controlled data is never
/// echoed through error messages.
///
/// # Thread Safety
///
/// `OAuthError` is `Send + Sync`, making it safe to use across async
/// boundaries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// HMAC signature validation failed.
    ///
    /// The callback request's signature does not match the value computed
    /// with the API secret key (or the old key, when rotation is active).
    #[error("HMAC signature validation failed")]
    InvalidHmac,

    /// OAuth state parameter mismatch.
    ///
    /// The state parameter in the callback does not match the value issued
    /// when the flow began. This is the CSRF protection tripping.
    #[error("State parameter did not match the value issued at authorization start")]
    StateMismatch,

    /// A session token (JWT) failed validation.
    #[error("Invalid session token: {reason}")]
    InvalidJwt {
        /// Why validation failed.
        reason: String,
    },

    /// Token exchange or code exchange request failed.
    #[error("Token exchange failed with status {status}: {message}")]
    TokenExchangeFailed {
        /// The HTTP status code returned (0 for transport errors).
        status: u16,
        /// The error message from the response.
        message: String,
    },

    /// Callback parameters are invalid or malformed.
    #[error("Invalid callback: {reason}")]
    InvalidCallback {
        /// Description of what's invalid about the callback.
        reason: String,
    },

    /// Host URL is not configured.
    ///
    /// Beginning the redirect-based OAuth flow requires the app's own host
    /// URL to construct the redirect URI.
    #[error("Host URL must be configured to begin redirect-based OAuth")]
    MissingHostConfig,

    /// Token exchange requires an embedded app configuration.
    #[error("Token exchange is only available to embedded apps")]
    NotEmbeddedApp,
}

// Verify OAuthError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<OAuthError>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_hmac_formats_without_request_data() {
        let error = OAuthError::InvalidHmac;
        assert_eq!(error.to_string(), "HMAC signature validation failed");
    }

    #[test]
    fn test_state_mismatch_carries_no_values() {
        let error = OAuthError::StateMismatch;
        assert!(!error.to_string().contains('\''));
    }

    #[test]
    fn test_token_exchange_failed_includes_status_and_message() {
        let error = OAuthError::TokenExchangeFailed {
            status: 401,
            message: "Invalid client credentials".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("Invalid client credentials"));
    }

    #[test]
    fn test_invalid_jwt_includes_reason() {
        let error = OAuthError::InvalidJwt {
            reason: "expired".to_string(),
        };
        assert!(error.to_string().contains("expired"));
    }

    #[test]
    fn test_oauth_error_implements_std_error() {
        let error: &dyn std::error::Error = &OAuthError::InvalidHmac;
        let _ = error;
    }
}
