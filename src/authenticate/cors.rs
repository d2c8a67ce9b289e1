//! CORS handling for embedded fetch callers.
//!
//! Embedded apps call their backend from the admin iframe's origin, so
//! responses need CORS headers and `OPTIONS` preflights must be answered
//! before any authentication logic runs.

use crate::http::{Request, Response};

/// Header signaling a non-redirectable client where to re-authenticate.
///
/// Fetch-style callers cannot follow redirects across the OAuth dance, so
/// instead of a 302 they receive this header with the absolute URL that
/// begins auth.
pub const REAUTH_URL_HEADER: &str = "X-Shopify-API-Request-Failure-Reauthorize-Url";

/// Header flagging that re-authentication is required.
pub const REAUTH_REQUIRED_HEADER: &str = "X-Shopify-API-Request-Failure-Reauthorize";

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type";

fn origin_of(request: &Request) -> String {
    request.header("origin").map_or_else(|| "*".to_string(), str::to_string)
}

/// Answers a CORS preflight request.
#[must_use]
pub fn preflight_response(request: &Request) -> Response {
    Response::empty(204)
        .with_header("Access-Control-Allow-Origin", origin_of(request))
        .with_header("Access-Control-Allow-Methods", ALLOWED_METHODS)
        .with_header("Access-Control-Allow-Headers", ALLOWED_HEADERS)
        .with_header("Access-Control-Max-Age", "7200")
        .with_header("Vary", "Origin")
}

/// Adds CORS headers to a response, exposing the re-auth header so the
/// embedded client's fetch wrapper can read it.
#[must_use]
pub fn add_cors_headers(response: Response, request: &Request) -> Response {
    response
        .with_header("Access-Control-Allow-Origin", origin_of(request))
        .with_header("Access-Control-Expose-Headers", REAUTH_URL_HEADER)
        .with_header("Vary", "Origin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[test]
    fn test_preflight_echoes_origin() {
        let request = Request::builder(Method::Options, "/api/data")
            .header("Origin", "https://admin.shopify.com")
            .build();

        let response = preflight_response(&request);
        assert_eq!(response.status, 204);
        assert_eq!(
            response.header("access-control-allow-origin"),
            Some("https://admin.shopify.com")
        );
        assert!(response
            .header("access-control-allow-headers")
            .unwrap()
            .contains("Authorization"));
    }

    #[test]
    fn test_preflight_wildcard_without_origin() {
        let request = Request::builder(Method::Options, "/api/data").build();
        let response = preflight_response(&request);
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    }

    #[test]
    fn test_cors_headers_expose_reauth_header() {
        let request = Request::builder(Method::Get, "/api/data")
            .header("Origin", "https://admin.shopify.com")
            .build();

        let response = add_cors_headers(Response::empty(200), &request);
        assert_eq!(
            response.header("access-control-expose-headers"),
            Some(REAUTH_URL_HEADER)
        );
    }
}
