//! Normalized HTTP request and response types.
//!
//! The strategy engine is framework-agnostic: surrounding adapters (axum,
//! actix, lambda runtimes) convert their native request into a [`Request`]
//! and convert the returned [`Response`] back. The engine never touches a
//! framework type directly.

pub mod cookies;

use std::collections::HashMap;

pub use cookies::{SameSite, SetCookie};

/// HTTP method of a normalized request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// PUT request.
    Put,
    /// DELETE request.
    Delete,
    /// OPTIONS request (CORS preflight).
    Options,
    /// HEAD request.
    Head,
}

/// A normalized inbound HTTP request.
///
/// Holds the method, path, decoded query parameters, lower-cased headers,
/// and raw body bytes (raw bytes matter for webhook HMAC verification).
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::http::{Method, Request};
///
/// let request = Request::builder(Method::Get, "/app?shop=test-shop.myshopify.com&embedded=1")
///     .header("User-Agent", "Mozilla/5.0")
///     .build();
///
/// assert_eq!(request.path(), "/app");
/// assert_eq!(request.query_param("shop"), Some("test-shop.myshopify.com"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Request {
    /// Creates a builder for a request.
    ///
    /// `path_and_query` may include a query string (`/app?shop=...`), which
    /// is split off and percent-decoded.
    #[must_use]
    pub fn builder(method: Method, path_and_query: &str) -> RequestBuilder {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, raw_query)) => (path.to_string(), parse_query(raw_query)),
            None => (path_and_query.to_string(), Vec::new()),
        };

        RequestBuilder {
            request: Self {
                method,
                path,
                query,
                headers: HashMap::new(),
                body: Vec::new(),
            },
        }
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Returns the request path, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the decoded query pairs in received order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the raw query string, re-encoded from the decoded pairs.
    #[must_use]
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the bearer token from the `Authorization` header, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Parses the `Cookie` header into name/value pairs.
    #[must_use]
    pub fn cookies(&self) -> HashMap<String, String> {
        self.header("cookie")
            .map(cookies::parse_cookie_header)
            .unwrap_or_default()
    }

    /// Returns the raw request body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Adds a header. Names are stored lower-cased.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request
            .headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Finishes building the request.
    #[must_use]
    pub fn build(self) -> Request {
        self.request
    }
}

/// A normalized outbound HTTP response.
///
/// Framework adapters convert this into their native response type, or
/// throw it where the framework expects short-circuiting via exceptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, in insertion order. Repeated names are allowed
    /// (multiple `Set-Cookie` headers).
    pub headers: Vec<(String, String)>,
    /// Response body, if any.
    pub body: Option<String>,
}

impl Response {
    /// Creates an empty response with the given status.
    #[must_use]
    pub const fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a 302 redirect to `location`.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".to_string(), location.into())],
            body: None,
        }
    }

    /// Creates an HTML response.
    #[must_use]
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/html; charset=utf-8".to_string(),
            )],
            body: Some(body.into()),
        }
    }

    /// Creates a plain-text response.
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: Some(body.into()),
        }
    }

    /// Adds a header and returns the response.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a `Set-Cookie` header for the given cookie.
    #[must_use]
    pub fn with_cookie(mut self, cookie: &SetCookie) -> Self {
        self.headers
            .push(("Set-Cookie".to_string(), cookie.to_header_value()));
        self
    }

    /// Returns the first value of a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Parses a raw query string into decoded pairs.
///
/// `+` is treated as a space, percent-escapes are decoded, and pairs
/// without a value decode to an empty string.
#[must_use]
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(component: &str) -> String {
    let with_spaces = component.replace('+', " ");
    urlencoding::decode(&with_spaces)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(with_spaces)
}

// Verify types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Request>();
    assert_send_sync::<Response>();
};
