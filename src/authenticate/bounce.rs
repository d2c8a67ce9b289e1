//! Bounce and exit-iframe pages.
//!
//! Two small HTML interstitials drive the embedded client:
//!
//! - The **bounce page** loads the App Bridge script so the browser can
//!   mint a fresh session token, then retries the original request (the
//!   `shopify-reload` parameter) with that token attached.
//! - The **exit-iframe page** performs a top-level navigation out of the
//!   admin iframe, used when a full OAuth redirect is required from an
//!   embedded context.

use crate::config::AppConfig;
use crate::http::{Request, Response};

const APP_BRIDGE_SRC: &str = "https://cdn.shopify.com/shopifycloud/app-bridge.js";

/// Renders the bounce page response.
///
/// The page carries the app's API key in a meta tag and loads App Bridge,
/// which reads `shopify-reload` from the query string, obtains a session
/// token, and re-navigates with it.
pub fn bounce_page(config: &AppConfig) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\" />\n\
         <meta name=\"shopify-api-key\" content=\"{}\" />\n\
         <script src=\"{APP_BRIDGE_SRC}\"></script>\n\
         </head>\n\
         <body></body>\n\
         </html>",
        config.api_key().as_ref()
    );

    Response::html(200, body)
        .with_header("Cache-Control", "no-store")
}

/// Builds a redirect into the bounce page that retries `request` once a
/// session token is available.
pub fn bounce_redirect(config: &AppConfig, request: &Request) -> Response {
    let reload_target = {
        let query = request.query_string();
        if query.is_empty() {
            request.path().to_string()
        } else {
            format!("{}?{}", request.path(), query)
        }
    };

    let mut location = format!(
        "{}?shopify-reload={}",
        config.bounce_path(),
        urlencoding::encode(&reload_target)
    );
    if let Some(shop) = request.query_param("shop") {
        location.push_str(&format!("&shop={}", urlencoding::encode(shop)));
    }

    Response::redirect(location)
}

/// Renders the exit-iframe page: a top-level navigation to `target_url`,
/// breaking out of the admin iframe so a full OAuth redirect can happen.
pub fn exit_iframe_page(config: &AppConfig, target_url: &str) -> Response {
    let escaped = target_url.replace('"', "%22");
    let body = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\" />\n\
         <meta name=\"shopify-api-key\" content=\"{}\" />\n\
         <script src=\"{APP_BRIDGE_SRC}\"></script>\n\
         </head>\n\
         <body>\n\
         <script>window.open(\"{escaped}\", \"_top\");</script>\n\
         </body>\n\
         </html>",
        config.api_key().as_ref()
    );

    Response::html(200, body)
        .with_header("Cache-Control", "no-store")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey};
    use crate::http::Method;

    fn test_config() -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new("test-api-key").unwrap())
            .api_secret_key(ApiSecretKey::new("test-secret").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_bounce_page_embeds_api_key_and_script() {
        let response = bounce_page(&test_config());
        let body = response.body.unwrap();

        assert_eq!(response.status, 200);
        assert!(body.contains("shopify-api-key"));
        assert!(body.contains("test-api-key"));
        assert!(body.contains("app-bridge.js"));
    }

    #[test]
    fn test_bounce_page_is_uncacheable() {
        let response = bounce_page(&test_config());
        assert_eq!(response.header("cache-control"), Some("no-store"));
    }

    #[test]
    fn test_bounce_redirect_preserves_original_target() {
        let request = Request::builder(
            Method::Get,
            "/app/orders?shop=test-shop.myshopify.com&embedded=1",
        )
        .build();

        let response = bounce_redirect(&test_config(), &request);
        let location = response.header("location").unwrap();

        assert!(location.starts_with("/session-token-bounce?shopify-reload="));
        assert!(location.contains(&urlencoding::encode("/app/orders?").into_owned()));
        assert!(location.contains("shop=test-shop.myshopify.com"));
    }

    #[test]
    fn test_exit_iframe_page_targets_top_window() {
        let response = exit_iframe_page(
            &test_config(),
            "https://test-shop.myshopify.com/admin/oauth/authorize?client_id=x",
        );
        let body = response.body.unwrap();

        assert!(body.contains("window.open"));
        assert!(body.contains("\"_top\""));
        assert!(body.contains("oauth/authorize"));
    }

    #[test]
    fn test_exit_iframe_escapes_quotes_in_target() {
        let response = exit_iframe_page(&test_config(), "https://x/\"onload=\"evil");
        let body = response.body.unwrap();
        assert!(!body.contains("\"onload=\"evil"));
    }
}
