//! Admin request authentication.
//!
//! The request classification for an admin-facing request:
//!
//! 1. `OPTIONS` requests answer the CORS preflight before anything else.
//! 2. Known crawlers are rejected early so no token exchange is wasted.
//! 3. The bounce path renders the session-token bounce page.
//! 4. A `Authorization: Bearer` session token is validated and exchanged.
//! 5. Otherwise the top-level navigation flow runs: sanitize `shop`/`host`
//!    parameters, redirect non-embedded loads into the admin, and route
//!    requests without a usable `id_token` through the bounce page.
//!
//! Token exchange reuses a stored, still-active session whose scopes cover
//! the configured scopes; otherwise the exchange runs behind the idempotent
//! guard so concurrent requests with the same token exchange exactly once.

use crate::auth::oauth::hmac::sha256_hex;
use crate::auth::oauth::{
    begin_auth, exchange_token, validate_callback, CallbackQuery, OAuthError, RequestedTokenType,
    SessionToken,
};
use crate::auth::Session;
use crate::authenticate::{
    bounce, cors, AdminAuth, AdminContext, AuthEngine, AuthError, SESSION_COOKIE, STATE_COOKIE,
    STATE_COOKIE_MAX_AGE,
};
use crate::config::ShopDomain;
use crate::http::cookies::verify_signed_value;
use crate::http::{Method, Request, Response, SetCookie};
use crate::session_store::SessionStore;

/// User-agent fragments identifying crawlers.
const BOT_AGENTS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "slurp",
    "facebookexternalhit",
    "mediapartners-google",
];

fn is_bot(request: &Request) -> bool {
    request.header("user-agent").is_some_and(|agent| {
        let agent = agent.to_ascii_lowercase();
        BOT_AGENTS.iter().any(|fragment| agent.contains(fragment))
    })
}

fn is_valid_host_param(host: &str) -> bool {
    // The host parameter is base64; anything else is malformed
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
}

/// Outcome of an OAuth callback.
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// The callback completed; the session was stored and the response
    /// redirects into the app.
    Completed {
        /// The stored session.
        session: Session,
        /// The redirect (or hook-supplied) response to send.
        response: Response,
    },

    /// The flow could not complete but is safely restartable (expired
    /// state cookie, wrong token type); the response re-begins auth.
    Restart(Response),
}

impl<S: SessionStore + 'static> AuthEngine<S> {
    /// Authenticates an admin-facing request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] for malformed requests, storage failures, and
    /// exchange failures without a recovery path. Expected control flow
    /// (redirects, bounce pages, rejections) is expressed through
    /// [`AdminAuth`], not errors.
    pub async fn authenticate_admin(&self, request: &Request) -> Result<AdminAuth, AuthError> {
        // Preflights carry no credentials and short-circuit everything else
        if request.method() == Method::Options {
            return Ok(AdminAuth::Rejected(cors::preflight_response(request)));
        }

        if is_bot(request) {
            tracing::debug!("rejecting crawler request");
            return Ok(AdminAuth::Rejected(Response::text(410, "Gone")));
        }

        if request.path() == self.config.bounce_path() {
            return Ok(AdminAuth::Redirect(bounce::bounce_page(&self.config)));
        }

        if let Some(raw_token) = request.bearer_token() {
            return self.authenticate_with_token(request, raw_token).await;
        }

        self.authenticate_navigation(request).await
    }

    /// Bearer-token flow: validate the session token, then exchange.
    async fn authenticate_with_token(
        &self,
        request: &Request,
        raw_token: &str,
    ) -> Result<AdminAuth, AuthError> {
        match SessionToken::decode(raw_token, &self.config) {
            Ok(payload) => self.token_exchange_flow(payload, raw_token).await,
            Err(error) => {
                tracing::warn!(%error, "rejected bearer session token");
                let shop = request
                    .query_param("shop")
                    .and_then(|s| ShopDomain::new(s).ok());
                Ok(AdminAuth::Rejected(
                    self.unauthorized_fetch_response(shop.as_ref()),
                ))
            }
        }
    }

    /// Top-level navigation flow (no bearer token).
    async fn authenticate_navigation(&self, request: &Request) -> Result<AdminAuth, AuthError> {
        let shop_param = request
            .query_param("shop")
            .ok_or_else(|| AuthError::InvalidRequest {
                reason: "Missing shop parameter".to_string(),
            })?;
        let shop = ShopDomain::new(shop_param).map_err(|_| AuthError::InvalidRequest {
            reason: "Invalid shop parameter".to_string(),
        })?;

        if let Some(host) = request.query_param("host") {
            if !is_valid_host_param(host) {
                return Err(AuthError::InvalidRequest {
                    reason: "Invalid host parameter".to_string(),
                });
            }
        }

        if !self.config.is_embedded() {
            return self.authenticate_cookie(request, &shop).await;
        }

        // Embedded apps must load inside the admin iframe
        if request.query_param("embedded") != Some("1") {
            return Ok(AdminAuth::Redirect(Response::redirect(
                self.embed_url(&shop, request.path()),
            )));
        }

        match request.query_param("id_token") {
            Some(raw_token) => match SessionToken::decode(raw_token, &self.config) {
                Ok(payload) => {
                    let raw_token = raw_token.to_string();
                    self.token_exchange_flow(payload, &raw_token).await
                }
                // A stale token from a resumed tab is minted fresh by the
                // bounce page rather than rejected
                Err(_) => Ok(AdminAuth::Redirect(bounce::bounce_redirect(
                    &self.config,
                    request,
                ))),
            },
            None => Ok(AdminAuth::Redirect(bounce::bounce_redirect(
                &self.config,
                request,
            ))),
        }
    }

    /// Cookie-based session lookup for non-embedded apps.
    async fn authenticate_cookie(
        &self,
        request: &Request,
        shop: &ShopDomain,
    ) -> Result<AdminAuth, AuthError> {
        let cookies = request.cookies();
        let session_id = cookies
            .get(SESSION_COOKIE)
            .and_then(|raw| verify_signed_value(raw, &self.config));

        if let Some(session_id) = session_id {
            match self.store.load_session(&session_id).await? {
                Some(session) if session.is_active_for(self.config.scopes()) => {
                    return Ok(AdminAuth::Authenticated(Box::new(AdminContext {
                        shop: shop.clone(),
                        session,
                        token: None,
                    })));
                }
                _ => {
                    tracing::debug!("session cookie refers to no active session");
                }
            }
        }

        Ok(AdminAuth::Redirect(self.begin_oauth(shop)?))
    }

    /// Looks up or exchanges a session for a validated token.
    async fn token_exchange_flow(
        &self,
        payload: SessionToken,
        raw_token: &str,
    ) -> Result<AdminAuth, AuthError> {
        let shop = payload.shop()?;
        let online = self.config.use_online_tokens();

        let session_id = if online {
            payload.shopify_user_id().map_or_else(
                || Session::offline_id(&shop),
                |user_id| Session::online_id(&shop, user_id),
            )
        } else {
            Session::offline_id(&shop)
        };

        // Reuse requires the stored grant to still cover today's scopes
        if let Some(existing) = self.store.load_session(&session_id).await? {
            if existing.is_active_for(self.config.scopes()) {
                tracing::debug!(%session_id, "reusing stored session");
                return Ok(AdminAuth::Authenticated(Box::new(AdminContext {
                    shop,
                    session: existing,
                    token: Some(payload),
                })));
            }
        }

        // Keyed by shop plus token digest: concurrent requests carrying the
        // same token join one exchange
        let identifier = format!("{}:{}", shop.as_ref(), sha256_hex(raw_token.as_bytes()));

        let client = self.client.clone();
        let config = std::sync::Arc::clone(&self.config);
        let store = std::sync::Arc::clone(&self.store);
        let exchange_shop = shop.clone();
        let token = raw_token.to_string();
        let requested = if online {
            RequestedTokenType::Online
        } else {
            RequestedTokenType::Offline
        };

        let result = self
            .guard
            .run(&identifier, async move {
                let session =
                    exchange_token(&client, &config, &exchange_shop, &token, requested).await?;
                store.store_session(session.clone()).await?;
                Ok::<Session, AuthError>(session)
            })
            .await;

        match result {
            Ok(session) => Ok(AdminAuth::Authenticated(Box::new(AdminContext {
                shop,
                session,
                token: Some(payload),
            }))),
            Err(AuthError::Oauth(OAuthError::InvalidJwt { reason })) => {
                tracing::warn!(%reason, "token exchange rejected session token");
                Ok(AdminAuth::Rejected(
                    self.unauthorized_fetch_response(Some(&shop)),
                ))
            }
            Err(other) => Err(other),
        }
    }

    /// Begins the redirect-based OAuth flow for `shop`.
    ///
    /// The generated state is set in a signed, short-lived cookie and must
    /// round-trip through the callback.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Oauth`] when the app's host URL is not
    /// configured.
    pub fn begin_oauth(&self, shop: &ShopDomain) -> Result<Response, AuthError> {
        let result = begin_auth(&self.config, shop, self.config.use_online_tokens(), None)?;
        let cookie = SetCookie::signed(STATE_COOKIE, result.state.as_ref(), &self.config)
            .max_age(STATE_COOKIE_MAX_AGE);
        Ok(Response::redirect(result.auth_url).with_cookie(&cookie))
    }

    /// Handles the OAuth callback: validates the signature and state,
    /// exchanges the code, persists the session, and builds the post-auth
    /// redirect.
    ///
    /// An absent state cookie is an expired flow, not an attack: the
    /// outcome is [`CallbackOutcome::Restart`] with a fresh begin response.
    /// A present-but-mismatching state is rejected with an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] for signature/state failures, malformed
    /// callbacks, exchange failures, and storage failures.
    pub async fn oauth_callback(&self, request: &Request) -> Result<CallbackOutcome, AuthError> {
        let query = CallbackQuery::from_pairs(request.query_pairs().to_vec())?;

        let shop = ShopDomain::new(query.shop()).map_err(|_| AuthError::InvalidRequest {
            reason: "Invalid shop parameter".to_string(),
        })?;

        let cookies = request.cookies();
        let Some(expected_state) = cookies
            .get(STATE_COOKIE)
            .and_then(|raw| verify_signed_value(raw, &self.config))
        else {
            // Expired or missing flow state: restart rather than reject
            tracing::debug!("state cookie absent, restarting OAuth");
            return Ok(CallbackOutcome::Restart(self.begin_oauth(&shop)?));
        };

        let session =
            validate_callback(&self.client, &self.config, &query, &expected_state).await?;

        // The grant kind must match what the app is configured to use
        if session.is_online != self.config.use_online_tokens() {
            tracing::debug!(
                is_online = session.is_online,
                "token type mismatch, restarting OAuth"
            );
            return Ok(CallbackOutcome::Restart(self.begin_oauth(&shop)?));
        }

        self.store.store_session(session.clone()).await?;

        if let Some(hook) = &self.after_auth {
            if let Some(response) = hook(&session) {
                // A hook-supplied response overrides the default redirect
                // and passes through unchanged
                let response = response.with_cookie(&SetCookie::expired(STATE_COOKIE));
                return Ok(CallbackOutcome::Completed { session, response });
            }
        }

        let response = self
            .post_auth_redirect(&session)
            .with_cookie(&SetCookie::expired(STATE_COOKIE));

        Ok(CallbackOutcome::Completed { session, response })
    }

    /// Builds the response that triggers re-authentication after a
    /// downstream 401.
    ///
    /// - Fetch-style callers (bearer header present) get a 401 with the
    ///   re-auth URL in a response header, since they cannot follow
    ///   redirects.
    /// - Embedded page navigations get the exit-iframe page.
    /// - Non-embedded navigations get a plain 302 into OAuth begin.
    #[must_use]
    pub fn reauthorize_response(&self, request: &Request, shop: &ShopDomain) -> Response {
        if request.bearer_token().is_some() {
            return self.unauthorized_fetch_response(Some(shop));
        }

        let auth_url = self.auth_begin_url(Some(shop));
        if self.config.is_embedded() {
            bounce::exit_iframe_page(&self.config, &auth_url)
        } else {
            Response::redirect(auth_url)
        }
    }

    fn post_auth_redirect(&self, session: &Session) -> Response {
        if self.config.is_embedded() {
            Response::redirect(self.embed_url(&session.shop, "/"))
        } else {
            let cookie = SetCookie::signed(SESSION_COOKIE, &session.id, &self.config);
            Response::redirect("/").with_cookie(&cookie)
        }
    }

    /// URL of the app inside the Shopify admin.
    fn embed_url(&self, shop: &ShopDomain, path: &str) -> String {
        format!(
            "https://{}/admin/apps/{}{}",
            shop.as_ref(),
            self.config.api_key().as_ref(),
            path
        )
    }

    /// Absolute URL that begins OAuth, for headers and exit-iframe targets.
    fn auth_begin_url(&self, shop: Option<&ShopDomain>) -> String {
        let base = self
            .config
            .host()
            .map_or_else(String::new, |host| host.as_ref().to_string());
        let mut url = format!("{base}{}", self.config.auth_path());
        if let Some(shop) = shop {
            url.push_str(&format!("?shop={}", urlencoding::encode(shop.as_ref())));
        }
        url
    }

    /// 401 carrying the re-auth URL header for non-redirectable callers.
    fn unauthorized_fetch_response(&self, shop: Option<&ShopDomain>) -> Response {
        Response::text(401, "Unauthorized")
            .with_header(cors::REAUTH_REQUIRED_HEADER, "1")
            .with_header(cors::REAUTH_URL_HEADER, self.auth_begin_url(shop))
            .with_header(
                "Access-Control-Expose-Headers",
                format!(
                    "{}, {}",
                    cors::REAUTH_REQUIRED_HEADER,
                    cors::REAUTH_URL_HEADER
                ),
            )
    }
}
