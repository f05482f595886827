//! The session controller: login flows over a persisted session.
//!
//! ```text
//!            begin_redirect_login            complete_callback
//! ANONYMOUS ───────────────────▶ AWAITING_REDIRECT ─────────────▶ AUTHENTICATED
//!     │                                                               ▲
//!     └───────────────────────── login_direct ────────────────────────┘
//!
//! logout: any state ─▶ ANONYMOUS
//! ```
//!
//! Every transition is a single [`WriteBatch`] issued after the network call
//! has succeeded. Concurrent calls race; the last write wins.

use url::Url;

use crate::api::{AuthApi, UserInfo};
use crate::config::{AfterLogin, SessionConfig, StatePolicy};
use crate::error::AuthError;
use crate::resource::{ProtectedResource, ResourceReport};
use crate::store::{
    ACCESS_TOKEN_KEY, AUTH_METHOD_KEY, KeyValueStore, MICROSOFT_STATE_KEY, OAUTH_STATE_KEY,
    WriteBatch,
};
use crate::types::{
    AccessToken, AuthMethod, Navigation, OAuthState, PendingRedirect, RedirectProvider, Session,
    SessionState,
};

/// Result of handling a callback on page load.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Landing {
    pub session: Session,
    /// Where to go next; never the callback URL itself.
    pub navigation: Navigation,
}

/// Client-side authentication session over an injected store.
pub struct SessionController<S> {
    api: AuthApi,
    store: S,
    state_policy: StatePolicy,
    after_login: AfterLogin,
}

impl<S: KeyValueStore> SessionController<S> {
    #[must_use]
    pub fn new(config: SessionConfig, store: S) -> Self {
        Self {
            api: AuthApi::new(config.api_base),
            store,
            state_policy: config.state_policy,
            after_login: config.after_login,
        }
    }

    /// Use a preconfigured API client (custom `reqwest::Client`, timeouts).
    #[must_use]
    pub fn with_api(mut self, api: AuthApi) -> Self {
        self.api = api;
        self
    }

    #[must_use]
    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Direct login ───────────────────────────────────────────────

    /// Logs in with a username and password.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingCredentials`] if either value is empty (no request
    /// is sent); otherwise any error of [`AuthApi::login`] or the store.
    pub async fn login_direct(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let token = self.api.login(username, password).await?.access_token;
        let session = self.authenticate(token, AuthMethod::Direct)?;
        tracing::info!(method = %AuthMethod::Direct, "Direct login successful");
        Ok(session)
    }

    // ── Redirect login ─────────────────────────────────────────────

    /// Starts a redirect login and returns where to send the user.
    ///
    /// Persists the pending redirect before returning, replacing any earlier
    /// one. An existing token is kept until the callback succeeds.
    ///
    /// # Errors
    ///
    /// Any error of [`AuthApi::login_url`], or a store failure.
    pub async fn begin_redirect_login(
        &self,
        provider: RedirectProvider,
    ) -> Result<Navigation, AuthError> {
        let res = self.api.login_url(provider).await?;

        let (key, other) = state_keys(provider);
        self.store
            .apply(WriteBatch::new().set(key, res.state.as_str()).remove(other))?;

        tracing::info!(%provider, "Redirecting to external login");
        Ok(Navigation::External(res.login_url))
    }

    /// Exchanges a callback `code` for a token.
    ///
    /// Without a pending redirect the method defaults to OAuth. Under
    /// [`StatePolicy::Strict`] a missing or different pending state fails
    /// before any request is sent.
    ///
    /// # Errors
    ///
    /// [`AuthError::StateMismatch`] (strict only), any error of
    /// [`AuthApi::exchange_callback`], or a store failure.
    pub async fn complete_callback(&self, code: &str, state: &str) -> Result<Session, AuthError> {
        let pending = self.pending_redirect();

        if self.state_policy == StatePolicy::Strict
            && pending.as_ref().map(|p| p.state.as_str()) != Some(state)
        {
            tracing::warn!(
                pending = pending.is_some(),
                "OAuth state mismatch, callback rejected"
            );
            return Err(AuthError::StateMismatch {
                expected: pending.map(|p| p.state.into()),
                received: state.to_string(),
            });
        }

        let method = pending.map_or(AuthMethod::OAuth, |p| p.provider.into());
        tracing::debug!(%method, "Processing callback");

        let token = self.api.exchange_callback(code, state).await?.access_token;
        let session = self.authenticate(token, method)?;
        tracing::info!(%method, "Redirect login successful");
        Ok(session)
    }

    /// Page-load hook: completes a callback if `location` carries a `code`.
    ///
    /// Returns `None` when there is nothing to do. On success the returned
    /// navigation never points back at a URL with the `code`, so a reload
    /// cannot replay the exchange.
    ///
    /// # Errors
    ///
    /// Any error of [`complete_callback`](Self::complete_callback).
    pub async fn handle_page_load(&self, location: &Url) -> Result<Option<Landing>, AuthError> {
        let mut code = None;
        let mut state = String::new();
        for (key, value) in location.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = value.into_owned(),
                _ => {}
            }
        }

        let Some(code) = code.filter(|c| !c.is_empty()) else {
            return Ok(None);
        };

        let session = self.complete_callback(&code, &state).await?;
        Ok(Some(Landing {
            session,
            navigation: self.after_login(Some(location)),
        }))
    }

    /// Post-login navigation for the configured [`AfterLogin`] policy.
    ///
    /// With `ShowInline`, a `location` is replaced by itself minus query and
    /// fragment; without one there is nowhere to go.
    #[must_use]
    pub fn after_login(&self, location: Option<&Url>) -> Navigation {
        match (&self.after_login, location) {
            (AfterLogin::RedirectTo(path), _) => Navigation::Redirect(path.clone()),
            (AfterLogin::ShowInline, Some(location)) => Navigation::Replace(strip_query(location)),
            (AfterLogin::ShowInline, None) => Navigation::Stay,
        }
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Reads the persisted session. No network call.
    #[must_use]
    pub fn current_session(&self) -> Session {
        let token = self
            .store
            .get(ACCESS_TOKEN_KEY)
            .filter(|t| !t.is_empty())
            .map(AccessToken::from);
        let method = match &token {
            Some(_) => self
                .store
                .get(AUTH_METHOD_KEY)
                .and_then(|m| AuthMethod::from_stored(&m))
                .unwrap_or(AuthMethod::Direct),
            None => AuthMethod::None,
        };

        Session {
            token,
            method,
            pending_state: self.pending_redirect().map(|p| p.state),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from(&self.current_session())
    }

    /// The redirect login awaiting its callback, if any.
    #[must_use]
    pub fn pending_redirect(&self) -> Option<PendingRedirect> {
        [RedirectProvider::OAuth, RedirectProvider::Microsoft]
            .into_iter()
            .find_map(|provider| {
                let (key, _) = state_keys(provider);
                self.store
                    .get(key)
                    .filter(|s| !s.is_empty())
                    .map(|state| PendingRedirect {
                        provider,
                        state: OAuthState::from(state),
                    })
            })
    }

    // ── Protected calls ────────────────────────────────────────────

    /// Fetches the logged-in user.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] without a stored token; otherwise any
    /// error of [`AuthApi::user_info`].
    pub async fn fetch_user_info(&self) -> Result<UserInfo, AuthError> {
        let token = self.require_token()?;
        self.api.user_info(&token).await
    }

    /// Calls one of the protected demo resources.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] without a stored token; otherwise any
    /// error of [`AuthApi::get_resource`].
    pub async fn fetch_resource(
        &self,
        resource: ProtectedResource,
    ) -> Result<ResourceReport, AuthError> {
        let token = self.require_token()?;
        let (status, body) = self.api.get_resource(resource.path(), &token).await?;
        Ok(ResourceReport {
            resource,
            status,
            body,
        })
    }

    // ── Logout ─────────────────────────────────────────────────────

    /// Clears the token and any pending redirect. Never fails.
    pub fn logout(&self) {
        if let Err(e) = self.store.apply(WriteBatch::clear_session()) {
            tracing::warn!(error = %e, "Session store write failed during logout");
        } else {
            tracing::info!("Logged out");
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn require_token(&self) -> Result<AccessToken, AuthError> {
        self.current_session()
            .token
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Stores `token` and clears every pending redirect in one batch.
    fn authenticate(&self, token: AccessToken, method: AuthMethod) -> Result<Session, AuthError> {
        self.store.apply(
            WriteBatch::new()
                .set(ACCESS_TOKEN_KEY, token.as_str())
                .set(AUTH_METHOD_KEY, method.to_string())
                .remove(OAUTH_STATE_KEY)
                .remove(MICROSOFT_STATE_KEY),
        )?;
        Ok(Session {
            token: Some(token),
            method,
            pending_state: None,
        })
    }
}

/// `(own key, other provider's key)` for a provider's pending state.
fn state_keys(provider: RedirectProvider) -> (&'static str, &'static str) {
    match provider {
        RedirectProvider::OAuth => (OAUTH_STATE_KEY, MICROSOFT_STATE_KEY),
        RedirectProvider::Microsoft => (MICROSOFT_STATE_KEY, OAUTH_STATE_KEY),
    }
}

fn strip_query(location: &Url) -> Url {
    let mut clean = location.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    clean
}
