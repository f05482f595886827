use url::Url;

use crate::error::AuthError;

/// Whether a callback's `state` must match the pending redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatePolicy {
    /// Accept any callback; a missing pending redirect falls back to OAuth.
    #[default]
    Lenient,
    /// Reject callbacks whose `state` differs from the pending redirect,
    /// including callbacks with no pending redirect at all.
    Strict,
}

/// Where the UI goes once a login completes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AfterLogin {
    /// Stay on the current page and render the session there.
    #[default]
    ShowInline,
    /// Navigate to an in-app path, e.g. `/dashboard`.
    RedirectTo(String),
}

/// Session controller configuration.
///
/// The auth server base URL is the only required value.
///
/// ```rust,ignore
/// use casdoor_session::{SessionConfig, StatePolicy, AfterLogin};
///
/// let config = SessionConfig::new("http://localhost:8080".parse()?)
///     .with_state_policy(StatePolicy::Strict)
///     .with_after_login(AfterLogin::RedirectTo("/dashboard".into()));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionConfig {
    pub(crate) api_base: Url,
    pub(crate) state_policy: StatePolicy,
    pub(crate) after_login: AfterLogin,
}

impl SessionConfig {
    #[must_use]
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base,
            state_policy: StatePolicy::default(),
            after_login: AfterLogin::default(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `AUTH_API_BASE`: base URL of the auth server
    ///
    /// # Optional env vars
    /// - `AUTH_STRICT_STATE`: `"1"` or `"true"` to enforce callback state matching
    /// - `AUTH_REDIRECT_AFTER_LOGIN`: in-app path to navigate to after login
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if `AUTH_API_BASE` is missing or invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if `AUTH_API_BASE` is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let base = lookup("AUTH_API_BASE")
            .ok_or_else(|| AuthError::Config("AUTH_API_BASE is required".into()))?;
        let api_base: Url = base
            .parse()
            .map_err(|e| AuthError::Config(format!("AUTH_API_BASE: {e}")))?;

        let mut config = Self::new(api_base);

        if matches!(lookup("AUTH_STRICT_STATE").as_deref(), Some("1" | "true")) {
            config = config.with_state_policy(StatePolicy::Strict);
        }

        if let Some(path) = lookup("AUTH_REDIRECT_AFTER_LOGIN").filter(|p| !p.trim().is_empty()) {
            if !path.starts_with('/') {
                return Err(AuthError::Config(format!(
                    "AUTH_REDIRECT_AFTER_LOGIN must be an absolute path, got {path:?}"
                )));
            }
            config = config.with_after_login(AfterLogin::RedirectTo(path));
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_state_policy(mut self, policy: StatePolicy) -> Self {
        self.state_policy = policy;
        self
    }

    #[must_use]
    pub fn with_after_login(mut self, after_login: AfterLogin) -> Self {
        self.after_login = after_login;
        self
    }

    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    #[must_use]
    pub fn state_policy(&self) -> StatePolicy {
        self.state_policy
    }

    #[must_use]
    pub fn after_login(&self) -> &AfterLogin {
        &self.after_login
    }
}
