use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Opaque bearer credential issued by the auth server.
///
/// `Debug` is redacted so the token never reaches logs by accident.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Opaque `state` value handed out by the server with a login URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct OAuthState(pub String);

impl OAuthState {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How the current session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    #[display("none")]
    None,
    #[display("direct")]
    Direct,
    #[display("oauth")]
    OAuth,
    #[display("microsoft")]
    Microsoft,
}

impl AuthMethod {
    /// Parses the persisted `auth_method` value. Unknown values yield `None`.
    #[must_use]
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "direct" => Some(Self::Direct),
            "oauth" => Some(Self::OAuth),
            "microsoft" => Some(Self::Microsoft),
            _ => None,
        }
    }
}

/// Identity providers reached through a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum RedirectProvider {
    #[display("oauth")]
    OAuth,
    #[display("microsoft")]
    Microsoft,
}

impl RedirectProvider {
    /// Server path that hands out this provider's login URL.
    #[must_use]
    pub fn login_path(self) -> &'static str {
        match self {
            Self::OAuth => "/api/auth/oauth/login",
            Self::Microsoft => "/api/auth/microsoft/login",
        }
    }
}

impl From<RedirectProvider> for AuthMethod {
    fn from(provider: RedirectProvider) -> Self {
        match provider {
            RedirectProvider::OAuth => Self::OAuth,
            RedirectProvider::Microsoft => Self::Microsoft,
        }
    }
}

/// A redirect login that has left for the provider and not yet returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRedirect {
    pub provider: RedirectProvider,
    pub state: OAuthState,
}

/// The client's persisted view of its authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Session {
    pub token: Option<AccessToken>,
    pub method: AuthMethod,
    /// State of an unfinished redirect login, if any.
    pub pending_state: Option<OAuthState>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Coarse position in the login state machine, derived from a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    #[display("anonymous")]
    Anonymous,
    #[display("awaiting redirect")]
    AwaitingRedirect,
    #[display("authenticated")]
    Authenticated,
}

impl From<&Session> for SessionState {
    fn from(session: &Session) -> Self {
        if session.token.is_some() {
            Self::Authenticated
        } else if session.pending_state.is_some() {
            Self::AwaitingRedirect
        } else {
            Self::Anonymous
        }
    }
}

/// What the embedding UI should do with its location after a step of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Leave for an external login page.
    External(url::Url),
    /// Replace the visible location without reloading.
    Replace(url::Url),
    /// Navigate to an in-app path.
    Redirect(String),
    /// Nothing to do.
    Stay,
}
