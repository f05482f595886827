use crate::store::StoreError;

/// Errors surfaced by the session controller and the auth API client.
///
/// Every variant leaves the persisted session untouched.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Connection failure, or a response body that could not be decoded.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response that lacks a value the flow depends on.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Non-2xx response, carrying the server's own message.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Callback `state` differs from the pending redirect (strict policy only).
    #[error("OAuth state mismatch")]
    StateMismatch {
        expected: Option<String>,
        received: String,
    },

    /// Username or password left empty.
    #[error("Please enter username and password")]
    MissingCredentials,

    /// No access token stored.
    #[error("Please login first")]
    NotAuthenticated,

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// HTTP status reported by the server, if this is a server-side failure.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_displays_message_verbatim() {
        let err = AuthError::Server {
            status: 401,
            message: "invalid credentials".into(),
        };
        assert_eq!(err.to_string(), "Server error (401): invalid credentials");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn local_errors_have_no_status() {
        assert_eq!(AuthError::NotAuthenticated.status(), None);
        assert_eq!(
            AuthError::MissingCredentials.to_string(),
            "Please enter username and password"
        );
    }
}
