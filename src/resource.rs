use std::str::FromStr;

use derive_more::Display;

use crate::error::AuthError;

/// Bearer-protected endpoints exposed by the auth server's demo API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ProtectedResource {
    #[display("protected")]
    Protected,
    #[display("profile")]
    Profile,
    /// Admin only.
    #[display("users")]
    Users,
    /// Token checked against the provider certificate.
    #[display("secrets")]
    Secrets,
}

impl ProtectedResource {
    pub const ALL: [Self; 4] = [Self::Protected, Self::Profile, Self::Users, Self::Secrets];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Protected => "/api/protected",
            Self::Profile => "/api/users/profile",
            Self::Users => "/api/users",
            Self::Secrets => "/api/secrets",
        }
    }

    /// Human-readable name for result listings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Protected => "Protected Resource",
            Self::Profile => "User Profile",
            Self::Users => "Users List (Admin Only)",
            Self::Secrets => "Secrets (Cert Verification)",
        }
    }
}

impl FromStr for ProtectedResource {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                AuthError::Config(format!(
                    "unknown resource {s:?}, expected one of: protected, profile, users, secrets"
                ))
            })
    }
}

/// Successful response from a [`ProtectedResource`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ResourceReport {
    pub resource: ProtectedResource,
    pub status: u16,
    pub body: serde_json::Value,
}
