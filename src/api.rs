use reqwest::header::ACCEPT;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::AuthError;
use crate::types::{AccessToken, OAuthState, RedirectProvider};

const LOGIN_PATH: &str = "/api/auth/login";
const CALLBACK_PATH: &str = "/api/auth/callback";
const ME_PATH: &str = "/api/auth/me";

/// Token payload of `/api/auth/login` and `/api/auth/callback`.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Login URL handed out for a redirect provider.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LoginUrlResponse {
    pub login_url: Url,
    pub state: OAuthState,
}

#[derive(Deserialize)]
struct RawLoginUrl {
    #[serde(default)]
    login_url: String,
    #[serde(default)]
    state: String,
}

impl TryFrom<RawLoginUrl> for LoginUrlResponse {
    type Error = AuthError;

    fn try_from(raw: RawLoginUrl) -> Result<Self, Self::Error> {
        if raw.login_url.is_empty() {
            return Err(AuthError::MalformedResponse(
                "login URL response without login_url".into(),
            ));
        }
        if raw.state.is_empty() {
            return Err(AuthError::MalformedResponse(
                "login URL response without state".into(),
            ));
        }
        let login_url = Url::parse(&raw.login_url).map_err(|e| {
            AuthError::MalformedResponse(format!("invalid login_url {:?}: {e}", raw.login_url))
        })?;
        Ok(Self {
            login_url,
            state: OAuthState::from(raw.state),
        })
    }
}

/// Current user as reported by `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub owner: Option<String>,
    /// A `null` list is read as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub roles: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Typed client for the auth server's HTTP API.
///
/// Stateless: it never reads or writes the session store.
#[derive(Debug, Clone)]
pub struct AuthApi {
    base: Url,
    http: reqwest::Client,
}

impl AuthApi {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self {
            base,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for timeouts, proxies or connection pool reuse).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Exchanges a username and password for a token.
    ///
    /// # Errors
    ///
    /// [`AuthError::Transport`] on network failure, [`AuthError::Server`] on a
    /// non-2xx reply, [`AuthError::MalformedResponse`] if no token came back.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError> {
        tracing::debug!(username, "Direct login request");
        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH)?)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let response = Self::ensure_success(response, "Login failed").await?;
        Self::require_token(response.json::<TokenResponse>().await?)
    }

    /// Asks the server for a provider login URL and its `state`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Transport`] on network failure, [`AuthError::Server`] when
    /// the server cannot produce a login URL, [`AuthError::MalformedResponse`]
    /// if `login_url` or `state` is empty or the URL does not parse.
    pub async fn login_url(&self, provider: RedirectProvider) -> Result<LoginUrlResponse, AuthError> {
        tracing::debug!(%provider, "Login URL request");
        let response = self
            .http
            .get(self.endpoint(provider.login_path())?)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let fallback = match provider {
            RedirectProvider::OAuth => "Failed to get OAuth URL",
            RedirectProvider::Microsoft => "Failed to get Microsoft SSO URL",
        };
        let response = Self::ensure_success(response, fallback).await?;
        response.json::<RawLoginUrl>().await?.try_into()
    }

    /// Exchanges an authorization `code` (and its `state`) for a token.
    ///
    /// # Errors
    ///
    /// [`AuthError::Transport`] on network failure, [`AuthError::Server`] on a
    /// non-2xx reply, [`AuthError::MalformedResponse`] if no token came back.
    pub async fn exchange_callback(
        &self,
        code: &str,
        state: &str,
    ) -> Result<TokenResponse, AuthError> {
        tracing::debug!("Callback exchange request");
        let response = self
            .http
            .get(self.endpoint(CALLBACK_PATH)?)
            .query(&[("code", code), ("state", state)])
            .send()
            .await?;

        let response = Self::ensure_success(response, "Callback failed").await?;
        Self::require_token(response.json::<TokenResponse>().await?)
    }

    /// Fetches the user the token belongs to.
    ///
    /// # Errors
    ///
    /// [`AuthError::Transport`] on network failure, [`AuthError::Server`] on a
    /// non-2xx reply.
    pub async fn user_info(&self, token: &AccessToken) -> Result<UserInfo, AuthError> {
        let response = self
            .http
            .get(self.endpoint(ME_PATH)?)
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let response = Self::ensure_success(response, "Failed to get user info").await?;
        response.json::<UserInfo>().await.map_err(Into::into)
    }

    /// Bearer-authenticated GET of an arbitrary JSON resource.
    ///
    /// Returns the status code with the decoded body.
    ///
    /// # Errors
    ///
    /// [`AuthError::Transport`] on network failure, [`AuthError::Server`] on a
    /// non-2xx reply.
    pub async fn get_resource(
        &self,
        path: &str,
        token: &AccessToken,
    ) -> Result<(u16, serde_json::Value), AuthError> {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let response = Self::ensure_success(response, "Access denied").await?;
        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await?;
        Ok((status, body))
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base
            .join(path)
            .map_err(|e| AuthError::Config(format!("invalid endpoint {path}: {e}")))
    }

    fn require_token(token: TokenResponse) -> Result<TokenResponse, AuthError> {
        if token.access_token.as_str().is_empty() {
            return Err(AuthError::MalformedResponse(
                "empty access_token in token response".into(),
            ));
        }
        Ok(token)
    }

    /// Checks HTTP response status; returns the response on success or the
    /// server's message as [`AuthError::Server`].
    ///
    /// The message is the body's non-blank `message` field, else the raw body,
    /// else `fallback`.
    async fn ensure_success(
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| fallback.to_string());

        tracing::warn!(status, %message, "Auth server rejected request");
        Err(AuthError::Server { status, message })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn api_for(server: &MockServer) -> AuthApi {
        AuthApi::new(server.base_url().parse().unwrap())
    }

    fn token(value: &str) -> AccessToken {
        AccessToken::from(value.to_string())
    }

    #[tokio::test]
    async fn login_posts_credentials_as_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/auth/login")
                    .json_body(json!({"username": "alice", "password": "s3cret"}));
                then.status(200).json_body(json!({
                    "access_token": "jwt-alice",
                    "token_type": "Bearer",
                    "message": "Login successful."
                }));
            })
            .await;

        let token = api_for(&server).login("alice", "s3cret").await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.access_token.as_str(), "jwt-alice");
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
    }

    #[tokio::test]
    async fn server_message_is_surfaced_verbatim() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth/login");
                then.status(401)
                    .json_body(json!({"message": "invalid credentials"}));
            })
            .await;

        let err = api_for(&server).login("bob", "wrong").await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::Server { status: 401, ref message } if message == "invalid credentials"
        ));
    }

    #[tokio::test]
    async fn plain_text_error_body_becomes_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/auth/oauth/login");
                then.status(502).body("upstream unavailable");
            })
            .await;

        let err = api_for(&server)
            .login_url(RedirectProvider::OAuth)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::Server { status: 502, ref message } if message == "upstream unavailable"
        ));
    }

    #[tokio::test]
    async fn empty_error_body_uses_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/auth/microsoft/login");
                then.status(500).json_body(json!({}));
            })
            .await;

        let err = api_for(&server)
            .login_url(RedirectProvider::Microsoft)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::Server { status: 500, ref message } if message == "Failed to get Microsoft SSO URL"
        ));
    }

    #[tokio::test]
    async fn blank_server_message_uses_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth/login");
                then.status(401).json_body(json!({"message": ""}));
            })
            .await;

        let err = api_for(&server).login("bob", "wrong").await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::Server { status: 401, ref message } if message == "Login failed"
        ));
    }

    #[tokio::test]
    async fn empty_login_url_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/auth/oauth/login");
                then.status(200)
                    .json_body(json!({"login_url": "", "state": "s"}));
            })
            .await;

        let err = api_for(&server)
            .login_url(RedirectProvider::OAuth)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn relative_login_url_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/auth/oauth/login");
                then.status(200)
                    .json_body(json!({"login_url": "/login/oauth/authorize", "state": "s"}));
            })
            .await;

        let err = api_for(&server)
            .login_url(RedirectProvider::OAuth)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn microsoft_login_url_asks_for_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/auth/microsoft/login")
                    .header("accept", "application/json");
                then.status(200).json_body(json!({
                    "login_url": "https://idp.example.com/login/oauth/authorize?provider=microsoft-provider",
                    "state": "ms-state",
                    "provider": "microsoft"
                }));
            })
            .await;

        let res = api_for(&server)
            .login_url(RedirectProvider::Microsoft)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(res.state.as_str(), "ms-state");
        assert_eq!(res.login_url.host_str(), Some("idp.example.com"));
    }

    #[tokio::test]
    async fn callback_encodes_query_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/auth/callback")
                    .query_param("code", "a b&c")
                    .query_param("state", "xyz=");
                then.status(200).json_body(json!({"access_token": "jwt-cb"}));
            })
            .await;

        let token = api_for(&server)
            .exchange_callback("a b&c", "xyz=")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token.access_token.as_str(), "jwt-cb");
    }

    #[tokio::test]
    async fn empty_token_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/auth/callback");
                then.status(200).json_body(json!({"access_token": ""}));
            })
            .await;

        let err = api_for(&server)
            .exchange_callback("code", "state")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_token_field_is_transport_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth/login");
                then.status(200).json_body(json!({"message": "ok"}));
            })
            .await;

        let err = api_for(&server).login("a", "b").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(ref e) if e.is_decode()));
    }

    #[tokio::test]
    async fn user_info_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/auth/me")
                    .header("authorization", "Bearer jwt-1");
                then.status(200).json_body(json!({
                    "id": "built-in/alice",
                    "name": "alice",
                    "display_name": "Alice",
                    "email": "alice@example.com",
                    "owner": "built-in",
                    "roles": ["admin"],
                    "is_admin": true
                }));
            })
            .await;

        let user = api_for(&server).user_info(&token("jwt-1")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(user.name, "alice");
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert!(user.is_admin);
        assert_eq!(user.roles, vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn null_roles_read_as_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/auth/me");
                then.status(200).json_body(json!({
                    "id": "u1",
                    "name": "bob",
                    "email": "bob@example.com",
                    "roles": null,
                    "is_admin": false
                }));
            })
            .await;

        let user = api_for(&server).user_info(&token("jwt-2")).await.unwrap();

        assert_eq!(user.name, "bob");
        assert!(user.roles.is_empty());
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let api = AuthApi::new("http://127.0.0.1:9".parse().unwrap());
        let err = api.login("a", "b").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }
}
