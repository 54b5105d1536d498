use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Credentials;

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens closer than this to expiry are refreshed before use.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Identity provider rejected the credentials ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
    #[error("Token endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    fn usable_at(&self, now: Instant) -> bool {
        self.expires_at > now + EXPIRY_MARGIN
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// App-only token source for Microsoft Graph with a single shared cache.
///
/// The cache lock is held across a refresh, so concurrent callers queue
/// behind the one request in flight and then reuse its result.
pub struct TokenProvider {
    http: Client,
    credentials: Credentials,
    token_url: String,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(http: Client, credentials: Credentials, authority_url: &str) -> Self {
        Self::with_clock(http, credentials, authority_url, Arc::new(SystemClock))
    }

    pub fn with_clock(
        http: Client,
        credentials: Credentials,
        authority_url: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_url.trim_end_matches('/'),
            credentials.tenant_id
        );
        Self { http, credentials, token_url, clock, cached: Mutex::new(None) }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub async fn get_token(&self) -> Result<AccessToken, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.usable_at(self.clock.now()) {
                return Ok(token.clone());
            }
            debug!("cached Graph token is within the expiry margin, refreshing");
        }

        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];
        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(AuthError::Transport)?;

        if !status.is_success() {
            let message = token_error_message(&text).unwrap_or_else(|| status.to_string());
            warn!(status = status.as_u16(), "Graph token request rejected");
            return Err(AuthError::Rejected { status: status.as_u16(), message });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let value = body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("missing access_token".to_string()))?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| AuthError::InvalidResponse("missing expires_in".to_string()))?;

        if expires_in <= EXPIRY_MARGIN.as_secs() {
            return Err(AuthError::InvalidResponse(format!(
                "expires_in of {expires_in}s does not outlast the {}s refresh margin",
                EXPIRY_MARGIN.as_secs()
            )));
        }
        let expires_at = self
            .clock
            .now()
            .checked_add(Duration::from_secs(expires_in))
            .ok_or_else(|| {
                AuthError::InvalidResponse(format!("expires_in of {expires_in}s is out of range"))
            })?;

        info!(expires_in, "acquired Graph access token");
        Ok(AccessToken { value, expires_at })
    }
}

// AAD error bodies look like {"error": "invalid_client", "error_description": "AADSTS7000215: ..."}
fn token_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error_description")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(|s| s.lines().next().unwrap_or(s).to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::sync::Mutex as StdMutex;

    pub struct ManualClock(StdMutex<Instant>);

    impl ManualClock {
        pub fn new() -> Self {
            Self(StdMutex::new(Instant::now()))
        }

        pub fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    pub fn test_credentials() -> Credentials {
        Credentials {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "s3cret".to_string(),
            site_id: "site-1".to_string(),
        }
    }

    fn provider(server: &Server, clock: Arc<dyn Clock>) -> TokenProvider {
        TokenProvider::with_clock(Client::new(), test_credentials(), &server.url(), clock)
    }

    #[tokio::test]
    async fn posts_client_credentials_grant() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                Matcher::UrlEncoded("scope".into(), GRAPH_SCOPE.into()),
            ]))
            .with_status(200)
            .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"tok-1"}"#)
            .create_async().await;

        let tokens = provider(&server, Arc::new(SystemClock));
        let token = tokens.get_token().await.unwrap();
        assert_eq!(token.value, "tok-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn reuses_token_until_margin_then_refreshes_once() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":3600,"access_token":"tok"}"#)
            .expect(2)
            .create_async().await;

        let clock = Arc::new(ManualClock::new());
        let tokens = provider(&server, clock.clone());

        tokens.get_token().await.unwrap();
        clock.advance(Duration::from_secs(1000));
        tokens.get_token().await.unwrap();

        // 30s before expiry is inside the margin
        clock.advance(Duration::from_secs(2570));
        tokens.get_token().await.unwrap();
        tokens.get_token().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":3600,"access_token":"tok"}"#)
            .expect(1)
            .create_async().await;

        let tokens = Arc::new(provider(&server, Arc::new(SystemClock)));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let tokens = tokens.clone();
            tasks.spawn(async move { tokens.get_token().await.map(|t| t.value) });
        }
        while let Some(joined) = tasks.join_next().await {
            assert_eq!(joined.unwrap().unwrap(), "tok");
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_secret_surfaces_error_description() {
        let mut server = Server::new_async().await;
        server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided.\r\nTrace ID: abc"}"#)
            .create_async().await;

        let tokens = provider(&server, Arc::new(SystemClock));
        let err = tokens.get_token().await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Rejected { status: 401, ref message }
                if message == "AADSTS7000215: Invalid client secret provided."
        ));
    }

    #[tokio::test]
    async fn rejected_without_json_falls_back_to_status_line() {
        let mut server = Server::new_async().await;
        server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async().await;

        let tokens = provider(&server, Arc::new(SystemClock));
        let err = tokens.get_token().await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Rejected { status: 503, ref message } if message == "503 Service Unavailable"
        ));
    }

    #[tokio::test]
    async fn missing_access_token_is_invalid_response() {
        let mut server = Server::new_async().await;
        server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":3600}"#)
            .create_async().await;

        let tokens = provider(&server, Arc::new(SystemClock));
        let err = tokens.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn huge_expires_in_is_invalid_response() {
        let mut server = Server::new_async().await;
        server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":18446744073709551615,"access_token":"tok"}"#)
            .create_async().await;

        let tokens = provider(&server, Arc::new(SystemClock));
        let err = tokens.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(ref m) if m.contains("out of range")));
    }

    #[tokio::test]
    async fn lifetime_inside_margin_is_invalid_response() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":5,"access_token":"tok"}"#)
            .expect(1)
            .create_async().await;

        let tokens = provider(&server, Arc::new(SystemClock));
        let err = tokens.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(ref m) if m.contains("refresh margin")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn issued_token_outlasts_margin() {
        let mut server = Server::new_async().await;
        server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":61,"access_token":"tok"}"#)
            .create_async().await;

        let clock = Arc::new(ManualClock::new());
        let tokens = provider(&server, clock.clone());
        let token = tokens.get_token().await.unwrap();
        assert!(token.usable_at(clock.now()));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cache_empty() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_request"}"#)
            .expect(2)
            .create_async().await;

        let tokens = provider(&server, Arc::new(SystemClock));
        assert!(tokens.get_token().await.is_err());
        assert!(tokens.get_token().await.is_err());
        mock.assert_async().await;
    }

    #[test]
    fn debug_output_hides_token_value() {
        let token = AccessToken { value: "tok-secret".to_string(), expires_at: Instant::now() };
        assert!(!format!("{:?}", token).contains("tok-secret"));
    }
}
