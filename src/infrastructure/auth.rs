//! Process-wide access token service and the token refresh collaborator
//!
//! Every surface reads the bearer token through one `AuthSession` so that simultaneously
//! open lists never hold diverging copies. The session is a `watch` channel: `get` reads the
//! current token, `set` replaces it, `subscribe` observes replacements.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Error, Result};

lazy_static! {
    static ref GLOBAL_SESSION: AuthSession = AuthSession::new();
}

/// A bearer token and, when known, the instant it stops being accepted
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: Arc<SecretString>,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: Arc::new(SecretString::from(token.into())),
            expires_at,
        }
    }

    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token expires within `lead` of `now`. Tokens without a known expiry are
    /// treated as fresh; the server reports them through `auth_error` instead.
    pub fn is_expiring_within(&self, lead: Duration, now: DateTime<Utc>) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        let lead = chrono::Duration::from_std(lead).unwrap_or(chrono::Duration::MAX);
        expires_at <= now.checked_add_signed(lead).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    tx: Arc<watch::Sender<Option<AccessToken>>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The session shared by the whole process
    pub fn global() -> Self {
        GLOBAL_SESSION.clone()
    }

    pub fn get(&self) -> Option<AccessToken> {
        self.tx.borrow().clone()
    }

    pub fn set(&self, token: AccessToken) {
        self.tx.send_replace(Some(token));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AccessToken>> {
        self.tx.subscribe()
    }
}

/// Exchanges the long-lived credential for a new access token
pub trait TokenRefresher: Send + Sync + 'static {
    /// Obtain a new access token
    fn refresh(&self) -> impl Future<Output = Result<AccessToken>> + Send;
}

/// Return a token that is not about to expire, refreshing first when needed.
///
/// A refresh failure is reported as `Error::SessionLost`.
pub async fn ensure_fresh<R: TokenRefresher>(
    auth: &AuthSession,
    refresher: &R,
    lead: Duration,
) -> Result<AccessToken> {
    if let Some(token) = auth.get() {
        if !token.is_expiring_within(lead, Utc::now()) {
            return Ok(token);
        }
        tracing::debug!("Access token expires within {lead:?}, refreshing");
    } else {
        tracing::debug!("No access token, refreshing");
    }
    refresh(auth, refresher).await
}

/// Refresh unconditionally. On failure the session's token is cleared.
pub async fn refresh<R: TokenRefresher>(
    auth: &AuthSession,
    refresher: &R,
) -> Result<AccessToken> {
    match refresher.refresh().await {
        Ok(token) => {
            auth.set(token.clone());
            Ok(token)
        }
        Err(e) => {
            tracing::warn!("Token refresh failed: {e}");
            // Subscribers see the session end
            auth.clear();
            match e {
                Error::SessionLost(_) => Err(e),
                other => Err(Error::SessionLost(other.to_string())),
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Calls `POST {api_url}/auth/refresh`
#[derive(Debug)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: String,
    refresh_token: Option<SecretString>,
}

impl HttpTokenRefresher {
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        refresh_token: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            url: format!("{}/auth/refresh", api_url.trim_end_matches('/')),
            refresh_token,
        }
    }
}

impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> Result<AccessToken> {
        let body = RefreshRequest {
            refresh_token: self.refresh_token.as_ref().map(|t| t.expose_secret()),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::SessionLost(e.to_string()))?;
        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| Error::SessionLost(e.to_string()))?;
        let expires_at = refreshed
            .expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
        Ok(AccessToken::new(refreshed.access_token, expires_at))
    }
}
