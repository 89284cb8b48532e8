//! Bearer credentials for the upstream management API
//!
//! A [`CredentialProvider`] owns the cached token for the lifetime of the service and
//! hands it out once per inbound request. The cache check and the refresh happen
//! under one async mutex, so a burst of requests arriving with an expired token
//! triggers exactly one refresh.

use crate::config::CredentialsConfig;
use crate::metrics_defs::TOKEN_REFRESHES;
use async_trait::async_trait;
use hyper::StatusCode;
use serde::Deserialize;
use shared::counter;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use url::Url;

/// Tokens are refreshed once less than this much validity is left.
const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);
/// Upper bound for one token fetch. Callers queued behind a refresh wait at most this long.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const IDENTITY_ENDPOINT_ENV: &str = "IDENTITY_ENDPOINT";
const IDENTITY_HEADER_ENV: &str = "IDENTITY_HEADER";
const MANAGED_IDENTITY_API_VERSION: &str = "2019-08-01";

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("token request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    EndpointError { status: StatusCode, body: String },
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid token endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("invalid token expiry: {0}")]
    InvalidExpiry(String),
    #[error("token request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// `None` for tokens that never expire.
    pub expires_at: Option<SystemTime>,
}

impl AccessToken {
    fn is_fresh(&self, margin: Duration, now: SystemTime) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => now + margin < expires_at,
        }
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError>;
}

/// A fixed token taken from configuration.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: None,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnixSeconds {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
struct ManagedIdentityToken {
    access_token: String,
    expires_on: UnixSeconds,
}

/// Fetches tokens from the hosting platform's managed identity endpoint.
pub struct ManagedIdentitySource {
    client: reqwest::Client,
    endpoint: Url,
    secret: String,
    resource: String,
}

impl ManagedIdentitySource {
    pub fn new(endpoint: Url, secret: String, resource: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            secret,
            resource,
        }
    }

    /// Reads the endpoint and secret the platform injects into the environment.
    /// An explicitly configured endpoint takes precedence.
    pub fn from_env(endpoint: Option<Url>, resource: String) -> Result<Self, CredentialError> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => {
                let raw = std::env::var(IDENTITY_ENDPOINT_ENV)
                    .map_err(|_| CredentialError::MissingEnv(IDENTITY_ENDPOINT_ENV))?;
                Url::parse(&raw)?
            }
        };
        let secret = std::env::var(IDENTITY_HEADER_ENV)
            .map_err(|_| CredentialError::MissingEnv(IDENTITY_HEADER_ENV))?;

        Ok(Self::new(endpoint, secret, resource))
    }
}

#[async_trait]
impl TokenSource for ManagedIdentitySource {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("resource", self.resource.as_str()),
                ("api-version", MANAGED_IDENTITY_API_VERSION),
            ])
            .header("X-IDENTITY-HEADER", &self.secret)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::EndpointError { status, body });
        }

        let token = response.json::<ManagedIdentityToken>().await?;
        let expires_on = match token.expires_on {
            UnixSeconds::Number(secs) => secs,
            UnixSeconds::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| CredentialError::InvalidExpiry(text))?,
        };

        Ok(AccessToken {
            token: token.access_token,
            expires_at: Some(UNIX_EPOCH + Duration::from_secs(expires_on)),
        })
    }
}

/// Caches the token of a [`TokenSource`] until it is close to expiry.
pub struct CredentialProvider {
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<AccessToken>>,
    refresh_margin: Duration,
    fetch_timeout: Duration,
}

impl CredentialProvider {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_refresh_margin(mut self, refresh_margin: Duration) -> Self {
        self.refresh_margin = refresh_margin;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn from_config(config: &CredentialsConfig) -> Result<Self, CredentialError> {
        let source: Arc<dyn TokenSource> = match config {
            CredentialsConfig::Static { token } => Arc::new(StaticTokenSource::new(token.clone())),
            CredentialsConfig::ManagedIdentity { endpoint, resource } => Arc::new(
                ManagedIdentitySource::from_env(endpoint.clone(), resource.clone())?,
            ),
        };
        Ok(Self::new(source))
    }

    pub async fn get_token(&self) -> Result<AccessToken, CredentialError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.is_fresh(self.refresh_margin, SystemTime::now()))
        {
            return Ok(token.clone());
        }

        let token = tokio::time::timeout(self.fetch_timeout, self.source.fetch_token())
            .await
            .map_err(|_| {
                tracing::error!(timeout = ?self.fetch_timeout, "Token request timed out");
                CredentialError::Timeout(self.fetch_timeout)
            })??;
        counter!(TOKEN_REFRESHES).increment(1);
        tracing::info!(expires_at = ?token.expires_at, "Refreshed upstream access token");

        *cached = Some(token.clone());
        Ok(token)
    }
}
