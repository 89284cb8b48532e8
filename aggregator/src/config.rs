use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("max_concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("http_timeout_secs must be at least 1")]
    InvalidTimeout,

    #[error("Empty cost query api version")]
    EmptyApiVersion,

    #[error("Empty static token")]
    EmptyToken,

    #[error("No routes configured")]
    NoRoutes,
}

/// HTTP methods supported for route matching
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl PartialEq<hyper::Method> for HttpMethod {
    fn eq(&self, other: &hyper::Method) -> bool {
        let method = match self {
            HttpMethod::Get => hyper::Method::GET,
            HttpMethod::Post => hyper::Method::POST,
            HttpMethod::Put => hyper::Method::PUT,
            HttpMethod::Delete => hyper::Method::DELETE,
        };
        &method == other
    }
}

/// Handler invoked for a matched route
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandlerAction {
    /// Fan a route template out over a list of resource ids, item-union merge.
    ArmAggregate,
    /// Run one cost query per scope, column-union merge.
    CostQuery,
}

/// Aggregator configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    pub credentials: CredentialsConfig,
    #[serde(default = "default_routes")]
    pub routes: Vec<Route>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.upstream.validate()?;
        self.fanout.validate()?;

        if let CredentialsConfig::Static { token } = &self.credentials
            && token.is_empty()
        {
            return Err(ValidationError::EmptyToken);
        }

        if self.routes.is_empty() {
            return Err(ValidationError::NoRoutes);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Upstream management API
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL every concrete route is appended to
    #[serde(default = "UpstreamConfig::default_management_url")]
    pub management_url: Url,
    /// `api-version` sent with every cost query
    #[serde(default = "UpstreamConfig::default_cost_query_api_version")]
    pub cost_query_api_version: String,
    /// Timeout for a single upstream call, including reading the body
    #[serde(default = "UpstreamConfig::default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl UpstreamConfig {
    fn default_management_url() -> Url {
        Url::parse("https://management.azure.com").expect("static url is valid")
    }

    fn default_cost_query_api_version() -> String {
        "2021-10-01".to_string()
    }

    fn default_http_timeout_secs() -> u64 {
        30
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cost_query_api_version.trim().is_empty() {
            return Err(ValidationError::EmptyApiVersion);
        }
        if self.http_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            management_url: Self::default_management_url(),
            cost_query_api_version: Self::default_cost_query_api_version(),
            http_timeout_secs: Self::default_http_timeout_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FanoutConfig {
    /// Upper bound of upstream calls in flight for one inbound request
    #[serde(default = "FanoutConfig::default_max_concurrency")]
    pub max_concurrency: usize,
}

impl FanoutConfig {
    fn default_max_concurrency() -> usize {
        16
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrency == 0 {
            return Err(ValidationError::InvalidConcurrency);
        }
        Ok(())
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Self::default_max_concurrency(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsConfig {
    Static {
        token: String,
    },
    ManagedIdentity {
        /// Overrides the endpoint injected by the platform
        #[serde(default)]
        endpoint: Option<Url>,
        #[serde(default = "default_token_resource")]
        resource: String,
    },
}

fn default_token_resource() -> String {
    "https://management.azure.com/".to_string()
}

/// Routing rule configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Route {
    /// Conditions for matching incoming requests
    pub r#match: Match,
    /// Handler to run when the match conditions are met
    pub action: HandlerAction,
}

/// Request matching criteria
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Match {
    /// Optional hostname to match
    pub host: Option<String>,
    /// Optional path to match (e.g., "/api/arm")
    pub path: Option<String>,
    /// Optional HTTP method to match
    pub method: Option<HttpMethod>,
}

fn default_routes() -> Vec<Route> {
    vec![
        Route {
            r#match: Match {
                host: None,
                path: Some("/api/arm".to_string()),
                method: Some(HttpMethod::Get),
            },
            action: HandlerAction::ArmAggregate,
        },
        Route {
            r#match: Match {
                host: None,
                path: Some("/api/cost".to_string()),
                method: Some(HttpMethod::Post),
            },
            action: HandlerAction::CostQuery,
        },
    ]
}
