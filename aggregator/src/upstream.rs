use crate::config::UpstreamConfig;
use crate::errors::{AggregatorError, Result};
use crate::metrics_defs::{UPSTREAM_DURATION, UPSTREAM_FAILURES};
use crate::template::ConcreteRequest;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use shared::{counter, histogram};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

/// Client for the upstream management API
///
/// The underlying connection pool is shared by every fan-out of every request.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(
            config.management_url.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// Builds the full upstream URL by combining the base URL with the route.
    /// The query string of the route is passed through as-is.
    pub fn url_for(&self, route: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Some((path, query)) = route.split_once('?') {
            url.set_path(path);
            url.set_query(Some(query));
        } else {
            url.set_path(route);
            url.set_query(None);
        }
        url
    }

    /// Sends one request with the bearer `token` and returns the body of a 2xx response.
    ///
    /// The timeout covers the whole exchange including reading the body. Any other
    /// status is logged with its body and reported as `UpstreamCallFailed`.
    pub async fn send(&self, request: &ConcreteRequest, token: &str) -> Result<Bytes> {
        let url = self.url_for(&request.route);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .bearer_auth(token);
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let start = Instant::now();
        let result = timeout(self.timeout, async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        })
        .await;
        histogram!(UPSTREAM_DURATION, "method" => request.method.to_string())
            .record(start.elapsed().as_secs_f64());

        let (status, body) = result
            // First map_err: the deadline elapsed
            .map_err(|_| {
                counter!(UPSTREAM_FAILURES, "reason" => "timeout").increment(1);
                tracing::error!(route = %request.route, "Upstream request timed out");
                AggregatorError::UpstreamTimeout(request.route.clone())
            })?
            // Second map_err: connection failures, network errors, etc.
            .map_err(|e| {
                counter!(UPSTREAM_FAILURES, "reason" => "transport").increment(1);
                tracing::error!(route = %request.route, error = %e, "Upstream request failed");
                AggregatorError::UpstreamCallFailed {
                    route: request.route.clone(),
                    status: e.status(),
                    reason: e.to_string(),
                }
            })?;

        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unknown status");
            counter!(UPSTREAM_FAILURES, "reason" => "status").increment(1);
            tracing::error!(
                route = %request.route,
                status = status.as_u16(),
                reason,
                body = %String::from_utf8_lossy(&body),
                "Upstream returned non-success status"
            );
            return Err(AggregatorError::UpstreamCallFailed {
                route: request.route.clone(),
                status: Some(status),
                reason: reason.to_string(),
            });
        }

        Ok(body)
    }
}
