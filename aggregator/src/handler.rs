use crate::credential::CredentialProvider;
use crate::errors::{AggregatorError, Result};
use crate::executor::FanOutExecutor;
use crate::merger::ResultMerger;
use crate::metrics_defs::FANOUT_SIZE;
use crate::template::ConcreteRequest;
use hyper::body::Bytes;
use hyper::{Request, Response};
use shared::histogram;
use shared::http::{ResponseBody, make_error_response, make_json_response, make_text_response};
use std::sync::Arc;

/// The upstream calls an inbound request expands into, and how to merge their responses
#[derive(Debug)]
pub struct SplitRequest {
    pub requests: Vec<ConcreteRequest>,
    pub merger: ResultMerger,
}

/// Handler for endpoints that fan a request out and merge the results
///
/// The handler implements endpoint-specific logic:
/// - Which inbound parameters are required
/// - How to expand them into upstream requests
/// - Which merge strategy applies to the responses
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validates the inbound request and expands it into upstream requests.
    ///
    /// Runs before any upstream call or token fetch, so invalid input never
    /// reaches the upstream.
    fn split_request(&self, request: &Request<Bytes>) -> Result<SplitRequest>;
}

/// Runs a handler: split, fan out with one token, merge.
pub struct Aggregator {
    credentials: Arc<CredentialProvider>,
    executor: FanOutExecutor,
}

impl Aggregator {
    pub fn new(credentials: Arc<CredentialProvider>, executor: FanOutExecutor) -> Self {
        Self {
            credentials,
            executor,
        }
    }

    pub async fn execute(
        &self,
        handler: &dyn Handler,
        request: Request<Bytes>,
    ) -> Response<ResponseBody> {
        match self.aggregate(handler, request).await {
            Ok(body) => make_json_response(body),
            Err(e) => error_response(handler.name(), &e),
        }
    }

    async fn aggregate(&self, handler: &dyn Handler, request: Request<Bytes>) -> Result<Bytes> {
        let SplitRequest { requests, merger } = handler.split_request(&request)?;
        histogram!(FANOUT_SIZE, "handler" => handler.name()).record(requests.len() as f64);
        tracing::debug!(
            handler = handler.name(),
            merger = merger.name(),
            fanout = requests.len(),
            "Expanded request"
        );

        let token = self.credentials.get_token().await?;
        let responses = self.executor.execute(requests, &token.token).await?;

        merger.merge(responses)?.to_bytes()
    }
}

/// Client-facing response for a failed request. Only input errors carry detail.
pub fn error_response(handler: &str, error: &AggregatorError) -> Response<ResponseBody> {
    let status = error.status_code();
    match error.client_detail() {
        Some(detail) => {
            tracing::info!(handler, error = %error, "Rejected request");
            make_text_response(status, &detail)
        }
        None => {
            tracing::error!(handler, error = %error, status = status.as_u16(), "Request failed");
            make_error_response(status)
        }
    }
}
