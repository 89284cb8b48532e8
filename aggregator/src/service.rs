use crate::errors::AggregatorError;
use crate::handler::{Aggregator, error_response};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::router::Router;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use shared::http::{ResponseBody, make_text_response};
use shared::{gauge, histogram};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Counts one request in the inflight gauge until dropped, including when the
/// connection goes away and the request future is dropped mid-await.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

/// Inbound HTTP service: routes each request to its handler and runs the aggregation
#[derive(Clone)]
pub struct AggregatorService {
    router: Router,
    aggregator: Arc<Aggregator>,
}

impl AggregatorService {
    pub fn new(router: Router, aggregator: Arc<Aggregator>) -> Self {
        Self { router, aggregator }
    }
}

impl<B> Service<Request<B>> for AggregatorService
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display,
{
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let handler = self.router.find_handler(&req);
        let aggregator = self.aggregator.clone();

        Box::pin(async move {
            let Some(handler) = handler else {
                return Ok(make_text_response(StatusCode::NOT_FOUND, "No route matched"));
            };

            let start = Instant::now();
            let inflight = InflightGuard::new();

            let (parts, body) = req.into_parts();
            let body = body
                .collect()
                .await
                .map(|collected| collected.to_bytes())
                .map_err(|e| AggregatorError::RequestBodyError(e.to_string()));

            let response = match body {
                Ok(body) => {
                    aggregator
                        .execute(handler.as_ref(), Request::from_parts(parts, body))
                        .await
                }
                Err(e) => error_response(handler.name(), &e),
            };

            drop(inflight);
            histogram!(
                REQUEST_DURATION,
                "handler" => handler.name(),
                "status" => response.status().as_str().to_string()
            )
            .record(start.elapsed().as_secs_f64());

            Ok(response)
        })
    }
}
