//! Cost Query Aggregation Handler
//!
//! Runs the caller's cost query once per scope and merges the tabular results.
//!
//! - **Method**: `POST` (default route `/api/cost`)
//! - **`scope`** (required): comma-separated scopes such as
//!   `/subscriptions/1/resourceGroups/g`, each optionally single-quoted
//! - **Body** (required): the cost query payload, forwarded unchanged to every scope

use crate::api::params::required_list;
use crate::errors::{AggregatorError, Result};
use crate::handler::{Handler, SplitRequest};
use crate::merger::ResultMerger;
use crate::template::{ConcreteRequest, ParameterBinding};
use hyper::Request;
use hyper::body::Bytes;

pub const SCOPE_PARAM: &str = "scope";

pub struct CostQueryHandler {
    api_version: String,
}

impl CostQueryHandler {
    pub fn new(api_version: String) -> Self {
        Self { api_version }
    }

    fn query_route(&self, scope: &str) -> String {
        format!(
            "/{}/providers/Microsoft.CostManagement/query?api-version={}",
            scope.trim_matches('/'),
            self.api_version
        )
    }
}

impl Handler for CostQueryHandler {
    fn name(&self) -> &'static str {
        "cost_query"
    }

    fn split_request(&self, request: &Request<Bytes>) -> Result<SplitRequest> {
        let scopes = required_list(request, SCOPE_PARAM)?;

        let body = request.body();
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AggregatorError::InvalidInput(
                "missing cost query body".to_string(),
            ));
        }
        serde_json::from_slice::<serde_json::Value>(body).map_err(|e| {
            AggregatorError::InvalidInput(format!("cost query body is not valid JSON: {e}"))
        })?;

        let requests = scopes
            .iter()
            .map(|scope| {
                ConcreteRequest::post(
                    self.query_route(scope),
                    body.clone(),
                    ParameterBinding::from_iter([(SCOPE_PARAM, scope.as_str())]),
                )
            })
            .collect();

        Ok(SplitRequest {
            requests,
            merger: ResultMerger::ColumnUnion {
                scope: scopes[0].clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    fn request(query: &str, body: &'static str) -> Request<Bytes> {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/cost?{query}"))
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    fn handler() -> CostQueryHandler {
        CostQueryHandler::new("2021-10-01".to_string())
    }

    #[test]
    fn test_one_request_per_scope() {
        let payload = r#"{"type":"ActualCost","timeframe":"MonthToDate"}"#;
        let req = request(
            "scope=/subscriptions/s1/resourceGroups/rg1,%20'/subscriptions/s2/'",
            payload,
        );

        let split = handler().split_request(&req).unwrap();

        let routes: Vec<&str> = split.requests.iter().map(|r| r.route.as_str()).collect();
        assert_eq!(
            routes,
            vec![
                "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.CostManagement/query?api-version=2021-10-01",
                "/subscriptions/s2/providers/Microsoft.CostManagement/query?api-version=2021-10-01",
            ]
        );
        for request in &split.requests {
            assert_eq!(request.method, Method::POST);
            assert_eq!(request.body.as_deref(), Some(payload.as_bytes()));
        }
        assert_eq!(
            split.requests[1].binding.get("scope"),
            Some("/subscriptions/s2/")
        );
        assert_eq!(
            split.merger,
            ResultMerger::ColumnUnion {
                scope: "/subscriptions/s1/resourceGroups/rg1".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_input() {
        let cases = [
            request("", r#"{"type":"ActualCost"}"#),
            request("scope=", r#"{"type":"ActualCost"}"#),
            request("scope=/subscriptions/s1", ""),
            request("scope=/subscriptions/s1", "  \n"),
            request("scope=/subscriptions/s1", "{not json"),
        ];

        for req in cases {
            let err = handler().split_request(&req).unwrap_err();
            assert!(matches!(err, AggregatorError::InvalidInput(_)), "{err:?}");
        }
    }
}
