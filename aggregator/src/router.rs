use crate::api::arm::ArmAggregateHandler;
use crate::api::cost::CostQueryHandler;
use crate::config::{HandlerAction, Route, UpstreamConfig};
use crate::handler::Handler;
use hyper::Request;
use std::sync::Arc;

/// Router that matches incoming requests against configured routes
#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<(Route, Arc<dyn Handler>)>>,
}

impl Router {
    /// Creates a router with one handler instance per configured action
    pub fn new(routes: Vec<Route>, upstream: &UpstreamConfig) -> Self {
        let arm: Arc<dyn Handler> = Arc::new(ArmAggregateHandler);
        let cost: Arc<dyn Handler> = Arc::new(CostQueryHandler::new(
            upstream.cost_query_api_version.clone(),
        ));

        let routes = routes
            .into_iter()
            .map(|route| {
                let handler = match route.action {
                    HandlerAction::ArmAggregate => arm.clone(),
                    HandlerAction::CostQuery => cost.clone(),
                };
                (route, handler)
            })
            .collect();

        Self {
            routes: Arc::new(routes),
        }
    }

    /// Finds the handler of the first route that matches the incoming request
    pub fn find_handler<B>(&self, req: &Request<B>) -> Option<Arc<dyn Handler>> {
        let handler = self
            .routes
            .iter()
            .find(|(route, _)| self.matches_route(req, route))
            .map(|(_, handler)| handler.clone());

        match &handler {
            Some(handler) => tracing::debug!(handler = handler.name(), "Matched route"),
            None => tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                "No route matched"
            ),
        }
        handler
    }

    /// Checks if a request matches a route's criteria
    fn matches_route<B>(&self, req: &Request<B>, route: &Route) -> bool {
        // Match host if specified
        if let Some(expected_host) = &route.r#match.host {
            let req_host = req
                .headers()
                .get(hyper::header::HOST)
                .and_then(|h| h.to_str().ok())
                .or_else(|| req.uri().host());

            match req_host {
                Some(host) => {
                    // Strip port if present for comparison
                    let host_without_port = host.split(':').next().unwrap_or(host);
                    if !host_without_port.eq_ignore_ascii_case(expected_host) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        // Match path if specified
        if let Some(expected_path) = &route.r#match.path
            && req.uri().path() != expected_path
        {
            return false;
        }

        // Match method if specified
        if let Some(expected_method) = &route.r#match.method
            && expected_method != req.method()
        {
            return false;
        }

        true
    }
}
