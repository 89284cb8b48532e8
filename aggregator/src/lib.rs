pub mod api;
pub mod config;
pub mod credential;
pub mod errors;
pub mod executor;
pub mod handler;
pub mod merger;
pub mod metrics_defs;
pub mod resource_id;
pub mod router;
pub mod service;
pub mod template;
pub mod upstream;

#[cfg(test)]
mod testutils;

use crate::config::Config;
use crate::credential::CredentialProvider;
use crate::errors::AggregatorError;
use crate::executor::FanOutExecutor;
use crate::handler::Aggregator;
use crate::router::Router;
use crate::service::AggregatorService;
use crate::upstream::UpstreamClient;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Builds the inbound service from configuration.
pub fn build_service(config: &Config) -> Result<AggregatorService, AggregatorError> {
    let credentials = Arc::new(CredentialProvider::from_config(&config.credentials)?);
    let executor = FanOutExecutor::new(
        UpstreamClient::from_config(&config.upstream),
        config.fanout.max_concurrency,
    );
    let router = Router::new(config.routes.clone(), &config.upstream);

    Ok(AggregatorService::new(
        router,
        Arc::new(Aggregator::new(credentials, executor)),
    ))
}

pub async fn run(config: Config) -> Result<(), AggregatorError> {
    let service = build_service(&config)?;
    tracing::info!(
        upstream = %config.upstream.management_url,
        max_concurrency = config.fanout.max_concurrency,
        routes = config.routes.len(),
        "Starting aggregation gateway"
    );

    let gateway_task =
        run_http_service::<_, AggregatorError>(&config.listener.host, config.listener.port, service);
    let admin_task = run_http_service::<_, AggregatorError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(|| true),
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialsConfig, FanoutConfig, Listener, UpstreamConfig};
    use crate::testutils::{MockReply, MockUpstream};
    use hyper::StatusCode;
    use serde_json::{Value as JsonValue, json};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use url::form_urlencoded;

    fn test_config(upstream: &MockUpstream) -> Config {
        let yaml = format!(
            r#"
listener: {{host: 127.0.0.1, port: 3000}}
admin_listener: {{host: 127.0.0.1, port: 3001}}
upstream:
    management_url: "{}"
    http_timeout_secs: 5
credentials: {{type: static, token: test-token}}
"#,
            upstream.base_url()
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    /// Serves the gateway on an ephemeral port and returns its address.
    async fn spawn_gateway(config: &Config) -> SocketAddr {
        let service = build_service(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(shared::http::serve(listener, service));
        addr
    }

    fn query(params: &[(&str, &str)]) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish()
    }

    #[tokio::test]
    async fn test_arm_fanout_end_to_end() {
        let upstream = MockUpstream::spawn(|req| {
            let site = req.path.rsplit('/').next().unwrap_or_default().to_string();
            MockReply::json(
                StatusCode::OK,
                json!({"name": site, "location": "westus"}).to_string(),
            )
        })
        .await;
        let addr = spawn_gateway(&test_config(&upstream)).await;

        let url = format!(
            "http://{addr}/api/arm?{}",
            query(&[
                (
                    "armRoute",
                    "/subscriptions/$subscriptions/resourceGroups/$resourceGroups/providers/Microsoft.Web/sites/$sites?api-version=2022-03-01",
                ),
                (
                    "resourceIds",
                    "/subscriptions/1/resourceGroups/g/providers/Microsoft.Web/sites/siteA,'/subscriptions/1/resourceGroups/g/providers/Microsoft.Web/sites/siteB'",
                ),
            ])
        );
        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );

        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({"value": [
                {
                    "name": "siteA",
                    "location": "westus",
                    "gateway": {"subscriptions": "1", "resourceGroups": "g", "sites": "siteA"}
                },
                {
                    "name": "siteB",
                    "location": "westus",
                    "gateway": {"subscriptions": "1", "resourceGroups": "g", "sites": "siteB"}
                }
            ]})
        );

        let mut paths: Vec<String> = upstream.requests().into_iter().map(|r| r.path).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "/subscriptions/1/resourceGroups/g/providers/Microsoft.Web/sites/siteA",
                "/subscriptions/1/resourceGroups/g/providers/Microsoft.Web/sites/siteB",
            ]
        );
        for request in upstream.requests() {
            assert_eq!(request.query.as_deref(), Some("api-version=2022-03-01"));
            assert_eq!(
                request.header("authorization").as_deref(),
                Some("Bearer test-token")
            );
        }
    }

    #[tokio::test]
    async fn test_cost_query_end_to_end() {
        let upstream = MockUpstream::spawn(|req| {
            let scope = req
                .path
                .trim_end_matches("/providers/Microsoft.CostManagement/query")
                .to_string();
            let rows = if scope.contains("rg1") {
                json!([[1.0, "USD"], [2.0, "USD"]])
            } else {
                json!([[3.0, "USD"], [4.0, "USD"], [5.0, "USD"]])
            };
            MockReply::json(
                StatusCode::OK,
                json!({
                    "id": format!("{scope}/providers/Microsoft.CostManagement/query/x"),
                    "name": "x",
                    "type": "Microsoft.CostManagement/query",
                    "properties": {
                        "columns": [
                            {"name": "PreTaxCost", "type": "Number"},
                            {"name": "Currency", "type": "String"}
                        ],
                        "rows": rows
                    }
                })
                .to_string(),
            )
        })
        .await;
        let addr = spawn_gateway(&test_config(&upstream)).await;

        let url = format!(
            "http://{addr}/api/cost?{}",
            query(&[(
                "scope",
                "/subscriptions/s1/resourceGroups/rg1,/subscriptions/s2/resourceGroups/rg2"
            )])
        );
        let payload = r#"{"type":"ActualCost","timeframe":"MonthToDate"}"#;
        let response = reqwest::Client::new()
            .post(url)
            .body(payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: JsonValue = response.json().await.unwrap();
        let name = body["name"].as_str().unwrap().to_string();
        assert_eq!(
            body["id"],
            format!(
                "/subscriptions/LIST/resourceGroups/LIST/providers/Microsoft.CostManagement/query/{name}"
            )
        );
        assert_eq!(body["type"], "Microsoft.CostManagement/query");
        assert_eq!(body["properties"]["columns"].as_array().unwrap().len(), 4);

        let rows = body["properties"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], json!([1.0, "USD", "s1", "rg1"]));
        assert_eq!(rows[2], json!([3.0, "USD", "s2", "rg2"]));

        let requests = upstream.requests();
        assert_eq!(requests.len(), 2);
        for request in requests {
            assert_eq!(request.body.as_ref(), payload.as_bytes());
            assert_eq!(request.query.as_deref(), Some("api-version=2021-10-01"));
        }
    }

    #[tokio::test]
    async fn test_gateway_errors() {
        let upstream =
            MockUpstream::spawn(|_| MockReply::json(StatusCode::NOT_FOUND, r#"{"error":"x"}"#))
                .await;
        let addr = spawn_gateway(&test_config(&upstream)).await;
        let client = reqwest::Client::new();

        // Unknown route
        let response = client
            .get(format!("http://{addr}/api/unknown"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        // Missing parameter, no upstream call
        let response = client
            .get(format!("http://{addr}/api/arm?armRoute=/subscriptions/$subscriptions"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(response.text().await.unwrap().contains("resourceIds"));
        assert!(upstream.requests().is_empty());

        // Upstream failure
        let url = format!(
            "http://{addr}/api/arm?{}",
            query(&[
                ("armRoute", "/subscriptions/$subscriptions"),
                ("resourceIds", "/subscriptions/1"),
            ])
        );
        let response = client.get(url).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(response.text().await.unwrap(), "Bad Gateway\n");
    }

    #[test]
    fn test_build_service_requires_identity_environment() {
        let config = Config {
            listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            upstream: UpstreamConfig::default(),
            fanout: FanoutConfig::default(),
            credentials: CredentialsConfig::ManagedIdentity {
                endpoint: Some(url::Url::parse("http://127.0.0.1:1/token").unwrap()),
                resource: "https://management.azure.com/".to_string(),
            },
            routes: Vec::new(),
        };

        // IDENTITY_HEADER is never set in the test environment
        if std::env::var("IDENTITY_HEADER").is_err() {
            assert!(matches!(
                build_service(&config),
                Err(AggregatorError::Credential(_))
            ));
        }
    }
}
