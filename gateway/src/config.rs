use aggregator::config::Config as AggregatorConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
    pub aggregator: AggregatorConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator::config::{CredentialsConfig, HandlerAction};
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            logging:
                sentry_dsn: "https://public@sentry.example.com/1"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            aggregator:
                listener:
                    host: 0.0.0.0
                    port: 3000
                admin_listener:
                    host: 127.0.0.1
                    port: 3001
                upstream:
                    cost_query_api_version: "2023-03-01"
                fanout:
                    max_concurrency: 8
                credentials:
                    type: managed_identity
                    resource: https://management.azure.com/
                routes:
                    - match:
                        path: /api/arm
                        method: GET
                      action: arm_aggregate
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(
            config.logging.expect("logging config").sentry_dsn,
            "https://public@sentry.example.com/1"
        );
        assert_eq!(config.metrics.expect("metrics config").statsd_port, 8125);

        let aggregator = config.aggregator;
        assert!(aggregator.validate().is_ok());
        assert_eq!(aggregator.listener.port, 3000);
        assert_eq!(aggregator.upstream.cost_query_api_version, "2023-03-01");
        assert_eq!(aggregator.fanout.max_concurrency, 8);
        assert!(matches!(
            aggregator.credentials,
            CredentialsConfig::ManagedIdentity { endpoint: None, .. }
        ));
        assert_eq!(aggregator.routes.len(), 1);
        assert_eq!(aggregator.routes[0].action, HandlerAction::ArmAggregate);
    }

    #[test]
    fn minimal_config() {
        let yaml = r#"
            aggregator:
                listener: {host: 0.0.0.0, port: 3000}
                admin_listener: {host: 127.0.0.1, port: 3001}
                credentials: {type: static, token: abc}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.logging.is_none());
        assert!(config.metrics.is_none());
        assert_eq!(config.aggregator.routes.len(), 2);
    }

    #[test]
    fn config_errors() {
        let missing = Config::from_file(std::path::Path::new("/nonexistent/gateway.yaml"));
        assert!(matches!(missing, Err(ConfigError::LoadError(_))));

        let tmp = write_tmp_file("aggregator: {listener: 3}");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
