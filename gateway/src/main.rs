mod config;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "gateway", about = "Fan-out aggregation gateway for the resource management API")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the gateway
    Run(ConfigArgs),
    /// Load and validate a config file, then exit
    Validate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid config: {0}")]
    Validation(#[from] aggregator::config::ValidationError),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Aggregator(#[from] aggregator::errors::AggregatorError),
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Validate(args) => {
            load_config(&args)?;
            println!("{}: ok", args.config.display());
            Ok(())
        }
        CliCommand::Run(args) => {
            let config = load_config(&args)?;
            let _sentry = init_logging(config.logging.as_ref());
            if let Some(metrics_config) = &config.metrics {
                init_statsd(metrics_config)?;
            }

            tracing::info!(config = %args.config.display(), "Starting gateway");
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(aggregator::run(config.aggregator))?;
            Ok(())
        }
    }
}

fn load_config(args: &ConfigArgs) -> Result<Config, CliError> {
    let config = Config::from_file(&args.config)?;
    config.aggregator.validate()?;
    Ok(config)
}

/// Installs the tracing subscriber. Events are also sent to Sentry when a DSN is configured;
/// the returned guard flushes pending events on drop.
fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = config.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_statsd(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("gateway"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(aggregator::metrics_defs::ALL_METRICS);
    Ok(())
}
