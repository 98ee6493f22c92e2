//! Command-line interface for knmap.
//!
//! `knmap serve` runs the HTTP agent, `knmap map` prints a single map and
//! `knmap check-config` validates the configuration.

use crate::api;
use crate::core::config::ConfigBuilder;
use crate::core::{Config, KnmapError, Result, TimeWindow};
use crate::jaeger::{FileTraceSource, JaegerClient};
use crate::registry;
use crate::service_map::{ServiceMapper, TraceSource};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Service dependency maps for Knative workloads, from Jaeger traces
#[derive(Parser, Debug)]
#[command(name = "knmap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/knmap/config.yaml)
    #[arg(short, long, env = "KNMAP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the Jaeger query service
    #[arg(long, env = "KNMAP_JAEGER_URL", global = true)]
    pub jaeger_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, env = "KNMAP_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP agent
    Serve {
        /// Listen port
        #[arg(short, long, env = "KNMAP_PORT")]
        port: Option<u16>,
    },
    /// Compute one service map and print it as JSON
    Map {
        /// Window start, microseconds since the epoch
        #[arg(long, requires = "to")]
        from: Option<i64>,

        /// Window end, microseconds since the epoch
        #[arg(long, requires = "from")]
        to: Option<i64>,

        /// Read traces from a saved Jaeger response instead of querying Jaeger
        #[arg(long)]
        traces: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Validate configuration and exit
    CheckConfig,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|path| path.exists()),
        };

        if let Some(path) = config_path {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                KnmapError::config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            builder = builder.from_yaml(&content)?;
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(url) = &self.jaeger_url {
            builder = builder.jaeger_url(url.clone());
        }
        if let Command::Serve { port: Some(port) } = &self.command {
            builder = builder.port(*port);
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if self.debug { "debug" } else { config.logging.level.as_str() };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| KnmapError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("knmap").join("config.yaml"))
}

/// Builds the mapper for a configuration, optionally reading traces from a file.
pub fn build_mapper(config: &Config, traces: Option<PathBuf>) -> Result<ServiceMapper> {
    let source: Arc<dyn TraceSource> = match traces {
        Some(path) => Arc::new(FileTraceSource::new(path)),
        None => Arc::new(JaegerClient::new(&config.jaeger)?),
    };
    Ok(ServiceMapper::new(registry::from_config(&config.registry), source))
}

/// Execute the knmap command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    match cli.command {
        Command::CheckConfig => {
            println!("Configuration is valid!");
            println!("  Jaeger URL: {}", config.jaeger.url);
            println!("  Fetch concurrency: {}", config.jaeger.concurrency);
            match &config.registry.file {
                Some(path) => println!("  Registry file: {}", path.display()),
                None => println!("  Registered services: {}", config.registry.services.len()),
            }
            println!("  Listen address: {}:{}", config.server.bind_address, config.server.port);
            Ok(())
        },
        Command::Map {
            from,
            to,
            traces,
            pretty,
        } => {
            let window = match (from, to) {
                (Some(from), Some(to)) => TimeWindow::from_micros(from, to)?,
                _ => TimeWindow::last(config.server.default_window)?,
            };
            let mapper = build_mapper(&config, traces)?;
            let map = mapper.build(window).await?;

            let json = if pretty {
                serde_json::to_string_pretty(&map)?
            } else {
                serde_json::to_string(&map)?
            };
            println!("{}", json);
            Ok(())
        },
        Command::Serve { .. } => {
            tracing::info!(jaeger = %config.jaeger.url, "Starting knmap agent");
            let mapper = Arc::new(build_mapper(&config, None)?);
            api::serve(mapper, &config.server, shutdown_signal()).await?;
            tracing::info!("knmap agent stopped");
            Ok(())
        },
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_map_command() {
        let cli = Cli::try_parse_from([
            "knmap",
            "--jaeger-url",
            "http://jaeger:16686",
            "map",
            "--from",
            "100",
            "--to",
            "200",
            "--pretty",
        ])
        .unwrap();

        assert_eq!(cli.jaeger_url.as_deref(), Some("http://jaeger:16686"));
        match cli.command {
            Command::Map { from, to, pretty, traces } => {
                assert_eq!(from, Some(100));
                assert_eq!(to, Some(200));
                assert!(pretty);
                assert!(traces.is_none());
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_map_requires_both_bounds() {
        assert!(Cli::try_parse_from(["knmap", "map", "--from", "100"]).is_err());
    }

    #[tokio::test]
    async fn test_cli_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "jaeger:\n  url: http://from-file:16686\nserver:\n  port: 9000").unwrap();

        let cli = Cli::try_parse_from([
            "knmap",
            "--config",
            file.path().to_str().unwrap(),
            "--jaeger-url",
            "http://from-cli:16686",
            "serve",
        ])
        .unwrap();
        let config = cli.load_config().await.unwrap();

        assert_eq!(config.jaeger.url, "http://from-cli:16686");
        assert_eq!(config.server.port, 9000);
    }

    #[tokio::test]
    async fn test_missing_explicit_config_is_error() {
        let cli = Cli::try_parse_from(["knmap", "--config", "/nonexistent/knmap.yaml", "check-config"]).unwrap();
        let err = cli.load_config().await.unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
