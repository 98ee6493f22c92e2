//! Configuration management for knmap.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable and CLI overrides (applied by `cli`)
//! - Validation and defaults

use crate::core::retry::RetryConfig;
use crate::core::{KnmapError, Result, ServiceRecord};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Longest window a request may default to.
pub const MAX_DEFAULT_WINDOW: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Complete configuration for knmap
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Jaeger query API configuration
    pub jaeger: JaegerConfig,
    /// Known-service registry configuration
    pub registry: RegistryConfig,
    /// HTTP agent configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Jaeger query API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JaegerConfig {
    /// Base URL of the Jaeger query service
    pub url: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Maximum concurrent per-service trace fetches
    pub concurrency: usize,
    /// Traces per service and window (0 = no limit)
    pub trace_limit: usize,
    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

/// Known-service registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Inline service records
    pub services: Vec<ServiceRecord>,
    /// YAML or JSON file with service records; overrides `services`
    pub file: Option<PathBuf>,
}

/// HTTP agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: IpAddr,
    /// Listen port
    pub port: u16,
    /// Enable permissive CORS headers
    pub enable_cors: bool,
    /// Window used when a request omits `from`/`to`
    #[serde(with = "humantime_serde")]
    pub default_window: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for JaegerConfig {
    fn default() -> Self {
        JaegerConfig {
            url: "http://localhost:16686".to_string(),
            timeout: Duration::from_secs(30),
            concurrency: 8,
            trace_limit: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            enable_cors: true,
            default_window: Duration::from_secs(3600),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.jaeger.url).map_err(|e| {
            KnmapError::config(format!("Invalid Jaeger URL '{}': {}", self.jaeger.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(KnmapError::config(format!(
                "Jaeger URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.jaeger.concurrency == 0 {
            return Err(KnmapError::config("jaeger.concurrency must be greater than 0"));
        }

        if self.jaeger.retry.max_attempts == 0 {
            return Err(KnmapError::config("jaeger.retry.max_attempts must be greater than 0"));
        }

        if !self.jaeger.retry.multiplier.is_finite() || self.jaeger.retry.multiplier < 1.0 {
            return Err(KnmapError::config(format!(
                "jaeger.retry.multiplier must be a finite number of at least 1.0, got {}",
                self.jaeger.retry.multiplier
            )));
        }

        if self.server.port == 0 {
            return Err(KnmapError::config("server.port must be greater than 0"));
        }

        if self.server.default_window.is_zero() {
            return Err(KnmapError::config("server.default_window must be non-zero"));
        }
        if self.server.default_window > MAX_DEFAULT_WINDOW {
            return Err(KnmapError::config(format!(
                "server.default_window must be at most {:?}, got {:?}",
                MAX_DEFAULT_WINDOW, self.server.default_window
            )));
        }

        for record in &self.registry.services {
            if record.name.is_empty() || record.namespace.is_empty() {
                return Err(KnmapError::config(format!(
                    "Registry service entries need a name and a namespace, got '{}' in '{}'",
                    record.name, record.namespace
                )));
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| KnmapError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the Jaeger query URL
    pub fn jaeger_url(mut self, url: impl Into<String>) -> Self {
        self.config.jaeger.url = url.into();
        self
    }

    /// Set fetch concurrency
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.jaeger.concurrency = concurrency;
        self
    }

    /// Set the per-service trace limit
    pub fn trace_limit(mut self, limit: usize) -> Self {
        self.config.jaeger.trace_limit = limit;
        self
    }

    /// Set HTTP agent port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set the registry file
    pub fn registry_file(mut self, path: PathBuf) -> Self {
        self.config.registry.file = Some(path);
        self
    }

    /// Add an inline known service
    pub fn service(mut self, record: ServiceRecord) -> Self {
        self.config.registry.services.push(record);
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
