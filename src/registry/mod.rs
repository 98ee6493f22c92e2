//! Known-service registries.
//!
//! The registry decides which service identities are visible in the map.
//! It is independent of the trace data: a service that never shows up in
//! a trace is still a node, and a trace-derived identity that is not
//! registered is treated as an internal hop.

use crate::core::config::RegistryConfig;
use crate::core::{KnmapError, Result, ServiceRecord};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Source of the known-service list.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceRecord>>;
}

/// Registry backed by a fixed list, usually from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    services: Vec<ServiceRecord>,
}

impl StaticRegistry {
    pub fn new(services: Vec<ServiceRecord>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        Ok(self.services.clone())
    }
}

/// Registry read from a YAML or JSON file on every call.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

/// Accepts a bare list or a `services:` mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    List(Vec<ServiceRecord>),
    Wrapped { services: Vec<ServiceRecord> },
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parses registry file content
    pub fn parse(content: &str) -> Result<Vec<ServiceRecord>> {
        let parsed: RegistryFile = serde_yaml::from_str(content)
            .map_err(|e| KnmapError::registry(format!("Failed to parse registry: {}", e)))?;
        let services = match parsed {
            RegistryFile::List(services) | RegistryFile::Wrapped { services } => services,
        };

        if let Some(bad) = services.iter().find(|r| r.name.is_empty() || r.namespace.is_empty()) {
            return Err(KnmapError::registry(format!(
                "Registry entry needs a name and a namespace, got '{}' in '{}'",
                bad.name, bad.namespace
            )));
        }
        Ok(services)
    }
}

#[async_trait]
impl ServiceRegistry for FileRegistry {
    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            KnmapError::registry(format!("Failed to read registry file {:?}: {}", self.path, e))
        })?;
        let services = Self::parse(&content)?;
        tracing::debug!(path = ?self.path, services = services.len(), "Loaded service registry");
        Ok(services)
    }
}

/// Picks the registry described by the configuration: the file when set,
/// otherwise the inline list.
pub fn from_config(config: &RegistryConfig) -> Arc<dyn ServiceRegistry> {
    match &config.file {
        Some(path) => Arc::new(FileRegistry::new(path.clone())),
        None => Arc::new(StaticRegistry::new(config.services.clone())),
    }
}
