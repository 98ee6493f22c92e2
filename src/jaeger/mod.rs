//! Jaeger query API client.
//!
//! Lists the services Jaeger knows about, then pulls each service's traces
//! for the window. Requests for different services run concurrently up to
//! `jaeger.concurrency`; each one is retried on transient failures.

use crate::core::config::JaegerConfig;
use crate::core::retry::{retry_with_config, RetryConfig};
use crate::core::{KnmapError, Result, TimeWindow, Trace};
use crate::service_map::TraceSource;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;

/// `{"data": [...]}` envelope used by every query API response.
#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<Vec<T>>,
}

/// Saved documents may also be a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document<T> {
    Envelope(Envelope<T>),
    List(Vec<T>),
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<Vec<T>> {
    let document: Document<T> = serde_json::from_slice(body)
        .map_err(|e| KnmapError::decode(format!("Malformed {} payload: {}", what, e)))?;
    Ok(match document {
        Document::Envelope(envelope) => envelope.data.unwrap_or_default(),
        Document::List(items) => items,
    })
}

/// Decodes a `/api/traces` response body.
pub fn decode_traces(body: &[u8]) -> Result<Vec<Trace>> {
    decode(body, "traces")
}

/// Decodes a `/api/services` response body.
pub fn decode_services(body: &[u8]) -> Result<Vec<String>> {
    decode(body, "services")
}

/// HTTP client for the Jaeger query service.
#[derive(Debug, Clone)]
pub struct JaegerClient {
    client: Client,
    base_url: Url,
    trace_limit: usize,
    concurrency: usize,
    retry: RetryConfig,
}

impl JaegerClient {
    /// Create a new client from configuration
    pub fn new(config: &JaegerConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.url).map_err(|e| {
            KnmapError::config(format!("Invalid Jaeger URL '{}': {}", config.url, e))
        })?;
        // keep any path prefix when joining endpoint paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| KnmapError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            trace_limit: config.trace_limit,
            concurrency: config.concurrency.max(1),
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| KnmapError::config(format!("Invalid Jaeger endpoint '{}': {}", path, e)))
    }

    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<Vec<u8>> {
        let response = self.client.get(url).query(query).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// GET /api/services
    pub async fn services(&self) -> Result<Vec<String>> {
        let body = self.get(self.endpoint("api/services")?, &[]).await?;
        decode_services(&body)
    }

    /// GET /api/traces for one service over the window
    pub async fn traces_for_service(&self, service: &str, window: TimeWindow) -> Result<Vec<Trace>> {
        let query = [
            ("service", service.to_string()),
            ("start", window.start_micros().to_string()),
            ("end", window.end_micros().to_string()),
            ("limit", self.trace_limit.to_string()),
        ];
        let body = self.get(self.endpoint("api/traces")?, &query).await?;
        let traces = decode_traces(&body)?;
        tracing::debug!(service, traces = traces.len(), "Fetched traces");
        Ok(traces)
    }
}

#[async_trait]
impl TraceSource for JaegerClient {
    async fn fetch_traces(&self, window: TimeWindow) -> Result<Vec<Trace>> {
        let services = retry_with_config(&self.retry, || self.services()).await?;
        tracing::debug!(services = services.len(), "Listed Jaeger services");

        let batches: Vec<Vec<Trace>> = stream::iter(services)
            .map(|service| async move {
                retry_with_config(&self.retry, || self.traces_for_service(&service, window)).await
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }
}

/// Trace source reading a saved `/api/traces` document.
///
/// The document is taken as already scoped; the window is not applied.
#[derive(Debug, Clone)]
pub struct FileTraceSource {
    path: PathBuf,
}

impl FileTraceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TraceSource for FileTraceSource {
    async fn fetch_traces(&self, _window: TimeWindow) -> Result<Vec<Trace>> {
        let body = tokio::fs::read(&self.path).await?;
        decode_traces(&body)
    }
}
