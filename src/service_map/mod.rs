//! Service dependency mapping.
//!
//! Rebuilds a directed, deduplicated service graph from raw traces:
//! spans are tagged with a service identity, assembled into a forest,
//! and walked depth-first so that invisible hops are skipped and fan-out
//! dispatches do not chain their branches together. Everything here is
//! rebuilt from scratch per call.

pub mod analytics;
pub mod edges;
pub mod ingest;
pub mod render;
pub mod tagger;
pub mod tree;
pub mod visibility;
pub mod walker;

pub use analytics::Snapshot;
pub use edges::EdgeSet;
pub use ingest::TraceCollection;
pub use render::{ServiceMap, ServiceMapEdge, ServiceNode, WindowInfo};
pub use tree::{SpanIdx, SpanTree};
pub use visibility::{KnownServices, TraversalPolicy, Visibility};
pub use walker::GraphWalker;

use crate::core::{Result, TimeWindow, Trace};
use crate::registry::ServiceRegistry;
use async_trait::async_trait;
use std::sync::Arc;

/// Supplier of decoded traces for a time window.
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Fetch every trace touching the window. Partial results are never returned.
    async fn fetch_traces(&self, window: TimeWindow) -> Result<Vec<Trace>>;
}

/// Computes the service edges implied by a set of traces.
///
/// Deterministic for the same inputs. Traces and spans repeated across the
/// input are counted once.
pub fn compute_service_edges<I>(known: &KnownServices, traces: I) -> EdgeSet
where
    I: IntoIterator<Item = Trace>,
{
    let collection: TraceCollection = traces.into_iter().collect();
    compute_from_collection(known, collection)
}

/// Same as [`compute_service_edges`], for an already deduplicated collection.
pub fn compute_from_collection(known: &KnownServices, collection: TraceCollection) -> EdgeSet {
    let (duplicate_traces, duplicate_spans) = collection.duplicates();
    let trace_count = collection.trace_count();

    let tree = SpanTree::build(collection.into_spans());
    let edges = GraphWalker::new(&tree, Visibility::new(known)).walk();

    tracing::debug!(
        traces = trace_count,
        spans = tree.len(),
        roots = tree.roots().len(),
        duplicate_traces,
        duplicate_spans,
        known_services = known.len(),
        edges = edges.len(),
        "Computed service edges"
    );
    edges
}

/// Builds service maps from a registry and a trace source.
pub struct ServiceMapper {
    registry: Arc<dyn ServiceRegistry>,
    traces: Arc<dyn TraceSource>,
}

impl ServiceMapper {
    pub fn new(registry: Arc<dyn ServiceRegistry>, traces: Arc<dyn TraceSource>) -> Self {
        Self { registry, traces }
    }

    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }

    /// Fetches and computes everything for one window.
    ///
    /// The registry listing and the trace fetch run concurrently; either
    /// failing fails the whole snapshot.
    pub async fn snapshot(&self, window: TimeWindow) -> Result<Snapshot> {
        let (records, traces) =
            tokio::try_join!(self.registry.list_services(), self.traces.fetch_traces(window))?;

        tracing::info!(
            services = records.len(),
            traces = traces.len(),
            from = window.start_micros(),
            to = window.end_micros(),
            "Building service map"
        );

        Ok(Snapshot::compute(records, traces, window))
    }

    /// Builds the map for one window.
    pub async fn build(&self, window: TimeWindow) -> Result<ServiceMap> {
        Ok(self.snapshot(window).await?.service_map())
    }
}
