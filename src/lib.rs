//! knmap - service dependency maps for Knative workloads.
//!
//! knmap reads distributed traces from a Jaeger query service and infers
//! which registered services call which. Infrastructure hops (ingress
//! gateways, activators, channels) are skipped, and fan-out dispatches
//! through Knative parallels or triggers are kept as sibling edges rather
//! than a chain.
//!
//! # Architecture
//!
//! - `core`: Domain types, configuration, errors
//! - `service_map`: Tagging, span trees and the graph walk
//! - `jaeger`: Jaeger query API client
//! - `registry`: Known-service registries
//! - `api`: HTTP agent
//! - `cli`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use knmap_lib::core::{ServiceRecord, Trace};
//! use knmap_lib::service_map::{compute_service_edges, KnownServices};
//!
//! let known = KnownServices::from_records(&[ServiceRecord::new("orders", "shop")]);
//! let traces: Vec<Trace> = Vec::new();
//! let edges = compute_service_edges(&known, traces);
//! assert!(edges.is_empty());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod cli;
pub mod core;
pub mod jaeger;
pub mod registry;
pub mod service_map;

// Re-export core types for convenience
pub use crate::core::{Config, KnmapError, Result};
