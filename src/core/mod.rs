//! Domain types, errors and configuration shared by every knmap component.

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{KnmapError, Result};
pub use types::{
    Edge, Reference, ServiceIdentity, ServiceRecord, Span, SpanBuilder, SpanId, Tag, TimeWindow,
    Trace, TraceId, CHILD_OF,
};
