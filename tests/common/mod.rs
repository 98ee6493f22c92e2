//! Common test utilities and fixtures.

#![allow(dead_code)]

use knmap_lib::core::{ServiceIdentity, ServiceRecord, Span, Trace, TraceId};
use knmap_lib::service_map::KnownServices;

/// Test fixture builder for creating spans with sensible defaults.
pub struct TestSpanBuilder {
    trace_id: String,
    span_id: String,
    parents: Vec<String>,
    start_time: i64,
    url: Option<String>,
    host: Option<String>,
}

impl TestSpanBuilder {
    pub fn new(trace_id: &str, span_id: &str) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            parents: Vec::new(),
            start_time: 0,
            url: None,
            host: None,
        }
    }

    /// Adds a CHILD_OF reference; call twice for a multi-parent span.
    pub fn parent(mut self, span_id: &str) -> Self {
        self.parents.push(span_id.to_string());
        self
    }

    pub fn start(mut self, micros: i64) -> Self {
        self.start_time = micros;
        self
    }

    /// Sets `http.url` to the cluster-local address of `name.namespace`.
    pub fn service(mut self, name: &str, namespace: &str) -> Self {
        self.url = Some(format!("http://{}.{}.svc.cluster.local", name, namespace));
        self
    }

    /// Marks the span as a dispatch to a parallel broadcast channel.
    pub fn fan_out(mut self) -> Self {
        self.host = Some("split-kn-parallel-kn-channel.shop.svc.cluster.local".to_string());
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn build(self) -> Span {
        let mut builder = Span::builder()
            .trace_id(self.trace_id)
            .span_id(self.span_id)
            .operation_name("/")
            .start_time(self.start_time)
            .duration(10);
        for parent in self.parents {
            builder = builder.child_of(parent);
        }
        if let Some(url) = self.url {
            builder = builder.tag("http.url", url);
        }
        if let Some(host) = self.host {
            builder = builder.tag("http.host", host);
        }
        builder.build().unwrap()
    }
}

/// Create a trace from spans.
pub fn trace(trace_id: &str, spans: Vec<Span>) -> Trace {
    Trace::new(TraceId::new(trace_id).unwrap(), spans)
}

/// Known-service set from `(name, namespace)` pairs.
pub fn known(services: &[(&str, &str)]) -> KnownServices {
    services.iter().map(|(name, ns)| ServiceIdentity::new(*name, *ns)).collect()
}

/// Registry records from `(name, namespace)` pairs.
pub fn records(services: &[(&str, &str)]) -> Vec<ServiceRecord> {
    services.iter().map(|(name, ns)| ServiceRecord::new(*name, *ns)).collect()
}

pub fn id(name: &str, namespace: &str) -> ServiceIdentity {
    ServiceIdentity::new(name, namespace)
}

/// Macro for creating a test span quickly.
#[macro_export]
macro_rules! test_span {
    ($span:expr) => {
        TestSpanBuilder::new("t1", $span).build()
    };
    ($span:expr, parent: $parent:expr) => {
        TestSpanBuilder::new("t1", $span).parent($parent).build()
    };
    ($span:expr, parent: $parent:expr, start: $start:expr) => {
        TestSpanBuilder::new("t1", $span).parent($parent).start($start).build()
    };
    ($span:expr, parent: $parent:expr, start: $start:expr, service: $name:expr, $ns:expr) => {
        TestSpanBuilder::new("t1", $span)
            .parent($parent)
            .start($start)
            .service($name, $ns)
            .build()
    };
}

/// Asserts the edge set holds exactly the given `(source, target)` pairs.
#[macro_export]
macro_rules! assert_edges {
    ($edges:expr, [$(($src:expr, $dst:expr)),* $(,)?]) => {{
        let mut actual: Vec<String> = $edges.iter().map(|e| e.to_string()).collect();
        actual.sort();
        let mut expected: Vec<String> = vec![$(format!("{} -> {}", $src, $dst)),*];
        expected.sort();
        pretty_assertions::assert_eq!(actual, expected);
    }};
}
