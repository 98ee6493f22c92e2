//! Accumulates traces from overlapping fetches into one closed span set.

use crate::core::{Span, Trace};
use crate::service_map::tagger;
use ahash::AHashSet;

/// Deduplicated, tagged spans gathered from any number of trace fetches.
///
/// Per-service fetches overlap: a trace touching three services comes back
/// three times. The first copy of a trace wins, and a span id is admitted
/// only once across the whole collection.
#[derive(Debug, Default)]
pub struct TraceCollection {
    trace_ids: AHashSet<String>,
    span_ids: AHashSet<String>,
    spans: Vec<Span>,
    duplicate_traces: usize,
    duplicate_spans: usize,
}

impl TraceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a trace, returning false if its id was already seen.
    pub fn add_trace(&mut self, trace: Trace) -> bool {
        if !self.trace_ids.insert(trace.trace_id.as_str().to_string()) {
            self.duplicate_traces += 1;
            return false;
        }

        for span in trace.spans {
            self.add_span(span);
        }
        true
    }

    /// Admits a single span, tagging it on the way in.
    pub fn add_span(&mut self, mut span: Span) -> bool {
        if !self.span_ids.insert(span.span_id.as_str().to_string()) {
            self.duplicate_spans += 1;
            return false;
        }

        tagger::tag_span(&mut span);
        self.spans.push(span);
        true
    }

    pub fn trace_count(&self) -> usize {
        self.trace_ids.len()
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// (duplicate traces, duplicate spans) skipped so far
    pub fn duplicates(&self) -> (usize, usize) {
        (self.duplicate_traces, self.duplicate_spans)
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn into_spans(self) -> Vec<Span> {
        self.spans
    }
}

impl Extend<Trace> for TraceCollection {
    fn extend<I: IntoIterator<Item = Trace>>(&mut self, iter: I) {
        for trace in iter {
            self.add_trace(trace);
        }
    }
}

impl FromIterator<Trace> for TraceCollection {
    fn from_iter<I: IntoIterator<Item = Trace>>(iter: I) -> Self {
        let mut collection = TraceCollection::new();
        collection.extend(iter);
        collection
    }
}
