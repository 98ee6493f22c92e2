use crate::core::error::{KnmapError, Result};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Reference type naming a span's causal parent.
pub const CHILD_OF: &str = "CHILD_OF";

/// Unique identifier for a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(String);

/// Identifier for a span, unique within its trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpanId(String);

impl TraceId {
    /// Creates a new TraceId after validation
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(KnmapError::InvalidSpan("TraceId cannot be empty".to_string()));
        }
        Ok(TraceId(id))
    }

    /// Returns the string representation of the trace ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SpanId {
    /// Creates a new SpanId after validation
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(KnmapError::InvalidSpan("SpanId cannot be empty".to_string()));
        }
        Ok(SpanId(id))
    }

    /// Returns the string representation of the span ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TraceId {
    type Error = KnmapError;

    fn try_from(value: String) -> Result<Self> {
        TraceId::new(value)
    }
}

impl TryFrom<String> for SpanId {
    type Error = KnmapError;

    fn try_from(value: String) -> Result<Self> {
        SpanId::new(value)
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.0
    }
}

impl From<SpanId> for String {
    fn from(id: SpanId) -> Self {
        id.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical service key: the join between trace data and the service registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Service name
    pub name: String,
    /// Kubernetes namespace
    pub namespace: String,
}

impl ServiceIdentity {
    /// Creates a new service identity
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.namespace)
    }
}

/// A service known to the platform registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub namespace: String,
    /// Registry UID, if the registry assigns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ServiceRecord {
    /// Creates a record without a UID
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: None,
        }
    }

    /// Sets the registry UID
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Node id used in rendered maps: the UID, or `<name>_<namespace>`
    pub fn id(&self) -> String {
        match &self.uid {
            Some(uid) => uid.clone(),
            None => format!("{}_{}", self.name, self.namespace),
        }
    }

    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(self.name.as_str(), self.namespace.as_str())
    }
}

/// Directed call relationship between two services.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Calling service
    pub source: ServiceIdentity,
    /// Called service
    pub target: ServiceIdentity,
}

impl Edge {
    /// Creates a new edge
    pub fn new(source: ServiceIdentity, target: ServiceIdentity) -> Self {
        Self { source, target }
    }

    /// Returns true if either endpoint is the given service
    pub fn touches(&self, service: &ServiceIdentity) -> bool {
        &self.source == service || &self.target == service
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Free-form key/type/value triple attached to a span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(rename = "type", default)]
    pub tag_type: String,
    #[serde(default, deserialize_with = "tag_value")]
    pub value: String,
}

impl Tag {
    /// Creates a string-typed tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tag_type: "string".to_string(),
            value: value.into(),
        }
    }
}

/// Jaeger encodes non-string tags as JSON numbers or booleans.
fn tag_value<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!("unsupported tag value: {other}"))),
    }
}

/// Link from a span to another span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "refType")]
    pub ref_type: String,
    #[serde(rename = "traceID", default)]
    pub trace_id: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
}

impl Reference {
    /// Creates a CHILD_OF reference to the given span
    pub fn child_of(span_id: impl Into<String>) -> Self {
        Self {
            ref_type: CHILD_OF.to_string(),
            trace_id: String::new(),
            span_id: span_id.into(),
        }
    }

    /// Returns true if this reference names the causal parent
    pub fn is_child_of(&self) -> bool {
        self.ref_type == CHILD_OF
    }
}

/// A single timed operation within a trace, as decoded from Jaeger.
///
/// `service` and `fan_out` are derived by the tagger and never travel on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "traceID")]
    pub trace_id: TraceId,
    #[serde(rename = "spanID")]
    pub span_id: SpanId,
    #[serde(rename = "operationName", default)]
    pub operation_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub references: Vec<Reference>,
    /// Microseconds since the Unix epoch
    #[serde(rename = "startTime", default)]
    pub start_time: i64,
    /// Microseconds
    #[serde(default)]
    pub duration: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<Tag>,
    /// Resolved service identity, if any tag named one
    #[serde(skip)]
    pub service: Option<ServiceIdentity>,
    /// True if the span dispatches to a broadcast or trigger channel
    #[serde(skip)]
    pub fan_out: bool,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Span {
    /// Creates a new span builder
    pub fn builder() -> SpanBuilder {
        SpanBuilder::default()
    }

    /// Returns the parent span id named by the first CHILD_OF reference.
    ///
    /// Later CHILD_OF references are ignored; traces are assumed to be
    /// single-parent trees.
    pub fn child_of(&self) -> Option<&str> {
        self.references
            .iter()
            .find(|r| r.is_child_of())
            .map(|r| r.span_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Gets the value of the first tag with the given key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }
}

/// Builder for creating Span instances
#[derive(Default)]
pub struct SpanBuilder {
    trace_id: Option<String>,
    span_id: Option<String>,
    operation_name: Option<String>,
    references: Vec<Reference>,
    start_time: i64,
    duration: i64,
    tags: Vec<Tag>,
}

impl SpanBuilder {
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    pub fn operation_name(mut self, operation_name: impl Into<String>) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.references.push(Reference::child_of(parent));
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn start_time(mut self, micros: i64) -> Self {
        self.start_time = micros;
        self
    }

    pub fn duration(mut self, micros: i64) -> Self {
        self.duration = micros;
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    pub fn build(self) -> Result<Span> {
        let trace_id = self
            .trace_id
            .ok_or_else(|| KnmapError::InvalidSpan("trace_id is required".to_string()))?;
        let span_id = self
            .span_id
            .ok_or_else(|| KnmapError::InvalidSpan("span_id is required".to_string()))?;

        Ok(Span {
            trace_id: TraceId::new(trace_id)?,
            span_id: SpanId::new(span_id)?,
            operation_name: self.operation_name.unwrap_or_default(),
            references: self.references,
            start_time: self.start_time,
            duration: self.duration,
            tags: self.tags,
            service: None,
            fan_out: false,
        })
    }
}

/// A set of spans sharing one trace identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "traceID")]
    pub trace_id: TraceId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub spans: Vec<Span>,
}

impl Trace {
    /// Creates a trace from its spans
    pub fn new(trace_id: TraceId, spans: Vec<Span>) -> Self {
        Self { trace_id, spans }
    }
}

/// Half-open query window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, rejecting empty or inverted ranges
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from >= to {
            return Err(KnmapError::InvalidWindow {
                from: from.timestamp_micros(),
                to: to.timestamp_micros(),
            });
        }
        Ok(Self { from, to })
    }

    /// Creates a window from microsecond Unix timestamps
    pub fn from_micros(from: i64, to: i64) -> Result<Self> {
        let from_ts = Utc
            .timestamp_micros(from)
            .single()
            .ok_or(KnmapError::InvalidWindow { from, to })?;
        let to_ts = Utc
            .timestamp_micros(to)
            .single()
            .ok_or(KnmapError::InvalidWindow { from, to })?;
        Self::new(from_ts, to_ts)
    }

    /// The window of the given length ending now
    pub fn last(length: std::time::Duration) -> Result<Self> {
        let too_large = || KnmapError::config(format!("Window of {:?} is out of range", length));
        let span = ChronoDuration::from_std(length).map_err(|_| too_large())?;
        let to = Utc::now();
        let from = to.checked_sub_signed(span).ok_or_else(too_large)?;
        Self::new(from, to)
    }

    pub fn start_micros(&self) -> i64 {
        self.from.timestamp_micros()
    }

    pub fn end_micros(&self) -> i64 {
        self.to.timestamp_micros()
    }
}
