//! Which spans take part in the service graph, and how their children chain.

use crate::core::{ServiceIdentity, ServiceRecord, Span};
use ahash::AHashSet;

/// Service identities registered with the platform.
#[derive(Debug, Clone, Default)]
pub struct KnownServices(AHashSet<ServiceIdentity>);

impl KnownServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the set from registry records
    pub fn from_records(records: &[ServiceRecord]) -> Self {
        records.iter().map(ServiceRecord::identity).collect()
    }

    pub fn insert(&mut self, identity: ServiceIdentity) -> bool {
        self.0.insert(identity)
    }

    pub fn contains(&self, identity: &ServiceIdentity) -> bool {
        self.0.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceIdentity> {
        self.0.iter()
    }
}

impl FromIterator<ServiceIdentity> for KnownServices {
    fn from_iter<I: IntoIterator<Item = ServiceIdentity>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How the walker threads the current source through a span's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalPolicy {
    /// Each child continues from where the previous child's subtree ended.
    Sequential,
    /// Every child starts from the source the span was entered with.
    FanOut,
}

impl TraversalPolicy {
    /// Source to hand to the next child, given the source in effect before
    /// the previous child and the source that child's subtree returned.
    pub fn next_source<T>(self, current: T, returned: T) -> T {
        match self {
            TraversalPolicy::Sequential => returned,
            TraversalPolicy::FanOut => current,
        }
    }
}

/// Visibility filter over a fixed set of known services.
#[derive(Debug, Clone, Copy)]
pub struct Visibility<'a> {
    known: &'a KnownServices,
}

impl<'a> Visibility<'a> {
    pub fn new(known: &'a KnownServices) -> Self {
        Self { known }
    }

    /// A span is visible iff its resolved identity is a known service.
    pub fn is_visible(&self, span: &Span) -> bool {
        self.identity(span).is_some()
    }

    /// The span's identity, only if visible
    pub fn identity<'s>(&self, span: &'s Span) -> Option<&'s ServiceIdentity> {
        span.service.as_ref().filter(|identity| self.known.contains(identity))
    }

    /// A span is parallel iff the tagger flagged it as a fan-out dispatch.
    pub fn is_parallel(&self, span: &Span) -> bool {
        span.fan_out
    }

    pub fn policy(&self, span: &Span) -> TraversalPolicy {
        if self.is_parallel(span) {
            TraversalPolicy::FanOut
        } else {
            TraversalPolicy::Sequential
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(service: Option<(&str, &str)>, fan_out: bool) -> Span {
        let mut span = Span::builder().trace_id("t").span_id("s").build().unwrap();
        span.service = service.map(|(name, ns)| ServiceIdentity::new(name, ns));
        span.fan_out = fan_out;
        span
    }

    fn known() -> KnownServices {
        KnownServices::from_records(&[ServiceRecord::new("orders", "shop")])
    }

    #[test]
    fn test_visible_requires_known_identity() {
        let known = known();
        let visibility = Visibility::new(&known);

        assert!(visibility.is_visible(&span(Some(("orders", "shop")), false)));
        assert!(!visibility.is_visible(&span(Some(("orders", "other")), false)));
        assert!(!visibility.is_visible(&span(Some(("payments", "shop")), false)));
        assert!(!visibility.is_visible(&span(None, false)));
    }

    #[test]
    fn test_policy_follows_fan_out_flag() {
        let known = known();
        let visibility = Visibility::new(&known);

        assert_eq!(visibility.policy(&span(None, true)), TraversalPolicy::FanOut);
        assert_eq!(visibility.policy(&span(None, false)), TraversalPolicy::Sequential);
        assert!(visibility.is_parallel(&span(None, true)));
    }

    #[test]
    fn test_next_source() {
        assert_eq!(TraversalPolicy::Sequential.next_source("entry", "child"), "child");
        assert_eq!(TraversalPolicy::FanOut.next_source("entry", "child"), "entry");
        assert_eq!(TraversalPolicy::Sequential.next_source(Some(1), None), None);
    }
}
