use crate::core::{Edge, ServiceIdentity};
use serde::Serialize;
use std::collections::btree_set::{self, BTreeSet};

/// Deduplicated set of directed service edges.
///
/// Ordered so that serialized output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EdgeSet(BTreeSet<Edge>);

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edge, returning false if it was already present
    pub fn insert(&mut self, edge: Edge) -> bool {
        self.0.insert(edge)
    }

    pub fn contains(&self, edge: &Edge) -> bool {
        self.0.contains(edge)
    }

    /// Convenience lookup by endpoint identities
    pub fn contains_pair(&self, source: &ServiceIdentity, target: &ServiceIdentity) -> bool {
        self.0.contains(&Edge::new(source.clone(), target.clone()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Edge> {
        self.0.iter()
    }

    /// Every identity that appears as an edge endpoint
    pub fn endpoints(&self) -> BTreeSet<&ServiceIdentity> {
        self.0.iter().flat_map(|e| [&e.source, &e.target]).collect()
    }
}

impl FromIterator<Edge> for EdgeSet {
    fn from_iter<I: IntoIterator<Item = Edge>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Edge> for EdgeSet {
    fn extend<I: IntoIterator<Item = Edge>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for EdgeSet {
    type Item = Edge;
    type IntoIter = btree_set::IntoIter<Edge>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a EdgeSet {
    type Item = &'a Edge;
    type IntoIter = btree_set::Iter<'a, Edge>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
