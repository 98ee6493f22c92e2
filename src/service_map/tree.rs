//! Span forest reconstruction.
//!
//! Spans live in an arena indexed by position; parent and child links are
//! plain indices into that arena.

use crate::core::Span;
use ahash::AHashMap;

/// Index of a span inside a [`SpanTree`].
pub type SpanIdx = usize;

/// Forest of spans: roots plus start-time-ordered children per span.
#[derive(Debug, Default)]
pub struct SpanTree {
    spans: Vec<Span>,
    index: AHashMap<String, SpanIdx>,
    parents: Vec<Option<SpanIdx>>,
    children: Vec<Vec<SpanIdx>>,
    roots: Vec<SpanIdx>,
}

impl SpanTree {
    /// Builds the forest from a closed set of tagged spans.
    ///
    /// A span is a root when it has no CHILD_OF reference or when the
    /// referenced parent is not in the set. Only the first CHILD_OF
    /// reference counts. Repeated span ids keep their first occurrence.
    pub fn build(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut index: AHashMap<String, SpanIdx> = AHashMap::new();
        let mut arena = Vec::new();

        for span in spans {
            if index.contains_key(span.span_id.as_str()) {
                tracing::trace!(span_id = %span.span_id, "Skipping duplicate span");
                continue;
            }
            index.insert(span.span_id.as_str().to_string(), arena.len());
            arena.push(span);
        }

        let mut parents = vec![None; arena.len()];
        let mut children = vec![Vec::new(); arena.len()];
        let mut roots = Vec::new();

        for (idx, span) in arena.iter().enumerate() {
            match span.child_of().and_then(|parent_id| index.get(parent_id)) {
                Some(&parent) => {
                    parents[idx] = Some(parent);
                    children[parent].push(idx);
                },
                None => roots.push(idx),
            }
        }

        let mut tree = SpanTree {
            spans: arena,
            index,
            parents,
            children,
            roots,
        };
        tree.order_children();
        tree
    }

    /// Sorts every child list by ascending start time.
    ///
    /// The sort is stable, so ties keep input order. Sibling order decides
    /// which edges chain together during the walk.
    fn order_children(&mut self) {
        let spans = &self.spans;
        for list in &mut self.children {
            list.sort_by_key(|&idx| spans[idx].start_time);
        }
    }

    pub fn span(&self, idx: SpanIdx) -> &Span {
        &self.spans[idx]
    }

    /// Children of a span, earliest first
    pub fn children(&self, idx: SpanIdx) -> &[SpanIdx] {
        &self.children[idx]
    }

    pub fn parent(&self, idx: SpanIdx) -> Option<SpanIdx> {
        self.parents[idx]
    }

    /// Roots in input order
    pub fn roots(&self) -> &[SpanIdx] {
        &self.roots
    }

    /// Looks up a span by id
    pub fn find(&self, span_id: &str) -> Option<SpanIdx> {
        self.index.get(span_id).copied()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
