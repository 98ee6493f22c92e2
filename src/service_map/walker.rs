//! Depth-first walk that turns a span forest into service edges.
//!
//! Each span is entered with the *current source*: the nearest preceding
//! visible service on the call path, or none. Entering a span does the
//! following:
//!
//! 1. If the span is visible and a source is set, the edge
//!    `source -> span` is recorded. The span's own identity then becomes
//!    the source for everything beneath it.
//! 2. If the span is invisible, the source passes through unchanged.
//!    Invisible hops (proxies, internal routing, unresolved spans) neither
//!    start nor end an edge.
//! 3. Children are visited earliest first. A [`TraversalPolicy::Sequential`]
//!    span hands each child the source returned by the previous child's
//!    subtree, so successive calls chain. A [`TraversalPolicy::FanOut`]
//!    span hands every child the same source, so parallel deliveries never
//!    chain into one another.
//! 4. The span's final source is returned to its parent.
//!
//! The walk uses an explicit stack, so deep traces cannot exhaust the
//! thread stack. Each span has at most one parent, so nothing is visited
//! twice; spans caught in a parent cycle are unreachable from any root and
//! contribute nothing.

use crate::core::{Edge, ServiceIdentity};
use crate::service_map::edges::EdgeSet;
use crate::service_map::tree::{SpanIdx, SpanTree};
use crate::service_map::visibility::{TraversalPolicy, Visibility};

/// One span on the walk stack.
struct Frame<'a> {
    span: SpanIdx,
    policy: TraversalPolicy,
    /// Source in effect for the next child
    source: Option<&'a ServiceIdentity>,
    next_child: usize,
}

/// Walks a [`SpanTree`] and collects the edges between visible services.
pub struct GraphWalker<'a> {
    tree: &'a SpanTree,
    visibility: Visibility<'a>,
    edges: EdgeSet,
    visited: usize,
}

impl<'a> GraphWalker<'a> {
    pub fn new(tree: &'a SpanTree, visibility: Visibility<'a>) -> Self {
        Self {
            tree,
            visibility,
            edges: EdgeSet::new(),
            visited: 0,
        }
    }

    /// Walks every root and returns the collected edges.
    pub fn walk(mut self) -> EdgeSet {
        let tree = self.tree;
        for &root in tree.roots() {
            self.walk_from(root, None);
        }

        let unreachable = tree.len().saturating_sub(self.visited);
        if unreachable > 0 {
            tracing::debug!(unreachable, "Spans not reachable from any root were skipped");
        }
        self.edges
    }

    /// Walks the subtree under `start`, entering it with `source`, and
    /// returns the source left in effect after its last descendant.
    pub fn walk_from(
        &mut self,
        start: SpanIdx,
        source: Option<&'a ServiceIdentity>,
    ) -> Option<&'a ServiceIdentity> {
        let tree = self.tree;
        let mut stack = vec![self.enter(start, source)];

        loop {
            let Some(frame) = stack.last_mut() else {
                // the root frame always returns before the stack empties
                return None;
            };

            if let Some(&child) = tree.children(frame.span).get(frame.next_child) {
                frame.next_child += 1;
                let inherited = frame.source;
                let child_frame = self.enter(child, inherited);
                stack.push(child_frame);
                continue;
            }

            let returned = frame.source;
            stack.pop();
            match stack.last_mut() {
                Some(parent) => {
                    parent.source = parent.policy.next_source(parent.source, returned);
                },
                None => return returned,
            }
        }
    }

    /// Steps 1 and 2: record the incoming edge and pick the local source.
    fn enter(&mut self, idx: SpanIdx, incoming: Option<&'a ServiceIdentity>) -> Frame<'a> {
        self.visited += 1;
        let tree = self.tree;
        let span = tree.span(idx);

        let source = match self.visibility.identity(span) {
            Some(identity) => {
                if let Some(from) = incoming {
                    self.edges.insert(Edge::new(from.clone(), identity.clone()));
                }
                Some(identity)
            },
            None => incoming,
        };

        Frame {
            span: idx,
            policy: self.visibility.policy(span),
            source,
            next_child: 0,
        }
    }

    /// Edges collected so far
    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }
}
