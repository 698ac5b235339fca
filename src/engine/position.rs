/*!
# Position Tracker

Counts candidates for positional nodes per structural context. A context is
identified by the document order of the event that opened it, so counters
from one parent element never leak into the next.
*/
use std::collections::HashMap;

use crate::event::Event;
use crate::model::{NodeId, Position};

/// Per-context ordinal counters for positional nodes.
#[derive(Debug, Default)]
pub struct PositionTracker {
    counters: HashMap<u64, HashMap<NodeId, usize>>,
}

impl PositionTracker {
    /// Constructs a tracker with no open contexts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate for `node` within the context `scope` and report
    /// whether it is accepted.
    ///
    /// When `indexed` is set, the candidate is an element whose position
    /// among its same-named siblings is carried by the event itself, and an
    /// exact position is decided from it without counting.
    pub fn hit(
        &mut self,
        scope: u64,
        node: NodeId,
        position: Position,
        event: &Event<'_>,
        indexed: bool,
    ) -> bool {
        if indexed
            && let Position::Exact(n) = position
            && let Event::Element { position: sibling, .. } = event
        {
            return *sibling == n;
        }

        let count = self.counters.entry(scope).or_default().entry(node).or_insert(0);
        *count += 1;
        position.accepts(*count)
    }

    /// Forget every counter of a context that has ended.
    pub fn context_ended(&mut self, scope: u64) {
        self.counters.remove(&scope);
    }

    /// Number of contexts currently holding counters.
    #[must_use]
    pub fn open_contexts(&self) -> usize {
        self.counters.len()
    }
}
