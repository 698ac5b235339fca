//! Hooks into evaluation, for diagnostics.
use log::{debug, info, trace};

use crate::model::NodeId;

/// Receives notifications as an evaluation pass progresses. Every method has
/// an empty default.
pub trait Observer {
    /// A node committed a result to its cache.
    fn node_hit(&mut self, _node: NodeId, _order: u64, _result: &str) {}

    /// A host fed a pending result into a predicate.
    fn predicate_hit(&mut self, _predicate: NodeId, _order: u64, _result: &str) {}

    /// A user-given predicate committed a result.
    fn predicate_cached(&mut self, _predicate: NodeId, _order: u64, _result: &str) {}

    /// A predicate's in-flight state was discarded, either on scope close
    /// or after its last waiting host resolved.
    fn cache_cleared(&mut self, _predicate: NodeId) {}

    /// The pass was stopped after `committed` results.
    fn stopped(&mut self, _committed: usize) {}
}

/// Reports through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn node_hit(&mut self, node: NodeId, order: u64, result: &str) {
        debug!("node hit {node} @{order}: {result:?}");
    }

    fn predicate_hit(&mut self, predicate: NodeId, order: u64, result: &str) {
        trace!("pending {predicate} @{order}: {result:?}");
    }

    fn predicate_cached(&mut self, predicate: NodeId, order: u64, result: &str) {
        debug!("predicate hit {predicate} @{order}: {result:?}");
    }

    fn cache_cleared(&mut self, predicate: NodeId) {
        trace!("cleared {predicate}");
    }

    fn stopped(&mut self, committed: usize) {
        info!("hit limit reached after {committed} results, stopping");
    }
}
