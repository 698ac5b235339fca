/*!
# Predicate Accumulators

An in-flight predicate collects the results of its host and the
satisfactions of its operands. It resolves once every operand has fired
since the accumulator was created or last resolved, and at least one host
result is waiting. Each resolution consumes one host result and puts every
operand back on the outstanding list.
*/
use std::collections::BTreeMap;

use crate::model::{NodeId, Predicate};

/// In-flight state of one predicate.
#[derive(Debug, Clone)]
pub struct PredicateResult {
    operands: (Vec<NodeId>, Vec<NodeId>),
    nodes: Vec<NodeId>,
    predicates: Vec<NodeId>,
    hosts: BTreeMap<u64, String>,
}

impl PredicateResult {
    /// A fresh accumulator with every operand outstanding.
    #[must_use]
    pub fn new(predicate: &Predicate) -> Self {
        let mut nodes = predicate.nodes.clone();
        nodes.sort_unstable();
        nodes.dedup();
        let mut predicates = predicate.predicates.clone();
        predicates.sort_unstable();
        predicates.dedup();
        Self {
            operands: (nodes.clone(), predicates.clone()),
            nodes,
            predicates,
            hosts: BTreeMap::new(),
        }
    }

    /// Record a host result at the given document order.
    pub fn push_host(&mut self, order: u64, result: String) {
        self.hosts.insert(order, result);
    }

    /// Mark an operand node as fired. Returns whether it was outstanding.
    pub fn satisfy_node(&mut self, node: NodeId) -> bool {
        remove(&mut self.nodes, node)
    }

    /// Mark an operand predicate as resolved. Returns whether it was
    /// outstanding.
    pub fn satisfy_predicate(&mut self, predicate: NodeId) -> bool {
        remove(&mut self.predicates, predicate)
    }

    /// Whether every operand has fired.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.nodes.is_empty() && self.predicates.is_empty()
    }

    /// Whether a host result is waiting for operands.
    #[must_use]
    pub fn has_pending_host(&self) -> bool {
        !self.hosts.is_empty()
    }

    /// Whether [`take_result`](Self::take_result) would yield a result.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        self.is_satisfied() && self.has_pending_host()
    }

    /// Consume the most recent host result, if the predicate holds. A
    /// consumed result re-arms every operand for the hosts still waiting.
    pub fn take_result(&mut self) -> Option<(u64, String)> {
        if !self.is_satisfied() {
            return None;
        }
        let taken = self.hosts.pop_last()?;
        self.nodes.clone_from(&self.operands.0);
        self.predicates.clone_from(&self.operands.1);
        Some(taken)
    }
}

fn remove(outstanding: &mut Vec<NodeId>, id: NodeId) -> bool {
    match outstanding.binary_search(&id) {
        Ok(index) => {
            outstanding.remove(index);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Forest, Step};

    fn ids() -> (NodeId, NodeId, NodeId) {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a = forest.add_child(root, Step::child("a"));
        let b = forest.add_child(root, Step::child("b"));
        let c = forest.add_child(root, Step::child("c"));
        (a, b, c)
    }

    #[test]
    fn resolves_only_when_all_operands_fired() {
        let (a, b, p) = ids();
        let mut acc = PredicateResult::new(&Predicate { nodes: vec![b, a], predicates: vec![p] });
        acc.push_host(3, "/x[1]".to_string());
        assert!(acc.satisfy_node(a));
        assert!(!acc.satisfy_node(a));
        assert!(acc.satisfy_node(b));
        assert!(!acc.is_resolvable());
        assert_eq!(acc.take_result(), None);
        assert!(acc.satisfy_predicate(p));
        assert!(acc.is_resolvable());
        assert_eq!(acc.take_result(), Some((3, "/x[1]".to_string())));
        assert!(!acc.has_pending_host());
    }

    #[test]
    fn latest_host_first() {
        let (a, ..) = ids();
        let mut acc = PredicateResult::new(&Predicate { nodes: vec![a], predicates: vec![] });
        acc.push_host(2, "outer".to_string());
        acc.push_host(5, "inner".to_string());
        acc.satisfy_node(a);
        assert_eq!(acc.take_result(), Some((5, "inner".to_string())));
        // the outer host needs a fresh satisfaction
        assert!(!acc.is_satisfied());
        assert_eq!(acc.take_result(), None);
        assert!(acc.satisfy_node(a));
        assert_eq!(acc.take_result(), Some((2, "outer".to_string())));
        assert_eq!(acc.take_result(), None);
    }

    #[test]
    fn satisfied_without_host_is_not_resolvable() {
        let (a, ..) = ids();
        let mut acc = PredicateResult::new(&Predicate { nodes: vec![a], predicates: vec![] });
        acc.satisfy_node(a);
        assert!(acc.is_satisfied());
        assert!(!acc.is_resolvable());
    }
}
