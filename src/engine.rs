/*!
# Evaluation Engine

Consumes `(event, matched node)` pairs in document order and maintains the
result caches of one evaluation pass.

For every hit the engine:

1. defers positional nodes to the [`PositionTracker`],
2. skips nodes no query result depends on,
3. runs functions through their single-hit or multi-hit protocol,
4. caches results of user-given nodes under the current document order,
5. feeds host results into the accumulators of attached predicates,
6. marks operands as satisfied in every predicate they are a member of,
7. propagates resolutions through nested predicates until nothing else
   resolves.

When a structural scope closes, predicates whose operands lie below the
closing node are discarded so that sibling subtrees are evaluated
independently ([`Evaluator::close_scope`]).

An optional hit budget stops the pass early by returning
[`Interrupt::Exhausted`] from [`Evaluator::hit`]. Results committed before
the stop stay valid.
*/
use std::collections::{BTreeMap, HashMap, VecDeque, btree_map, hash_map};
use std::error::Error;
use std::fmt::{self, Display};
use std::num::NonZeroUsize;

use crate::event::Event;
use crate::model::{Forest, ForestError, Function, NodeId, NodeKind, NodeTest};
use crate::query::XPath;

pub mod observer;
pub mod position;
pub mod predicate;

pub use observer::{LogObserver, Observer};
pub use position::PositionTracker;
pub use predicate::PredicateResult;

/// Where a hit happens: the structural context positions are counted in,
/// and the node whose scope the event was delivered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Document order of the event that opened the enclosing context
    pub scope: u64,
    /// Node the event is delivered under
    pub node: NodeId,
}

impl Context {
    /// Construct a new context.
    #[must_use]
    pub const fn new(scope: u64, node: NodeId) -> Self {
        Self { scope, node }
    }
}

/// Reasons a hit unwinds the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// The hit budget is used up. The pass ended early but successfully.
    Exhausted,
    /// The forest is malformed.
    Forest(ForestError),
}

impl From<ForestError> for Interrupt {
    fn from(err: ForestError) -> Self {
        Self::Forest(err)
    }
}

impl Error for Interrupt {}

impl Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "hit limit reached"),
            Self::Forest(err) => write!(f, "{err}"),
        }
    }
}

/// Per-pass evaluation state over a shared, read-only forest.
#[derive(Debug)]
pub struct Evaluator<'f, O: Observer = LogObserver> {
    forest: &'f Forest,
    root: NodeId,
    order: u64,
    remaining: Option<usize>,
    committed: usize,
    node_results: HashMap<NodeId, BTreeMap<u64, String>>,
    predicate_results: HashMap<NodeId, BTreeMap<u64, String>>,
    pending: HashMap<NodeId, PredicateResult>,
    positions: PositionTracker,
    observer: O,
}

impl<'f> Evaluator<'f> {
    /// Constructs an evaluator for the tree instance at `root`, logging
    /// through [`LogObserver`].
    #[must_use]
    pub fn new(forest: &'f Forest, root: NodeId, limit: Option<NonZeroUsize>) -> Self {
        Self::with_observer(forest, root, limit, LogObserver)
    }
}

impl<'f, O: Observer> Evaluator<'f, O> {
    /// Constructs an evaluator reporting to a custom observer.
    pub fn with_observer(
        forest: &'f Forest,
        root: NodeId,
        limit: Option<NonZeroUsize>,
        observer: O,
    ) -> Self {
        Self {
            forest,
            root,
            order: 0,
            remaining: limit.map(NonZeroUsize::get),
            committed: 0,
            node_results: HashMap::new(),
            predicate_results: HashMap::new(),
            pending: HashMap::new(),
            positions: PositionTracker::new(),
            observer,
        }
    }

    /// Move to the next event. Returns its document order.
    pub const fn advance(&mut self) -> u64 {
        self.order += 1;
        self.order
    }

    /// Document order of the current event.
    #[must_use]
    pub const fn order(&self) -> u64 {
        self.order
    }

    /// Number of results committed so far.
    #[must_use]
    pub const fn committed(&self) -> usize {
        self.committed
    }

    /// The observer receiving notifications.
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Deliver a matched event. Returns whether the node accepted it, which
    /// the caller uses to decide whether the node's scope is entered.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupt::Exhausted`] once the hit budget is used up, or
    /// [`Interrupt::Forest`] if the node does not belong to the forest.
    pub fn hit(
        &mut self,
        context: Context,
        event: &Event<'_>,
        node: NodeId,
    ) -> Result<bool, Interrupt> {
        let forest = self.forest;
        let target = forest.get(node).ok_or(ForestError::UnknownNode(node))?;

        if let NodeKind::Position(position) = target.kind() {
            // named element steps carry their sibling position on the event
            let indexed = target
                .constraint_parent()
                .and_then(|c| forest.get(c))
                .is_some_and(|c| match c.kind() {
                    NodeKind::Step(step) => {
                        !step.is_attribute() && matches!(step.test, NodeTest::Name(_))
                    }
                    _ => false,
                });
            if !self.positions.hit(context.scope, node, *position, event, indexed) {
                return Ok(false);
            }
        }

        if !target.result_interested() {
            return Ok(true);
        }

        if let NodeKind::Function(function) = target.kind() {
            if !target.user_given() {
                return Ok(false);
            }
            return self.hit_function(context, event, node, *function);
        }

        let key = self.order;
        let result = event.result();
        if target.user_given() {
            self.add_result(node, key, result.to_string())?;
        }

        let mut worklist = VecDeque::new();
        for &predicate in target.predicates() {
            self.accumulator(predicate)?.push_host(key, result.to_string());
            self.observer.predicate_hit(predicate, key, result);
            worklist.push_back(predicate);
            if let NodeKind::Predicate(definition) = forest.node(predicate).kind() {
                worklist.extend(definition.predicates.iter().copied());
            }
        }
        for &predicate in target.member_of() {
            self.accumulator(predicate)?.satisfy_node(node);
            worklist.push_back(predicate);
        }
        self.propagate(worklist)?;
        Ok(true)
    }

    /// The structural scope opened at document order `scope` has closed.
    /// `matched` lists the nodes that accepted the scope's opening event.
    pub fn close_scope(&mut self, scope: u64, matched: &[NodeId]) {
        let forest = self.forest;
        for &node in matched {
            let Some(closing) = forest.get(node) else { continue };
            for &predicate in closing.predicates() {
                let Some(NodeKind::Predicate(definition)) = forest.get(predicate).map(|p| p.kind())
                else {
                    continue;
                };
                let scoped = definition
                    .nodes
                    .iter()
                    .chain(&definition.predicates)
                    .any(|&operand| forest.is_strict_descendant(operand, node));
                if scoped {
                    self.purge(predicate);
                }
            }
        }
        self.positions.context_ended(scope);
    }

    /// Assemble the results of a query, ordered by document position.
    ///
    /// # Errors
    ///
    /// Returns a [`ForestError`] if a node of the query cannot be located in
    /// this evaluator's tree instance.
    pub fn results(&self, xpath: &XPath) -> Result<Vec<String>, ForestError> {
        let mut merged = BTreeMap::new();

        for &node in xpath.nodes() {
            let node = self.forest.locate_in(node, self.root)?;
            let cached = self.node_results.get(&node).filter(|r| !r.is_empty());
            if let NodeKind::Function(function) = self.forest.node(node).kind() {
                if !function.joins() {
                    match cached {
                        Some(results) => {
                            merged.extend(results.iter().map(|(k, v)| (*k, v.clone())));
                        }
                        None => {
                            merged.insert(0, function.default_result());
                        }
                    }
                    continue;
                }
                let (key, value) = match cached {
                    Some(results) => {
                        let mut entries = results.iter();
                        let (key, first) = entries
                            .next()
                            .map(|(k, v)| (*k, v.clone()))
                            .unwrap_or_default();
                        let joined =
                            entries.fold(first, |acc, (_, value)| function.join(&acc, value));
                        (key, joined)
                    }
                    None => (0, function.default_result()),
                };
                merged.insert(key, function.finish(value));
            } else if let Some(results) = cached {
                merged.extend(results.iter().map(|(k, v)| (*k, v.clone())));
            }
        }

        for &predicate in xpath.predicates() {
            let predicate = self.forest.locate_in(predicate, self.root)?;
            if let Some(results) = self.predicate_results.get(&predicate) {
                merged.extend(results.iter().map(|(k, v)| (*k, v.clone())));
            }
        }

        Ok(merged.into_values().collect())
    }

    fn hit_function(
        &mut self,
        context: Context,
        event: &Event<'_>,
        node: NodeId,
        function: Function,
    ) -> Result<bool, Interrupt> {
        let inside = context.node == node;
        let consumable = function.consumable(event);

        if function.single_hit() {
            if consumable && inside {
                self.evaluate_with_last(node, function, event)?;
                return Ok(true);
            }
            if self.node_results.get(&node).is_some_and(|r| !r.is_empty()) {
                return Ok(false);
            }
            self.add_result(node, self.order, function.evaluate(event, None))?;
            return Ok(consumable);
        }

        if consumable && !inside {
            if function.joins() {
                self.join_pending(node, function);
            }
            self.add_result(node, self.order, function.evaluate(event, None))?;
        } else {
            self.evaluate_with_last(node, function, event)?;
        }
        Ok(consumable)
    }

    /// Fold an event into the latest partial result of a function, keeping
    /// its document position.
    fn evaluate_with_last(
        &mut self,
        node: NodeId,
        function: Function,
        event: &Event<'_>,
    ) -> Result<(), Interrupt> {
        let results = self.node_results.entry(node).or_default();
        if let Some(mut last) = results.last_entry() {
            let value = function.evaluate(event, Some(last.get()));
            self.observer.node_hit(node, *last.key(), &value);
            last.insert(value);
            return Ok(());
        }
        self.add_result(node, self.order, function.evaluate(event, None))
    }

    /// Keep at most one pending partial result before a new one is added.
    fn join_pending(&mut self, node: NodeId, function: Function) {
        let Some(results) = self.node_results.get_mut(&node) else { return };
        if results.len() != 2 {
            return;
        }
        if let Some((_, earlier)) = results.pop_first()
            && let Some(mut later) = results.last_entry()
        {
            let joined = function.join(&earlier, later.get());
            later.insert(joined);
        }
    }

    fn accumulator(&mut self, predicate: NodeId) -> Result<&mut PredicateResult, ForestError> {
        match self.pending.entry(predicate) {
            hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            hash_map::Entry::Vacant(entry) => {
                let node = self.forest.get(predicate).ok_or(ForestError::UnknownNode(predicate))?;
                let NodeKind::Predicate(definition) = node.kind() else {
                    return Err(ForestError::NotAPredicate(predicate));
                };
                Ok(entry.insert(PredicateResult::new(definition)))
            }
        }
    }

    /// Resolve predicates until nothing else resolves.
    fn propagate(&mut self, mut worklist: VecDeque<NodeId>) -> Result<(), Interrupt> {
        let forest = self.forest;
        while let Some(predicate) = worklist.pop_front() {
            let Some(accumulator) = self.pending.get_mut(&predicate) else { continue };
            let Some((key, result)) = accumulator.take_result() else { continue };
            if !accumulator.has_pending_host() {
                // fully consumed: the next host waits for its own operands
                self.pending.remove(&predicate);
                self.observer.cache_cleared(predicate);
            }
            let node = forest.get(predicate).ok_or(ForestError::UnknownNode(predicate))?;
            if node.user_given() {
                self.commit_predicate(predicate, key, result)?;
            }
            for &member in node.member_of() {
                self.accumulator(member)?.satisfy_predicate(predicate);
                worklist.push_back(member);
            }
        }
        Ok(())
    }

    /// Discard a predicate's in-flight state, and that of dependents which
    /// have no host result of their own waiting.
    fn purge(&mut self, predicate: NodeId) {
        let forest = self.forest;
        let mut stack = vec![predicate];
        while let Some(current) = stack.pop() {
            if self.pending.remove(&current).is_some() {
                self.observer.cache_cleared(current);
            }
            let Some(node) = forest.get(current) else { continue };
            stack.extend(node.member_of().iter().copied().filter(|member| {
                self.pending.get(member).is_some_and(|acc| !acc.has_pending_host())
            }));
        }
    }

    fn add_result(&mut self, node: NodeId, key: u64, result: String) -> Result<(), Interrupt> {
        self.observer.node_hit(node, key, &result);
        self.node_results.entry(node).or_default().insert(key, result);
        self.spend()
    }

    fn commit_predicate(
        &mut self,
        predicate: NodeId,
        key: u64,
        result: String,
    ) -> Result<(), Interrupt> {
        self.observer.predicate_cached(predicate, key, &result);
        match self.predicate_results.entry(predicate).or_default().entry(key) {
            // already reported for this position
            btree_map::Entry::Occupied(_) => Ok(()),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(result);
                self.spend()
            }
        }
    }

    fn spend(&mut self) -> Result<(), Interrupt> {
        self.committed += 1;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.observer.stopped(self.committed);
                return Err(Interrupt::Exhausted);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompareOp, Comparison, ExpandedName, Step};

    #[derive(Debug, Default)]
    struct Recorder {
        cleared: Vec<NodeId>,
        stopped: Option<usize>,
    }

    impl Observer for Recorder {
        fn cache_cleared(&mut self, predicate: NodeId) {
            self.cleared.push(predicate);
        }

        fn stopped(&mut self, committed: usize) {
            self.stopped = Some(committed);
        }
    }

    fn element<'a>(name: &'a ExpandedName, position: usize, location: &'a str) -> Event<'a> {
        Event::Element { name, qname: &name.local, position, location }
    }

    /// `/a/b` and `/a/b[c='x']`
    struct Sample {
        forest: Forest,
        root: NodeId,
        a: NodeId,
        b: NodeId,
        c: NodeId,
        cmp: NodeId,
        predicate: NodeId,
    }

    fn sample() -> Sample {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a = forest.add_child(root, Step::child("a"));
        let b = forest.add_child(a, Step::child("b"));
        let c = forest.add_child(b, Step::child("c"));
        let cmp =
            forest.add_constraint(c, NodeKind::Compare(Comparison::string(CompareOp::Eq, "x")));
        let predicate = forest.add_predicate(b, vec![cmp], vec![]).unwrap();
        forest.set_user_given(b);
        forest.set_user_given(predicate);
        Sample { forest, root, a, b, c, cmp, predicate }
    }

    /// Drives one `<b><c>value</c></b>` subtree through the evaluator.
    fn feed_b<O: Observer>(
        eval: &mut Evaluator<'_, O>,
        s: &Sample,
        scope_a: u64,
        position: usize,
        location: &str,
        value: &str,
    ) -> Result<(), Interrupt> {
        let (b_name, c_name) = (ExpandedName::local("b"), ExpandedName::local("c"));
        let open_b = eval.advance();
        eval.hit(Context::new(scope_a, s.a), &element(&b_name, position, location), s.b)?;
        let open_c = eval.advance();
        eval.hit(Context::new(open_b, s.b), &element(&c_name, 1, "c"), s.c)?;
        eval.advance();
        eval.advance();
        let end = Event::End { name: &c_name, value };
        if value == "x" {
            eval.hit(Context::new(open_b, s.b), &end, s.cmp)?;
        }
        eval.close_scope(open_c, &[s.c]);
        eval.advance();
        eval.close_scope(open_b, &[s.b]);
        Ok(())
    }

    fn run(s: &Sample, limit: Option<NonZeroUsize>) -> (Evaluator<'_, Recorder>, bool) {
        let mut eval = Evaluator::with_observer(&s.forest, s.root, limit, Recorder::default());
        let a_name = ExpandedName::local("a");
        let stopped = (|| {
            eval.advance();
            let open_a = eval.advance();
            eval.hit(Context::new(1, s.root), &element(&a_name, 1, "/a[1]"), s.a)?;
            feed_b(&mut eval, s, open_a, 1, "/a[1]/b[1]", "x")?;
            feed_b(&mut eval, s, open_a, 2, "/a[1]/b[2]", "y")?;
            Ok::<(), Interrupt>(())
        })()
        .is_err();
        (eval, stopped)
    }

    fn xpath(nodes: Vec<NodeId>, predicates: Vec<NodeId>) -> XPath {
        XPath::new("test".to_string(), nodes, predicates)
    }

    #[test]
    fn predicate_filters_per_sibling() {
        let s = sample();
        let (eval, stopped) = run(&s, None);
        assert!(!stopped);
        assert_eq!(
            eval.results(&xpath(vec![s.b], vec![])).unwrap(),
            ["/a[1]/b[1]", "/a[1]/b[2]"]
        );
        assert_eq!(eval.results(&xpath(vec![], vec![s.predicate])).unwrap(), ["/a[1]/b[1]"]);
        // b[1] cleared on resolution, b[2] on close
        assert_eq!(eval.observer().cleared, [s.predicate, s.predicate]);
    }

    #[test]
    fn budget_stops_after_exactly_n() {
        let s = sample();
        let (eval, stopped) = run(&s, NonZeroUsize::new(2));
        assert!(stopped);
        assert_eq!(eval.committed(), 2);
        assert_eq!(eval.observer().stopped, Some(2));
        // b[1] and its predicate result; b[2] was never reached
        assert_eq!(eval.results(&xpath(vec![s.b], vec![])).unwrap(), ["/a[1]/b[1]"]);
        assert_eq!(eval.results(&xpath(vec![], vec![s.predicate])).unwrap(), ["/a[1]/b[1]"]);
    }

    #[test]
    fn passes_are_deterministic() {
        let s = sample();
        let (first, _) = run(&s, None);
        let (second, _) = run(&s, None);
        let query = xpath(vec![s.b], vec![s.predicate]);
        assert_eq!(first.results(&query).unwrap(), second.results(&query).unwrap());
    }

    #[test]
    fn function_defaults_and_joins() {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a = forest.add_child(root, Step::child("a"));
        let b = forest.add_child(a, Step::child("b"));
        let count = forest.add_constraint(b, NodeKind::Function(Function::Count));
        forest.set_user_given(count);
        let query = xpath(vec![count], vec![]);

        let idle = Evaluator::new(&forest, root, None);
        assert_eq!(idle.results(&query).unwrap(), ["0"]);

        let mut eval = Evaluator::new(&forest, root, None);
        let name = ExpandedName::local("b");
        for i in 1..=3 {
            eval.advance();
            let accepted = eval.hit(Context::new(1, b), &element(&name, i, "b"), count).unwrap();
            assert!(accepted);
        }
        assert_eq!(eval.results(&query).unwrap(), ["3"]);
    }

    #[test]
    fn single_hit_functions_collect_text_once() {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let b = forest.add_child(root, Step::child("b"));
        let string = forest.add_constraint(b, NodeKind::Function(Function::String));
        forest.set_user_given(string);
        let name = ExpandedName::local("b");

        let mut eval = Evaluator::new(&forest, root, NonZeroUsize::new(2));
        eval.advance();
        assert!(eval.hit(Context::new(0, b), &element(&name, 1, "/b[1]"), string).unwrap());
        for fragment in ["hel", "lo"] {
            eval.advance();
            assert!(eval.hit(Context::new(0, string), &Event::Text(fragment), string).unwrap());
        }
        eval.advance();
        // the second match does not re-fire
        assert!(!eval.hit(Context::new(0, b), &element(&name, 2, "/b[2]"), string).unwrap());
        assert_eq!(eval.results(&xpath(vec![string], vec![])).unwrap(), ["hello"]);
        // text folding did not spend the budget
        assert_eq!(eval.committed(), 1);
    }

    #[test]
    fn nested_predicates_survive_failed_siblings() {
        // /a[b[c]] over <a><b/><b><c/></b></a>
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a = forest.add_child(root, Step::child("a"));
        let b = forest.add_child(a, Step::child("b"));
        let c = forest.add_child(b, Step::child("c"));
        let inner = forest.add_predicate(b, vec![c], vec![]).unwrap();
        let outer = forest.add_predicate(a, vec![], vec![inner]).unwrap();
        forest.set_user_given(outer);
        let (a_name, b_name, c_name) =
            (ExpandedName::local("a"), ExpandedName::local("b"), ExpandedName::local("c"));

        let mut eval = Evaluator::new(&forest, root, None);
        eval.advance();
        let open_a = eval.advance();
        eval.hit(Context::new(1, root), &element(&a_name, 1, "/a[1]"), a).unwrap();
        let open_b1 = eval.advance();
        eval.hit(Context::new(open_a, a), &element(&b_name, 1, "/a[1]/b[1]"), b).unwrap();
        eval.advance();
        eval.close_scope(open_b1, &[b]);
        let open_b2 = eval.advance();
        eval.hit(Context::new(open_a, a), &element(&b_name, 2, "/a[1]/b[2]"), b).unwrap();
        let open_c = eval.advance();
        eval.hit(Context::new(open_b2, b), &element(&c_name, 1, "/a[1]/b[2]/c[1]"), c).unwrap();
        eval.advance();
        eval.close_scope(open_c, &[c]);
        eval.advance();
        eval.close_scope(open_b2, &[b]);

        assert_eq!(eval.results(&xpath(vec![], vec![outer])).unwrap(), ["/a[1]"]);
    }

    #[test]
    fn positions_reject_without_caching() {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let b = forest.add_child(root, Step::child("b"));
        let second = forest.add_constraint(b, NodeKind::Position(crate::model::Position::Exact(2)));
        forest.set_user_given(second);
        let name = ExpandedName::local("b");

        let mut eval = Evaluator::new(&forest, root, None);
        let ctx = Context::new(0, root);
        eval.advance();
        assert!(!eval.hit(ctx, &element(&name, 1, "/b[1]"), second).unwrap());
        eval.advance();
        assert!(eval.hit(ctx, &element(&name, 2, "/b[2]"), second).unwrap());
        assert_eq!(eval.results(&xpath(vec![second], vec![])).unwrap(), ["/b[2]"]);
    }

    #[test]
    fn unknown_nodes_are_structural_errors() {
        let s = sample();
        let mut other = Forest::new();
        let other_root = other.add_root();
        for i in 0..20 {
            other.add_child(other_root, Step::child(format!("z{i}")));
        }
        let stranger = other.add_child(other_root, Step::child("late"));
        let mut eval = Evaluator::new(&s.forest, s.root, None);
        eval.advance();
        assert_eq!(
            eval.hit(Context::new(0, s.root), &Event::Document, stranger),
            Err(Interrupt::Forest(ForestError::UnknownNode(stranger)))
        );
    }
}
