/*!
# Expression Forest

Compiled queries are merged into a shared forest of path steps, constraints
and predicates. Merging is by structural equivalence, so queries sharing a
prefix share its nodes and the prefix is evaluated once per event.

The forest is an arena: nodes are addressed by [`NodeId`] and every relation
between them (children, constraints, predicates, operands, member-of) is a
list of ids. Predicates reference their operands and every operand keeps a
back-reference ("member-of") to each predicate using it, so the evaluator
can walk "who depends on me" without re-scanning the forest.

A forest may hold several root instances. [`Forest::graft`] creates a
structurally identical copy of a root, and [`Forest::locate_in`] maps a node
of one instance onto the corresponding node of another.
*/
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Write as _};

use super::function::Function;
use super::path::{Link, StructuralPath};
use super::step::{Comparison, Position, Step};

/// Stable index of a node in a [`Forest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operands of a predicate. The predicate holds once every operand node and
/// every operand predicate has produced a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// Operand nodes (steps and constraints)
    pub nodes: Vec<NodeId>,
    /// Nested operand predicates
    pub predicates: Vec<NodeId>,
}

impl Predicate {
    fn sorted(ids: &[NodeId]) -> Vec<NodeId> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Operand-set equality.
    fn same_operands(&self, other: &Self) -> bool {
        Self::sorted(&self.nodes) == Self::sorted(&other.nodes)
            && Self::sorted(&self.predicates) == Self::sorted(&other.predicates)
    }
}

/// What a forest node represents.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Document root of a tree instance
    Root,
    /// An axis step
    Step(Step),
    /// A positional filter on the constrained node
    Position(Position),
    /// A value comparison on the constrained node
    Compare(Comparison),
    /// A function over the constrained node
    Function(Function),
    /// A filter attached to a host node
    Predicate(Predicate),
}

impl NodeKind {
    /// Type-specific structural equivalence. Roots are never equivalent:
    /// each one is a distinct tree instance.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Step(a), Self::Step(b)) => a == b,
            (Self::Position(a), Self::Position(b)) => a == b,
            (Self::Compare(a), Self::Compare(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Predicate(a), Self::Predicate(b)) => a.same_operands(b),
            _ => false,
        }
    }

    /// Equivalence across tree instances, where operand ids necessarily
    /// differ: predicates only need the same operand arity.
    fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Root, Self::Root) => true,
            (Self::Predicate(a), Self::Predicate(b)) => {
                a.nodes.len() == b.nodes.len() && a.predicates.len() == b.predicates.len()
            }
            _ => self.equivalent(other),
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "/"),
            Self::Step(step) => write!(f, "{step}"),
            Self::Position(position) => write!(f, "[{position}]"),
            Self::Compare(comparison) => write!(f, "[{comparison}]"),
            Self::Function(function) => write!(f, "{function}"),
            Self::Predicate(predicate) => {
                let operands: Vec<String> = predicate
                    .nodes
                    .iter()
                    .chain(&predicate.predicates)
                    .map(ToString::to_string)
                    .collect();
                write!(f, "predicate({})", operands.join(", "))
            }
        }
    }
}

/// A node of the expression forest.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    root: NodeId,
    /// Structural parent; for constraints the constrained node's parent
    parent: Option<NodeId>,
    /// Set when the node is a constraint of another node
    constraint_parent: Option<NodeId>,
    /// Set when the node is a predicate attached to a host
    host: Option<NodeId>,
    /// Which list of which node this node hangs from
    origin: Option<(NodeId, Link)>,
    children: Vec<NodeId>,
    constraints: Vec<NodeId>,
    predicates: Vec<NodeId>,
    member_of: Vec<NodeId>,
    has_attribute_child: bool,
    user_given: bool,
}

impl Node {
    const fn new(kind: NodeKind, root: NodeId) -> Self {
        Self {
            kind,
            root,
            parent: None,
            constraint_parent: None,
            host: None,
            origin: None,
            children: Vec::new(),
            constraints: Vec::new(),
            predicates: Vec::new(),
            member_of: Vec::new(),
            has_attribute_child: false,
            user_given: false,
        }
    }

    /// What the node represents.
    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Root of the tree instance the node belongs to.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Structural parent.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The node this node constrains, if it is a constraint.
    #[must_use]
    pub const fn constraint_parent(&self) -> Option<NodeId> {
        self.constraint_parent
    }

    /// The node this predicate is attached to, if it is a predicate.
    #[must_use]
    pub const fn host(&self) -> Option<NodeId> {
        self.host
    }

    /// Child axis steps, in insertion order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Constraints, in insertion order.
    #[must_use]
    pub fn constraints(&self) -> &[NodeId] {
        &self.constraints
    }

    /// Predicates attached to this node.
    #[must_use]
    pub fn predicates(&self) -> &[NodeId] {
        &self.predicates
    }

    /// Predicates that use this node as an operand.
    #[must_use]
    pub fn member_of(&self) -> &[NodeId] {
        &self.member_of
    }

    /// Whether any child step is on the attribute axis.
    #[must_use]
    pub const fn has_attribute_child(&self) -> bool {
        self.has_attribute_child
    }

    /// Whether the node is a result some query asked for.
    #[must_use]
    pub const fn user_given(&self) -> bool {
        self.user_given
    }

    /// Whether hits on this node need any caching work at all.
    #[must_use]
    pub fn result_interested(&self) -> bool {
        self.user_given || !self.predicates.is_empty() || !self.member_of.is_empty()
    }
}

/// Structural anomalies in a forest. These are errors of whoever built the
/// forest and are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForestError {
    /// The id does not belong to this forest.
    UnknownNode(NodeId),
    /// The id was expected to be a root instance.
    NotARoot(NodeId),
    /// A predicate operand was expected to be a predicate.
    NotAPredicate(NodeId),
    /// A predicate operand is not attached to the host's tree instance.
    DetachedOperand {
        /// Node the predicate was to be attached to
        host: NodeId,
        /// The offending operand
        operand: NodeId,
    },
    /// No structural counterpart of the node exists in the target root.
    Unlocatable {
        /// Node being located
        node: NodeId,
        /// Target root instance
        root: NodeId,
        /// Route that could not be replayed
        path: StructuralPath,
    },
}

impl Error for ForestError {}

impl Display for ForestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "node {id} does not exist"),
            Self::NotARoot(id) => write!(f, "node {id} is not a root"),
            Self::NotAPredicate(id) => write!(f, "operand {id} is not a predicate"),
            Self::DetachedOperand { host, operand } => write!(
                f,
                "predicate on {host} references {operand}, which was never merged into its tree"
            ),
            Self::Unlocatable { node, root, path } => {
                write!(f, "node {node} has no counterpart at {path} under root {root}")
            }
        }
    }
}

/// Arena holding every compiled node.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<Node>,
}

impl Forest {
    /// Constructs an empty forest.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of nodes across all root instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest has no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node, if the id belongs to this forest.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Look up a node.
    ///
    /// # Panics
    ///
    /// Panics if the id was not produced by this forest.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Create a new, empty root instance.
    pub fn add_root(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.push(Node::new(NodeKind::Root, id))
    }

    /// Add an axis step below `parent`, returning an existing structurally
    /// equivalent child if there is one.
    pub fn add_child(&mut self, parent: NodeId, step: Step) -> NodeId {
        let existing = self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| matches!(&self.nodes[c.0].kind, NodeKind::Step(s) if *s == step));
        if let Some(child) = existing {
            return child;
        }

        let is_attribute = step.is_attribute();
        let parent_node = &self.nodes[parent.0];
        let link = Link::Child(parent_node.children.len());
        let mut node = Node::new(NodeKind::Step(step), parent_node.root);
        node.parent = Some(parent);
        node.origin = Some((parent, link));

        let id = self.push(node);
        let parent_node = &mut self.nodes[parent.0];
        parent_node.children.push(id);
        if is_attribute {
            parent_node.has_attribute_child = true;
        }
        id
    }

    /// Add a constraint (position, comparison or function) to `node`,
    /// returning an existing equivalent constraint if there is one.
    ///
    /// The constraint shares the constrained node's structural parent.
    pub fn add_constraint(&mut self, node: NodeId, kind: NodeKind) -> NodeId {
        debug_assert!(
            matches!(
                kind,
                NodeKind::Position(_) | NodeKind::Compare(_) | NodeKind::Function(_)
            ),
            "{kind} cannot be a constraint"
        );
        let existing = self.nodes[node.0]
            .constraints
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].kind.equivalent(&kind));
        if let Some(constraint) = existing {
            return constraint;
        }

        let target = &self.nodes[node.0];
        let link = Link::Constraint(target.constraints.len());
        let mut constraint = Node::new(kind, target.root);
        constraint.parent = target.parent;
        constraint.constraint_parent = Some(node);
        constraint.origin = Some((node, link));

        let id = self.push(constraint);
        self.nodes[node.0].constraints.push(id);
        id
    }

    /// Attach a predicate over the given operands to `host`, returning an
    /// existing predicate with the same operand sets if there is one.
    ///
    /// Every operand gains a member-of back-reference to the predicate.
    ///
    /// # Errors
    ///
    /// Returns a [`ForestError`] if an operand does not exist, belongs to a
    /// different tree instance, is not attached to any parent, or (for
    /// operand predicates) is not a predicate.
    pub fn add_predicate(
        &mut self,
        host: NodeId,
        nodes: Vec<NodeId>,
        predicates: Vec<NodeId>,
    ) -> Result<NodeId, ForestError> {
        let root = self.get(host).ok_or(ForestError::UnknownNode(host))?.root;
        for &operand in &nodes {
            let node = self.get(operand).ok_or(ForestError::UnknownNode(operand))?;
            if node.root != root || node.parent.is_none() || node.host.is_some() {
                return Err(ForestError::DetachedOperand { host, operand });
            }
        }
        for &operand in &predicates {
            let node = self.get(operand).ok_or(ForestError::UnknownNode(operand))?;
            if !matches!(node.kind, NodeKind::Predicate(_)) {
                return Err(ForestError::NotAPredicate(operand));
            }
            if node.root != root {
                return Err(ForestError::DetachedOperand { host, operand });
            }
        }

        let predicate = Predicate { nodes, predicates };
        let kind = NodeKind::Predicate(predicate.clone());
        let existing = self.nodes[host.0]
            .predicates
            .iter()
            .copied()
            .find(|&p| self.nodes[p.0].kind.equivalent(&kind));
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let link = Link::Predicate(self.nodes[host.0].predicates.len());
        let mut node = Node::new(kind, root);
        node.host = Some(host);
        node.origin = Some((host, link));

        let id = self.push(node);
        self.nodes[host.0].predicates.push(id);
        for operand in predicate.nodes.into_iter().chain(predicate.predicates) {
            let member_of = &mut self.nodes[operand.0].member_of;
            if !member_of.contains(&id) {
                member_of.push(id);
            }
        }
        Ok(id)
    }

    /// Mark a node as a result the caller asked for.
    pub fn set_user_given(&mut self, id: NodeId) {
        self.nodes[id.0].user_given = true;
    }

    /// Whether `node` lies strictly below `ancestor` along structural parent
    /// links. Predicates are positioned at their host.
    #[must_use]
    pub fn is_strict_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let start = &self.nodes[node.0];
        if let Some(host) = start.host {
            return self.is_strict_descendant(host, ancestor);
        }
        let mut current = start.parent;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// The route from the node's root down to the node.
    #[must_use]
    pub fn structural_path(&self, id: NodeId) -> StructuralPath {
        let mut links = Vec::new();
        let mut current = id;
        while let Some((from, link)) = self.nodes[current.0].origin {
            links.push(link);
            current = from;
        }
        links.reverse();
        StructuralPath::new(links)
    }

    /// Find the node structurally corresponding to `id` within the tree
    /// instance rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns a [`ForestError`] if `root` is not a root, or if the
    /// structural path of `id` cannot be replayed below `root`.
    pub fn locate_in(&self, id: NodeId, root: NodeId) -> Result<NodeId, ForestError> {
        let source = self.get(id).ok_or(ForestError::UnknownNode(id))?;
        let target = self.get(root).ok_or(ForestError::UnknownNode(root))?;
        if !matches!(target.kind, NodeKind::Root) {
            return Err(ForestError::NotARoot(root));
        }
        if source.root == root {
            return Ok(id);
        }

        let path = self.structural_path(id);
        let unlocatable = || ForestError::Unlocatable { node: id, root, path: path.clone() };
        let mut current = root;
        for link in path.links() {
            let node = &self.nodes[current.0];
            let next = match *link {
                Link::Child(i) => node.children.get(i),
                Link::Constraint(i) => node.constraints.get(i),
                Link::Predicate(i) => node.predicates.get(i),
            };
            current = *next.ok_or_else(unlocatable)?;
        }

        if self.nodes[current.0].kind.same_shape(&source.kind) {
            Ok(current)
        } else {
            Err(unlocatable())
        }
    }

    /// Create a structurally identical copy of the tree instance at `root`,
    /// returning the new root.
    ///
    /// # Errors
    ///
    /// Returns a [`ForestError`] if `root` is not a root instance.
    pub fn graft(&mut self, root: NodeId) -> Result<NodeId, ForestError> {
        let source = self.get(root).ok_or(ForestError::UnknownNode(root))?;
        if !matches!(source.kind, NodeKind::Root) {
            return Err(ForestError::NotARoot(root));
        }

        let copy = self.add_root();
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::from([(root, copy)]);
        let remap = |mapping: &HashMap<NodeId, NodeId>, ids: &[NodeId]| {
            ids.iter()
                .map(|id| mapping.get(id).copied().ok_or(ForestError::UnknownNode(*id)))
                .collect::<Result<Vec<_>, _>>()
        };

        // Arena order is creation order: a node's parent, host and operands
        // always precede it.
        for index in root.0 + 1..copy.0 {
            let node = &self.nodes[index];
            if node.root != root {
                continue;
            }
            let Some((from, _)) = node.origin else { continue };
            let (kind, user_given) = (node.kind.clone(), node.user_given);
            let from = *mapping.get(&from).ok_or(ForestError::UnknownNode(from))?;

            let id = match kind {
                NodeKind::Step(step) => self.add_child(from, step),
                NodeKind::Predicate(predicate) => {
                    let nodes = remap(&mapping, &predicate.nodes)?;
                    let predicates = remap(&mapping, &predicate.predicates)?;
                    self.add_predicate(from, nodes, predicates)?
                }
                NodeKind::Root => continue,
                constraint => self.add_constraint(from, constraint),
            };
            if user_given {
                self.set_user_given(id);
            }
            mapping.insert(NodeId(index), id);
        }
        Ok(copy)
    }

    /// Render the tree instance at `root` as an indented outline, one node
    /// per line, annotated with user-given flags, attached predicates and
    /// member-of references.
    #[must_use]
    pub fn dump(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.dump_node(root, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id.0];
        let _ = write!(out, "{:indent$}{id} {}", "", node.kind, indent = depth * 2);
        if node.user_given {
            let _ = write!(out, " --> user-given");
        }
        for &predicate in &node.predicates {
            let _ = write!(out, " --> {predicate} {}", self.nodes[predicate.0].kind);
        }
        if !node.member_of.is_empty() {
            let members: Vec<String> = node.member_of.iter().map(ToString::to_string).collect();
            let _ = write!(out, " ==> {}", members.join(" "));
        }
        out.push('\n');
        for &child in node.constraints.iter().chain(&node.children) {
            self.dump_node(child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Axis, CompareOp, ExpandedName, NodeTest};

    /// Builds `/a/b[c='x']` plus `/a/b` into a fresh forest, returning
    /// (forest, root, b, c, comparison, predicate).
    fn sample() -> (Forest, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a = forest.add_child(root, Step::child("a"));
        let b = forest.add_child(a, Step::child("b"));
        let c = forest.add_child(b, Step::child("c"));
        let cmp = forest.add_constraint(
            c,
            NodeKind::Compare(Comparison::string(CompareOp::Eq, "x")),
        );
        let predicate = forest.add_predicate(b, vec![cmp], vec![]).unwrap();
        forest.set_user_given(b);
        forest.set_user_given(predicate);
        (forest, root, b, c, cmp, predicate)
    }

    #[test]
    fn add_child_deduplicates() {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a1 = forest.add_child(root, Step::child("a"));
        let a2 = forest.add_child(root, Step::child("a"));
        let d = forest.add_child(root, Step::new(Axis::Descendant, NodeTest::Name(ExpandedName::local("a"))));
        assert_eq!(a1, a2);
        assert_ne!(a1, d);
        assert_eq!(forest.node(root).children(), &[a1, d]);
        assert_eq!(forest.node(a1).parent(), Some(root));
    }

    #[test]
    fn attribute_child_sets_flag() {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a = forest.add_child(root, Step::child("a"));
        assert!(!forest.node(a).has_attribute_child());
        forest.add_child(a, Step::attribute("id"));
        assert!(forest.node(a).has_attribute_child());
    }

    #[test]
    fn constraints_share_parent() {
        let (forest, _, b, c, cmp, _) = sample();
        let constraint = forest.node(cmp);
        assert_eq!(constraint.constraint_parent(), Some(c));
        assert_eq!(constraint.parent(), Some(b));
        assert!(forest.is_strict_descendant(cmp, b));
        assert!(!forest.is_strict_descendant(b, cmp));
    }

    #[test]
    fn add_predicate_registers_member_of() {
        let (mut forest, _, b, _, cmp, predicate) = sample();
        assert_eq!(forest.node(cmp).member_of(), &[predicate]);
        assert_eq!(forest.node(b).predicates(), &[predicate]);
        assert_eq!(forest.node(predicate).host(), Some(b));

        // same operands merge
        let again = forest.add_predicate(b, vec![cmp, cmp], vec![]).unwrap();
        assert_eq!(again, predicate);
        assert_eq!(forest.node(cmp).member_of(), &[predicate]);
    }

    #[test]
    fn add_predicate_rejects_detached_operands() {
        let (mut forest, _, b, _, _, predicate) = sample();
        let other = forest.add_root();
        let foreign = forest.add_child(other, Step::child("z"));
        assert_eq!(
            forest.add_predicate(b, vec![foreign], vec![]),
            Err(ForestError::DetachedOperand { host: b, operand: foreign })
        );
        assert_eq!(
            forest.add_predicate(b, vec![other], vec![]),
            Err(ForestError::DetachedOperand { host: b, operand: other })
        );
        assert_eq!(
            forest.add_predicate(b, vec![], vec![b]),
            Err(ForestError::NotAPredicate(b))
        );
        assert!(forest.add_predicate(b, vec![predicate], vec![]).is_err());
    }

    #[test]
    fn nested_predicates_are_descendants_via_host() {
        // /a[b[c]]
        let mut forest = Forest::new();
        let root = forest.add_root();
        let a = forest.add_child(root, Step::child("a"));
        let b = forest.add_child(a, Step::child("b"));
        let c = forest.add_child(b, Step::child("c"));
        let inner = forest.add_predicate(b, vec![c], vec![]).unwrap();
        let outer = forest.add_predicate(a, vec![], vec![inner]).unwrap();
        assert_eq!(forest.node(inner).member_of(), &[outer]);
        assert!(forest.is_strict_descendant(inner, a));
        assert!(!forest.is_strict_descendant(inner, b));
        assert!(!forest.is_strict_descendant(outer, a));
    }

    #[test]
    fn structural_path_and_locate() {
        let (mut forest, root, b, _, cmp, predicate) = sample();
        assert_eq!(
            forest.structural_path(cmp).links(),
            &[Link::Child(0), Link::Child(0), Link::Child(0), Link::Constraint(0)]
        );
        assert_eq!(forest.locate_in(cmp, root), Ok(cmp));

        let copy = forest.graft(root).unwrap();
        let located = forest.locate_in(predicate, copy).unwrap();
        assert_ne!(located, predicate);
        assert_eq!(forest.node(located).root(), copy);
        assert!(forest.node(located).user_given());
        assert_eq!(forest.structural_path(located), forest.structural_path(predicate));
        let b_copy = forest.locate_in(b, copy).unwrap();
        assert_eq!(forest.node(b_copy).predicates(), &[located]);
    }

    #[test]
    fn graft_rewires_member_of() {
        let (mut forest, root, _, _, cmp, _) = sample();
        let copy = forest.graft(root).unwrap();
        let cmp_copy = forest.locate_in(cmp, copy).unwrap();
        let member = forest.node(cmp_copy).member_of()[0];
        assert_eq!(forest.node(member).root(), copy);
        assert_eq!(forest.dump(root).lines().count(), forest.dump(copy).lines().count());
    }

    #[test]
    fn locate_fails_fast() {
        let (mut forest, _, b, ..) = sample();
        let empty = forest.add_root();
        assert!(matches!(
            forest.locate_in(b, empty),
            Err(ForestError::Unlocatable { .. })
        ));
        assert_eq!(forest.locate_in(b, b), Err(ForestError::NotARoot(b)));
        assert_eq!(forest.graft(b), Err(ForestError::NotARoot(b)));
    }

    #[test]
    fn dump_annotates() {
        let (forest, root, ..) = sample();
        let dump = forest.dump(root);
        assert!(dump.contains("child::b --> user-given --> #5 predicate(#4)"), "{dump}");
        assert!(dump.contains("[.='x'] ==> #5"), "{dump}");
    }
}
