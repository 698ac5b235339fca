/*!
# Query Compiler

Compiles parsed queries into one shared [`Forest`]. Every location path is
merged step by step through [`Forest::add_child`], positional and value
requirements become constraints, and filters become predicates attached to
the step they filter. Exactly the nodes standing for a query's result are
marked user-given.

```
use xsniff::query::QuerySet;
let mut set = QuerySet::new();
set.add_str("/a/b").unwrap();
set.add_str("/a/b[c='x']").unwrap();
// the `/a/b` prefix is shared
let b = set.queries()[0].nodes()[0];
assert_eq!(set.forest().node(set.queries()[1].predicates()[0]).host(), Some(b));
```
*/
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use super::{Condition, Literal, LocationPath, Predicate, Query, QueryParseError, Test, parse_query};
use crate::model::{
    Axis, Comparison, ExpandedName, Forest, ForestError, NodeId, NodeKind, NodeTest, Step,
};

/// Namespace bound to the `xml` prefix in every query set.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// One compiled query: the forest nodes and predicates whose cached results
/// make up its result sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    text: String,
    nodes: Vec<NodeId>,
    predicates: Vec<NodeId>,
}

impl XPath {
    pub(crate) const fn new(text: String, nodes: Vec<NodeId>, predicates: Vec<NodeId>) -> Self {
        Self { text, nodes, predicates }
    }

    /// The query as it was given.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Result nodes.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Result predicates.
    #[must_use]
    pub fn predicates(&self) -> &[NodeId] {
        &self.predicates
    }
}

/// Represents errors that can occur while compiling a query.
#[derive(Debug)]
pub enum CompileError {
    /// The query text did not parse.
    Parse(QueryParseError),
    /// The query uses a construct the streaming evaluator cannot handle.
    Unsupported(String),
    /// A name uses a prefix with no declared namespace.
    UnknownPrefix(String),
    /// A `matches` pattern is not a valid regular expression.
    Regex(regex::Error),
    /// Merging into the forest failed.
    Forest(ForestError),
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Regex(err) => Some(err),
            Self::Forest(err) => Some(err),
            Self::Unsupported(_) | Self::UnknownPrefix(_) => None,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Unsupported(what) => write!(f, "Unsupported: {what}"),
            Self::UnknownPrefix(prefix) => write!(f, "Undeclared namespace prefix: {prefix}"),
            Self::Regex(err) => write!(f, "Invalid pattern: {err}"),
            Self::Forest(err) => write!(f, "{err}"),
        }
    }
}

impl From<QueryParseError> for CompileError {
    fn from(err: QueryParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<regex::Error> for CompileError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err)
    }
}

impl From<ForestError> for CompileError {
    fn from(err: ForestError) -> Self {
        Self::Forest(err)
    }
}

/// The node selected by a compiled path, and the filter attached to it.
#[derive(Debug, Clone, Copy)]
struct Compiled {
    node: NodeId,
    filter: Option<NodeId>,
}

/// A set of queries compiled into one shared forest, evaluated together in
/// a single pass.
#[derive(Debug, Clone)]
pub struct QuerySet {
    forest: Forest,
    root: NodeId,
    namespaces: HashMap<String, String>,
    queries: Vec<XPath>,
}

impl Default for QuerySet {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySet {
    /// Constructs an empty query set.
    #[must_use]
    pub fn new() -> Self {
        let mut forest = Forest::new();
        let root = forest.add_root();
        let namespaces = HashMap::from([("xml".to_string(), XML_NAMESPACE.to_string())]);
        Self { forest, root, namespaces, queries: Vec::new() }
    }

    /// Bind a prefix used in queries to a namespace URI.
    pub fn declare_namespace<P: Into<String>, U: Into<String>>(&mut self, prefix: P, uri: U) {
        self.namespaces.insert(prefix.into(), uri.into());
    }

    /// The shared forest.
    #[must_use]
    pub const fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Root of the forest's primary tree instance.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Compiled queries, in the order they were added.
    #[must_use]
    pub fn queries(&self) -> &[XPath] {
        &self.queries
    }

    /// Number of compiled queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Whether no query was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Parse and compile a query, returning its index.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] if the query does not parse or cannot be
    /// compiled.
    pub fn add_str(&mut self, text: &str) -> Result<usize, CompileError> {
        let query = parse_query(text)?;
        self.compile(text.trim().to_string(), &query)
    }

    /// Compile a parsed query, returning its index.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] if the query cannot be compiled.
    pub fn add(&mut self, query: &Query) -> Result<usize, CompileError> {
        self.compile(query.to_string(), query)
    }

    fn compile(&mut self, text: String, query: &Query) -> Result<usize, CompileError> {
        // compile into a scratch copy so a failing query leaves no trace
        let mut scratch = self.clone();
        let (nodes, predicates) = scratch.compile_query(query)?;
        *self = scratch;
        self.queries.push(XPath::new(text, nodes, predicates));
        Ok(self.queries.len() - 1)
    }

    fn compile_query(&mut self, query: &Query) -> Result<(Vec<NodeId>, Vec<NodeId>), CompileError> {
        let mut nodes = Vec::new();
        let mut predicates = Vec::new();
        match query {
            Query::Path(path) => self.compile_result(path, &mut nodes, &mut predicates)?,
            Query::Union(paths) => {
                for path in paths {
                    self.compile_result(path, &mut nodes, &mut predicates)?;
                }
            }
            Query::Function(function, path) => {
                if path.is_filtered() {
                    return Err(CompileError::Unsupported(format!(
                        "{}() over a filtered path",
                        function.name()
                    )));
                }
                let target = self.compile_path(self.root, path, false)?;
                let node = self.forest.add_constraint(target.node, NodeKind::Function(*function));
                self.forest.set_user_given(node);
                nodes.push(node);
            }
        }
        Ok((nodes, predicates))
    }

    fn compile_result(
        &mut self,
        path: &LocationPath,
        nodes: &mut Vec<NodeId>,
        predicates: &mut Vec<NodeId>,
    ) -> Result<(), CompileError> {
        let compiled = self.compile_path(self.root, path, false)?;
        match compiled.filter {
            Some(filter) => {
                self.forest.set_user_given(filter);
                predicates.push(filter);
            }
            None => {
                self.forest.set_user_given(compiled.node);
                nodes.push(compiled.node);
            }
        }
        Ok(())
    }

    /// Merge a path below `context`.
    fn compile_path(
        &mut self,
        context: NodeId,
        path: &LocationPath,
        nested: bool,
    ) -> Result<Compiled, CompileError> {
        if nested && path.absolute {
            return Err(CompileError::Unsupported(format!("absolute path {path} in a predicate")));
        }
        if path.steps.is_empty() {
            return Err(CompileError::Unsupported("empty location path".to_string()));
        }

        let mut current = context;
        let mut filter = None;
        let last = path.steps.len() - 1;
        for (i, step) in path.steps.iter().enumerate() {
            let test = self.resolve(&step.test)?;
            if step.deep && step.axis == Axis::Attribute {
                // `//@x` is `//*/@x`
                current = self.forest.add_child(current, Step::new(Axis::Descendant, NodeTest::Any));
            }
            let axis = if step.deep && step.axis == Axis::Child { Axis::Descendant } else { step.axis };
            if axis == Axis::Attribute && test == NodeTest::Text {
                return Err(CompileError::Unsupported("text() on the attribute axis".to_string()));
            }
            current = self.forest.add_child(current, Step::new(axis, test));

            let mut conditions: Vec<&Condition> = Vec::new();
            for predicate in &step.predicates {
                match predicate {
                    Predicate::Position(position) => {
                        if !conditions.is_empty() {
                            return Err(CompileError::Unsupported(format!(
                                "position after a filter in {step}"
                            )));
                        }
                        current = self.forest.add_constraint(current, NodeKind::Position(*position));
                    }
                    Predicate::Filter(parts) => conditions.extend(parts),
                }
            }
            if !conditions.is_empty() {
                if i != last {
                    return Err(CompileError::Unsupported(format!(
                        "filter on {step}, which is not the last step"
                    )));
                }
                filter = Some(self.compile_filter(current, &conditions)?);
            }
        }
        Ok(Compiled { node: current, filter })
    }

    /// Attach a predicate over the conditions to `host`.
    fn compile_filter(
        &mut self,
        host: NodeId,
        conditions: &[&Condition],
    ) -> Result<NodeId, CompileError> {
        let mut nodes = Vec::new();
        let mut predicates = Vec::new();
        for condition in conditions {
            match condition {
                Condition::Exists(path) => {
                    let operand = self.compile_path(host, path, true)?;
                    match operand.filter {
                        Some(filter) => predicates.push(filter),
                        None => nodes.push(operand.node),
                    }
                }
                Condition::Compare(path, op, literal) => {
                    let comparison = match literal {
                        Literal::String(s) => Comparison::string(*op, s.as_str()),
                        Literal::Number(n) => Comparison::number(*op, *n),
                    };
                    nodes.push(self.compile_comparison(host, path, comparison)?);
                }
                Condition::Matches(path, pattern) => {
                    let comparison = Comparison::matches(pattern.as_str())?;
                    nodes.push(self.compile_comparison(host, path, comparison)?);
                }
            }
        }
        Ok(self.forest.add_predicate(host, nodes, predicates)?)
    }

    fn compile_comparison(
        &mut self,
        host: NodeId,
        path: &LocationPath,
        comparison: Comparison,
    ) -> Result<NodeId, CompileError> {
        if path.is_filtered() {
            return Err(CompileError::Unsupported(format!("comparison on filtered path {path}")));
        }
        let operand = self.compile_path(host, path, true)?;
        Ok(self.forest.add_constraint(operand.node, NodeKind::Compare(comparison)))
    }

    fn resolve(&self, test: &Test) -> Result<NodeTest, CompileError> {
        match test {
            Test::Any => Ok(NodeTest::Any),
            Test::Text => Ok(NodeTest::Text),
            Test::Name(name) => {
                let namespace = match &name.prefix {
                    Some(prefix) => Some(
                        self.namespaces
                            .get(prefix)
                            .cloned()
                            .ok_or_else(|| CompileError::UnknownPrefix(prefix.clone()))?,
                    ),
                    None => None,
                };
                Ok(NodeTest::Name(ExpandedName::new(namespace, name.local.as_str())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Function;

    #[test]
    fn shared_prefixes_are_merged() {
        let mut set = QuerySet::new();
        set.add_str("/a/b").unwrap();
        set.add_str("/a/b[c='x']").unwrap();
        set.add_str("/a/c").unwrap();

        let forest = set.forest();
        let b = set.queries()[0].nodes()[0];
        let predicate = set.queries()[1].predicates()[0];
        assert!(set.queries()[1].nodes().is_empty());
        assert_eq!(forest.node(predicate).host(), Some(b));
        assert!(forest.node(b).user_given());
        assert!(forest.node(predicate).user_given());
        // root -> a -> {b, c}
        let a = forest.node(set.root()).children()[0];
        assert_eq!(forest.node(set.root()).children().len(), 1);
        assert_eq!(forest.node(a).children().len(), 2);
    }

    #[test]
    fn comparison_becomes_constraint_operand() {
        let mut set = QuerySet::new();
        set.add_str("/a/b[c='x']").unwrap();
        let forest = set.forest();
        let predicate = set.queries()[0].predicates()[0];
        let NodeKind::Predicate(definition) = forest.node(predicate).kind() else {
            panic!("expected a predicate")
        };
        let cmp = definition.nodes[0];
        assert!(matches!(forest.node(cmp).kind(), NodeKind::Compare(_)));
        assert!(!forest.node(cmp).user_given());
        assert_eq!(forest.node(cmp).member_of(), &[predicate]);
    }

    #[test]
    fn positions_are_constraints() {
        let mut set = QuerySet::new();
        set.add_str("/a/b[2]/c").unwrap();
        let forest = set.forest();
        let c = set.queries()[0].nodes()[0];
        let position = forest.node(c).parent().unwrap();
        assert!(matches!(forest.node(position).kind(), NodeKind::Position(_)));
        assert!(forest.node(position).constraint_parent().is_some());
    }

    #[test]
    fn descendant_attributes_expand() {
        let mut set = QuerySet::new();
        set.add_str("//@id").unwrap();
        let forest = set.forest();
        let id = set.queries()[0].nodes()[0];
        let any = forest.node(id).parent().unwrap();
        assert_eq!(forest.node(any).kind().to_string(), "descendant::*");
        assert!(forest.node(any).has_attribute_child());
    }

    #[test]
    fn functions_are_user_given_constraints() {
        let mut set = QuerySet::new();
        set.add_str("count(/a/b)").unwrap();
        let forest = set.forest();
        let count = set.queries()[0].nodes()[0];
        assert!(matches!(forest.node(count).kind(), NodeKind::Function(Function::Count)));
        assert!(forest.node(count).user_given());
    }

    #[test]
    fn nested_filters_become_operand_predicates() {
        let mut set = QuerySet::new();
        set.add_str("/a[b[c]]").unwrap();
        let forest = set.forest();
        let outer = set.queries()[0].predicates()[0];
        let NodeKind::Predicate(definition) = forest.node(outer).kind() else {
            panic!("expected a predicate")
        };
        assert!(definition.nodes.is_empty());
        let inner = definition.predicates[0];
        assert_eq!(forest.node(inner).member_of(), &[outer]);
        assert!(!forest.node(inner).user_given());
    }

    #[test]
    fn namespaces_resolve() {
        let mut set = QuerySet::new();
        assert!(matches!(set.add_str("/bk:book"), Err(CompileError::UnknownPrefix(p)) if p == "bk"));
        assert!(set.is_empty());
        set.declare_namespace("bk", "urn:books");
        set.add_str("/bk:book/@xml:lang").unwrap();
        let forest = set.forest();
        let lang = set.queries()[0].nodes()[0];
        assert_eq!(
            forest.node(lang).kind().to_string(),
            format!("attribute::{{{XML_NAMESPACE}}}lang")
        );
    }

    #[test]
    fn unsupported_constructs() {
        let mut set = QuerySet::new();
        for query in ["/a[b]/c", "/a[b][2]", "count(/a[b])", "/a[c[d]='x']"] {
            assert!(
                matches!(set.add_str(query), Err(CompileError::Unsupported(_))),
                "{query}"
            );
        }
        assert!(matches!(set.add_str("/a[matches(b, '(')]"), Err(CompileError::Regex(_))));
        assert!(matches!(set.add_str("/a["), Err(CompileError::Parse(_))));
        assert_eq!(set.forest().len(), 1, "failed queries leave the forest untouched");
    }

    #[test]
    fn union_collects_every_branch() {
        let mut set = QuerySet::new();
        let index = set.add_str("/a/b | /a/c[d]").unwrap();
        let xpath = &set.queries()[index];
        assert_eq!(xpath.text(), "/a/b | /a/c[d]");
        assert_eq!(xpath.nodes().len(), 1);
        assert_eq!(xpath.predicates().len(), 1);
    }
}
