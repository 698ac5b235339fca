/*!
# Query AST and Builder

Defines the AST of XPath queries and exposes a fluent API for constructing
location paths using a builder pattern.

# Examples

To construct the path `/a/b[2]` you can use:
```
use xsniff::query::{PathBuilder, Query};
let path = PathBuilder::absolute().child("a").child("b").at(2).build();
assert_eq!(path.to_string(), "/a/b[2]");
```

In addition, a query can be parsed from a raw string:

```
use xsniff::query::Query;
let query: Query = "count(//item[@sku])".parse().expect("Invalid query");
assert_eq!(query.to_string(), "count(//item[@sku])");
```
*/
use std::{fmt::Display, str::FromStr};

use super::{QueryParseError, parse_query};
use crate::model::{Axis, CompareOp, Function, Position, function::format_number};

/// A complete query, as evaluated against a document.
#[derive(Debug, PartialEq, Clone)]
pub enum Query {
    /// A single location path, e.g. `/a/b`
    Path(LocationPath),
    /// A union of location paths, e.g. `/a/b | /a/c`
    Union(Vec<LocationPath>),
    /// A function over a location path, e.g. `count(/a/b)`
    Function(Function, LocationPath),
}

impl Query {
    /// The location paths the query is made of.
    #[must_use]
    pub fn paths(&self) -> Vec<&LocationPath> {
        match self {
            Self::Path(path) | Self::Function(_, path) => vec![path],
            Self::Union(paths) => paths.iter().collect(),
        }
    }
}

/// A sequence of steps, either absolute (from the document root) or relative
/// to the step a predicate is attached to.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct LocationPath {
    /// Whether the path starts at the document root
    pub absolute: bool,
    /// Steps of the path, outermost first
    pub steps: Vec<Step>,
}

impl LocationPath {
    /// Whether any step carries a filter predicate.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.predicates.iter().any(|p| matches!(p, Predicate::Filter(_))))
    }
}

/// A qualified name as written in a query, prefix unresolved.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct QName {
    /// Namespace prefix, if any
    pub prefix: Option<String>,
    /// Local part
    pub local: String,
}

impl QName {
    /// Split a name written as `prefix:local` or `local`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.split_once(':') {
            Some((prefix, local)) => {
                Self { prefix: Some(prefix.to_string()), local: local.to_string() }
            }
            None => Self { prefix: None, local: name.to_string() },
        }
    }
}

impl Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// What a step selects.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Test {
    /// A named element or attribute
    Name(QName),
    /// Any element or attribute, `*`
    Any,
    /// Character data, `text()`
    Text,
}

/// One step of a location path.
#[derive(Debug, PartialEq, Clone)]
pub struct Step {
    /// Whether the step was introduced by `//`
    pub deep: bool,
    /// Axis the step moves along
    pub axis: Axis,
    /// Test selected items must pass
    pub test: Test,
    /// Bracketed predicates, in source order
    pub predicates: Vec<Predicate>,
}

impl Step {
    /// A step with no predicates.
    #[must_use]
    pub const fn new(deep: bool, axis: Axis, test: Test) -> Self {
        Self { deep, axis, test, predicates: Vec::new() }
    }
}

/// A bracketed predicate.
#[derive(Debug, PartialEq, Clone)]
pub enum Predicate {
    /// `[n]` or `[position() op n]`
    Position(Position),
    /// `and`-joined conditions
    Filter(Vec<Condition>),
}

/// A literal compared against.
#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    /// A quoted string
    String(String),
    /// A number
    Number(f64),
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) if s.contains('\'') => write!(f, "\"{s}\""),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

/// One condition of a filter predicate.
#[derive(Debug, PartialEq, Clone)]
pub enum Condition {
    /// The path selects something, e.g. `[c]`
    Exists(LocationPath),
    /// A value selected by the path compares to a literal, e.g. `[c='x']`
    Compare(LocationPath, CompareOp, Literal),
    /// A value selected by the path matches a regex, e.g. `[matches(c, 'x+')]`
    Matches(LocationPath, String),
}

impl Condition {
    /// Helper for ergonomic construction of `[path='value']` conditions.
    pub fn equals<T: Into<String>>(path: LocationPath, value: T) -> Self {
        Self::Compare(path, CompareOp::Eq, Literal::String(value.into()))
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Union(paths) => {
                let joined =
                    paths.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ");
                write!(f, "{joined}")
            }
            Self::Function(function, path) => write!(f, "{}({path})", function.name()),
        }
    }
}

impl Display for LocationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if step.deep {
                write!(f, "//")?;
            } else if i > 0 || self.absolute {
                write!(f, "/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.axis {
            Axis::Attribute => write!(f, "@")?,
            Axis::Descendant => write!(f, "descendant::")?,
            Axis::Child => {}
        }
        match &self.test {
            Test::Name(name) => write!(f, "{name}")?,
            Test::Any => write!(f, "*")?,
            Test::Text => write!(f, "text()")?,
        }
        for predicate in &self.predicates {
            write!(f, "[{predicate}]")?;
        }
        Ok(())
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(Position::Exact(n)) => write!(f, "{n}"),
            Self::Position(position) => write!(f, "{position}"),
            Self::Filter(conditions) => {
                let joined =
                    conditions.iter().map(ToString::to_string).collect::<Vec<_>>().join(" and ");
                write!(f, "{joined}")
            }
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exists(path) => write!(f, "{path}"),
            Self::Compare(path, op, literal) => write!(f, "{path}{op}{literal}"),
            Self::Matches(path, pattern) => {
                write!(f, "matches({path}, {})", Literal::String(pattern.clone()))
            }
        }
    }
}

impl FromStr for Query {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_query(s)
    }
}

/// Builder for constructing location paths
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    /// The underlying path being built
    path: LocationPath,
}

impl PathBuilder {
    /// Creates a builder for a relative path, as used inside predicates.
    ///
    /// # Examples
    /// ```
    /// use xsniff::query::PathBuilder;
    /// let path = PathBuilder::new().child("c").build();
    /// assert!(!path.absolute);
    /// assert_eq!(path.to_string(), "c");
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for a path starting at the document root.
    #[must_use]
    pub fn absolute() -> Self {
        Self { path: LocationPath { absolute: true, steps: Vec::new() } }
    }

    fn step(mut self, deep: bool, axis: Axis, test: Test) -> Self {
        self.path.steps.push(Step::new(deep, axis, test));
        self
    }

    /// Adds a child element step. The name may carry a prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// use xsniff::query::PathBuilder;
    /// let path = PathBuilder::absolute().child("bk:book").build();
    /// assert_eq!(path.to_string(), "/bk:book");
    /// ```
    #[must_use]
    pub fn child(self, name: &str) -> Self {
        self.step(false, Axis::Child, Test::Name(QName::parse(name)))
    }

    /// Adds a `//name` step.
    #[must_use]
    pub fn descendant(self, name: &str) -> Self {
        self.step(true, Axis::Child, Test::Name(QName::parse(name)))
    }

    /// Adds a `*` child step.
    #[must_use]
    pub fn any(self) -> Self {
        self.step(false, Axis::Child, Test::Any)
    }

    /// Adds an `@name` step.
    #[must_use]
    pub fn attribute(self, name: &str) -> Self {
        self.step(false, Axis::Attribute, Test::Name(QName::parse(name)))
    }

    /// Adds a `text()` step.
    #[must_use]
    pub fn text(self) -> Self {
        self.step(false, Axis::Child, Test::Text)
    }

    /// Restrict the last step to the n-th candidate (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use xsniff::query::PathBuilder;
    /// let path = PathBuilder::absolute().child("a").at(3).build();
    /// assert_eq!(path.to_string(), "/a[3]");
    /// ```
    #[must_use]
    pub fn at(self, n: usize) -> Self {
        self.predicate(Predicate::Position(Position::Exact(n)))
    }

    /// Filter the last step by `and`-joined conditions.
    ///
    /// # Examples
    ///
    /// ```
    /// use xsniff::query::{Condition, PathBuilder};
    /// let c = PathBuilder::new().child("c").build();
    /// let path = PathBuilder::absolute()
    ///     .child("a")
    ///     .child("b")
    ///     .filter(vec![Condition::equals(c, "x")])
    ///     .build();
    /// assert_eq!(path.to_string(), "/a/b[c='x']");
    /// ```
    #[must_use]
    pub fn filter(self, conditions: Vec<Condition>) -> Self {
        self.predicate(Predicate::Filter(conditions))
    }

    /// Attach a predicate to the last step. Does nothing on an empty path.
    #[must_use]
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        if let Some(last) = self.path.steps.last_mut() {
            last.predicates.push(predicate);
        }
        self
    }

    /// Return the built path.
    #[must_use]
    pub fn build(self) -> LocationPath {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_steps() {
        let path = PathBuilder::absolute()
            .child("a")
            .descendant("b")
            .attribute("x:id")
            .build();
        assert_eq!(path.to_string(), "/a//b/@x:id");

        let mut explicit = Step::new(false, Axis::Descendant, Test::Text);
        explicit.predicates.push(Predicate::Position(Position::Relative(CompareOp::Lt, 3)));
        assert_eq!(explicit.to_string(), "descendant::text()[position()<3]");
    }

    #[test]
    fn display_filters() {
        let n = PathBuilder::new().attribute("n").build();
        let c = PathBuilder::new().child("c").build();
        let path = PathBuilder::absolute()
            .any()
            .filter(vec![
                Condition::Compare(n, CompareOp::Ge, Literal::Number(3.0)),
                Condition::Matches(c, "x+".to_string()),
            ])
            .build();
        assert_eq!(path.to_string(), "/*[@n>=3 and matches(c, 'x+')]");
        assert!(path.is_filtered());
    }

    #[test]
    fn literal_quoting() {
        assert_eq!(Literal::String("it's".to_string()).to_string(), "\"it's\"");
        assert_eq!(Literal::Number(1.5).to_string(), "1.5");
    }

    #[test]
    fn display_queries() {
        let a = PathBuilder::absolute().child("a").build();
        let b = PathBuilder::absolute().child("b").build();
        assert_eq!(Query::Union(vec![a.clone(), b]).to_string(), "/a | /b");
        assert_eq!(Query::Function(Function::LocalName, a).to_string(), "local-name(/a)");
    }

    #[test]
    fn qname_split() {
        assert_eq!(QName::parse("p:x"), QName { prefix: Some("p".into()), local: "x".into() });
        assert_eq!(QName::parse("x").prefix, None);
    }
}
