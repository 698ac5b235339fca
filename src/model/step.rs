/*!
# Path Steps

Axis steps and the value requirements (positions, comparisons) that can be
attached to a step as constraints.
*/
use regex::Regex;
use std::{
    cmp::Ordering,
    fmt::{self, Display},
};

use super::function::to_number;

/// An expanded XML name: an optional namespace URI and a local part.
///
/// Displayed in Clark notation, e.g. `{urn:books}title`, or just the local
/// part when there is no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    /// Namespace URI, `None` for the null namespace
    pub namespace: Option<String>,
    /// Local part of the name
    pub local: String,
}

impl ExpandedName {
    /// Construct a name from a namespace URI and a local part.
    pub fn new<T: Into<String>>(namespace: Option<String>, local: T) -> Self {
        Self { namespace: namespace.filter(|ns| !ns.is_empty()), local: local.into() }
    }

    /// Construct a name in the null namespace.
    pub fn local<T: Into<String>>(local: T) -> Self {
        Self { namespace: None, local: local.into() }
    }

    /// Parse a name written in Clark notation (`{uri}local`).
    ///
    /// # Examples
    ///
    /// ```
    /// use xsniff::model::ExpandedName;
    /// let name = ExpandedName::from_clark("{urn:x}item");
    /// assert_eq!(name.namespace.as_deref(), Some("urn:x"));
    /// assert_eq!(name.local, "item");
    /// assert_eq!(name.to_string(), "{urn:x}item");
    /// ```
    #[must_use]
    pub fn from_clark(clark: &str) -> Self {
        match clark.rfind('}') {
            Some(end) if clark.starts_with('{') => {
                Self::new(Some(clark[1..end].to_string()), &clark[end + 1..])
            }
            _ => Self::local(clark),
        }
    }
}

impl Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// The direction a step moves in from its context node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Direct children of the context element
    Child,
    /// Any descendant of the context element
    Descendant,
    /// Attributes of the context element
    Attribute,
}

impl Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child => write!(f, "child"),
            Self::Descendant => write!(f, "descendant"),
            Self::Attribute => write!(f, "attribute"),
        }
    }
}

/// What kind of document item a step selects, and by which name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeTest {
    /// An element (or attribute) with exactly this name
    Name(ExpandedName),
    /// Any element (or attribute), i.e. `*`
    Any,
    /// Character data, i.e. `text()`
    Text,
}

impl NodeTest {
    /// Whether a named item passes this test.
    #[must_use]
    pub fn matches_name(&self, name: &ExpandedName) -> bool {
        match self {
            Self::Name(expected) => expected == name,
            Self::Any => true,
            Self::Text => false,
        }
    }
}

impl Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Any => write!(f, "*"),
            Self::Text => write!(f, "text()"),
        }
    }
}

/// A single axis step of a location path, e.g. `child::b` or `@id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    /// Axis the step moves along
    pub axis: Axis,
    /// Test the selected items must pass
    pub test: NodeTest,
}

impl Step {
    /// Construct a new step.
    #[must_use]
    pub const fn new(axis: Axis, test: NodeTest) -> Self {
        Self { axis, test }
    }

    /// Helper for ergonomic construction of `child::name` steps.
    pub fn child<T: Into<String>>(local: T) -> Self {
        Self::new(Axis::Child, NodeTest::Name(ExpandedName::local(local)))
    }

    /// Helper for ergonomic construction of `attribute::name` steps.
    pub fn attribute<T: Into<String>>(local: T) -> Self {
        Self::new(Axis::Attribute, NodeTest::Name(ExpandedName::local(local)))
    }

    /// Whether the step selects attributes.
    #[must_use]
    pub const fn is_attribute(&self) -> bool {
        matches!(self.axis, Axis::Attribute)
    }

    /// Whether the step selects an element with the given name.
    #[must_use]
    pub fn selects_element(&self, name: &ExpandedName) -> bool {
        !self.is_attribute() && self.test.matches_name(name)
    }

    /// Whether the step selects an attribute with the given name.
    #[must_use]
    pub fn selects_attribute(&self, name: &ExpandedName) -> bool {
        self.is_attribute() && self.test.matches_name(name)
    }

    /// Whether the step selects character data.
    #[must_use]
    pub fn selects_text(&self) -> bool {
        !self.is_attribute() && matches!(self.test, NodeTest::Text)
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.axis, self.test)
    }
}

/// Comparison operators usable in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `matches(value, pattern)`
    Matches,
}

impl CompareOp {
    /// Whether the operator holds for the given ordering of left vs. right.
    /// `None` stands for an unordered comparison (a `NaN` operand), for
    /// which only `!=` holds.
    #[must_use]
    pub const fn holds(self, ordering: Option<Ordering>) -> bool {
        match ordering {
            None => matches!(self, Self::Ne),
            Some(ord) => match self {
                Self::Eq => matches!(ord, Ordering::Equal),
                Self::Ne => !matches!(ord, Ordering::Equal),
                Self::Lt => matches!(ord, Ordering::Less),
                Self::Le => !matches!(ord, Ordering::Greater),
                Self::Gt => matches!(ord, Ordering::Greater),
                Self::Ge => !matches!(ord, Ordering::Less),
                Self::Matches => false,
            },
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Matches => "matches",
        };
        write!(f, "{op}")
    }
}

/// A positional requirement, e.g. `[2]` or `[position() < 3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Exactly the n-th candidate (1-based)
    Exact(usize),
    /// Every candidate whose position satisfies the comparison
    Relative(CompareOp, usize),
}

impl Position {
    /// Whether a candidate at the given 1-based position is accepted.
    #[must_use]
    pub fn accepts(&self, position: usize) -> bool {
        match *self {
            Self::Exact(n) => position == n,
            Self::Relative(op, n) => op.holds(Some(position.cmp(&n))),
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "position()={n}"),
            Self::Relative(op, n) => write!(f, "position(){op}{n}"),
        }
    }
}

/// A comparison of an item's value against a literal.
///
/// Equality between comparisons is structural: operator and literal text.
/// The compiled regular expression (for `matches`) is derived from the
/// literal and takes no part in it.
#[derive(Debug, Clone)]
pub struct Comparison {
    op: CompareOp,
    literal: String,
    number: Option<f64>,
    regex: Option<Regex>,
}

impl Comparison {
    /// A string comparison (`=`/`!=` compare text, ordering operators
    /// compare numerically).
    pub fn string<T: Into<String>>(op: CompareOp, literal: T) -> Self {
        Self { op, literal: literal.into(), number: None, regex: None }
    }

    /// A numeric comparison against a number literal.
    #[must_use]
    pub fn number(op: CompareOp, literal: f64) -> Self {
        Self {
            op,
            literal: super::function::format_number(literal),
            number: Some(literal),
            regex: None,
        }
    }

    /// A regular expression match.
    ///
    /// # Errors
    ///
    /// Returns a [`regex::Error`] if the pattern does not compile.
    pub fn matches<T: Into<String>>(pattern: T) -> Result<Self, regex::Error> {
        let literal = pattern.into();
        let regex = Regex::new(&literal)?;
        Ok(Self {
            op: CompareOp::Matches,
            literal,
            number: None,
            regex: Some(regex),
        })
    }

    /// The comparison operator.
    #[must_use]
    pub const fn op(&self) -> CompareOp {
        self.op
    }

    /// The literal the value is compared against.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Whether the comparison is numeric.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.number.is_some()
    }

    /// Evaluate the comparison against an item's value.
    #[must_use]
    pub fn test(&self, value: &str) -> bool {
        if let Some(regex) = &self.regex {
            return regex.is_match(value);
        }
        match (self.op, self.number) {
            (CompareOp::Eq, None) => value == self.literal,
            (CompareOp::Ne, None) => value != self.literal,
            (op, Some(n)) => op.holds(to_number(value).partial_cmp(&n)),
            (op, None) => {
                op.holds(to_number(value).partial_cmp(&to_number(&self.literal)))
            }
        }
    }
}

impl PartialEq for Comparison {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op
            && self.literal == other.literal
            && self.number.is_some() == other.number.is_some()
    }
}

impl Eq for Comparison {}

impl Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, self.number) {
            (CompareOp::Matches, _) => write!(f, "matches(., '{}')", self.literal),
            (op, Some(_)) => write!(f, ".{op}{}", self.literal),
            (op, None) => write!(f, ".{op}'{}'", self.literal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clark_round_trip() {
        let name = ExpandedName::from_clark("{urn:a}b");
        assert_eq!(name, ExpandedName::new(Some("urn:a".into()), "b"));
        assert_eq!(ExpandedName::from_clark("plain"), ExpandedName::local("plain"));
        // an empty namespace is the null namespace
        assert_eq!(ExpandedName::new(Some(String::new()), "x").namespace, None);
    }

    #[test]
    fn step_selection() {
        let b = Step::child("b");
        assert!(b.selects_element(&ExpandedName::local("b")));
        assert!(!b.selects_attribute(&ExpandedName::local("b")));
        assert!(!b.selects_text());

        let any_attr = Step::new(Axis::Attribute, NodeTest::Any);
        assert!(any_attr.selects_attribute(&ExpandedName::local("id")));
        assert!(!any_attr.selects_element(&ExpandedName::local("id")));

        let text = Step::new(Axis::Descendant, NodeTest::Text);
        assert!(text.selects_text());
        assert_eq!(text.to_string(), "descendant::text()");
    }

    #[test]
    fn positions() {
        assert!(Position::Exact(2).accepts(2));
        assert!(!Position::Exact(2).accepts(3));
        let first_two = Position::Relative(CompareOp::Lt, 3);
        assert!(first_two.accepts(1) && first_two.accepts(2));
        assert!(!first_two.accepts(3));
        assert!(Position::Relative(CompareOp::Ne, 1).accepts(4));
    }

    #[test]
    fn string_comparisons() {
        let eq = Comparison::string(CompareOp::Eq, "x");
        assert!(eq.test("x"));
        assert!(!eq.test(" x"));
        assert!(Comparison::string(CompareOp::Ne, "x").test("y"));
        // ordering operators on strings compare numerically
        assert!(Comparison::string(CompareOp::Lt, "10").test("9"));
        assert!(!Comparison::string(CompareOp::Lt, "abc").test("1"));
    }

    #[test]
    fn numeric_comparisons() {
        let ge = Comparison::number(CompareOp::Ge, 3.0);
        assert!(ge.test("3"));
        assert!(ge.test(" 4.5 "));
        assert!(!ge.test("2"));
        assert!(!ge.test("three"));
        // NaN is unequal to everything
        assert!(Comparison::number(CompareOp::Ne, 1.0).test("NaN"));
        assert!(Comparison::number(CompareOp::Eq, 1.0).test("1.0"));
    }

    #[test]
    fn regex_comparison() {
        let re = Comparison::matches("^x+$").unwrap();
        assert!(re.test("xxx"));
        assert!(!re.test("xy"));
        assert!(Comparison::matches("(").is_err());
    }

    #[test]
    fn comparison_equivalence_is_structural() {
        assert_eq!(
            Comparison::string(CompareOp::Eq, "x"),
            Comparison::string(CompareOp::Eq, "x")
        );
        assert_ne!(
            Comparison::string(CompareOp::Eq, "1"),
            Comparison::number(CompareOp::Eq, 1.0)
        );
        assert_eq!(Comparison::matches("a").unwrap(), Comparison::matches("a").unwrap());
    }
}
