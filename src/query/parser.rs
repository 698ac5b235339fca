/*!
# Query Parser

Parser for converting XPath query strings into [`Query`] objects.

## Examples

This module exposes the public API method [`parse_query`] that can be used to
convert raw query strings into [`Query`] objects:

```rust
use xsniff::query::{Query, parser};
let parsed: Query = parser::parse_query("/a/b[c='x'] | //d/@id").expect("Invalid query string");
assert_eq!("/a/b[c='x'] | //d/@id", parsed.to_string());
```

## Errors

If the input query string is invalid, [`parse_query`] returns a [`QueryParseError`]
describing how the parsing failed:

```rust
use xsniff::query::parser::{self, QueryParseError};

let result = parser::parse_query("/a[");
assert!(matches!(result, Err(QueryParseError::UnexpectedToken(_))));
```

## See Also

- [`Query`]: The enum representing the query AST.
- [`QueryParseError`]: The error type for failed query parses.
*/

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::error::Error;
use std::fmt;

use crate::model::{Axis, CompareOp, Function, Position};
use crate::query::{Condition, Literal, LocationPath, Predicate, QName, Query, Step, Test};

/// Parser for turning raw query strings into [`Query`] objects.
#[derive(Parser)]
#[grammar = "query/grammar/xpath.pest"]
pub struct XPathParser;

/// Represents errors that can occur while parsing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    /// Unexpected token encountered during parsing.
    UnexpectedToken(String),
    /// The input ended unexpectedly, indicating an incomplete query.
    UnexpectedEndOfInput,
}

impl Error for QueryParseError {}

impl fmt::Display for QueryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedToken(token) => {
                write!(f, "Unexpected token: {token}")
            }
            Self::UnexpectedEndOfInput => {
                write!(f, "Unexpected end of input")
            }
        }
    }
}

/// Parse an input query string into a [`Query`]
///
/// # Errors
///
/// Returns a [`QueryParseError`] describing how the parsing failed.
pub fn parse_query(input: &str) -> Result<Query, QueryParseError> {
    let mut pairs = XPathParser::parse(Rule::query, input)
        .map_err(|e| QueryParseError::UnexpectedToken(e.to_string()))?;

    let query = pairs.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    let body = query.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;

    match body.as_rule() {
        Rule::function_call => parse_function_call(body),
        Rule::union => parse_union(body),
        _ => Err(unexpected("query", &body)),
    }
}

fn unexpected(expected: &str, pair: &Pair<Rule>) -> QueryParseError {
    QueryParseError::UnexpectedToken(format!(
        "Expected {expected}, got {:?} ({:?})",
        pair.as_rule(),
        pair.as_str()
    ))
}

fn expect_rule(pair: &Pair<Rule>, rule: Rule) -> Result<(), QueryParseError> {
    if pair.as_rule() == rule {
        Ok(())
    } else {
        Err(unexpected(&format!("{rule:?}"), pair))
    }
}

/// Parse a function call rule into a [`Query::Function`].
fn parse_function_call(pair: Pair<Rule>) -> Result<Query, QueryParseError> {
    expect_rule(&pair, Rule::function_call)?;
    let mut inner = pair.into_inner();
    let name = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    let function: Function = name
        .as_str()
        .parse()
        .map_err(|e: crate::model::function::UnknownFunction| {
            QueryParseError::UnexpectedToken(e.to_string())
        })?;
    let path = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    Ok(Query::Function(function, parse_path(path)?))
}

/// Parse a union rule into a [`Query::Path`] or [`Query::Union`].
fn parse_union(pair: Pair<Rule>) -> Result<Query, QueryParseError> {
    expect_rule(&pair, Rule::union)?;
    let mut paths =
        pair.into_inner().map(parse_path).collect::<Result<Vec<LocationPath>, _>>()?;

    if paths.len() == 1 {
        Ok(Query::Path(paths.remove(0)))
    } else {
        Ok(Query::Union(paths))
    }
}

/// Parse an absolute or relative path rule into a [`LocationPath`].
fn parse_path(pair: Pair<Rule>) -> Result<LocationPath, QueryParseError> {
    let absolute = match pair.as_rule() {
        Rule::absolute_path => true,
        Rule::relative_path => false,
        _ => return Err(unexpected("location path", &pair)),
    };

    let mut steps = Vec::new();
    let mut deep = false;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::separator => deep = part.as_str() == "//",
            Rule::step => {
                steps.push(parse_step(part, deep)?);
                deep = false;
            }
            _ => return Err(unexpected("step", &part)),
        }
    }
    Ok(LocationPath { absolute, steps })
}

/// Parse a step rule, with its predicates.
fn parse_step(pair: Pair<Rule>, deep: bool) -> Result<Step, QueryParseError> {
    expect_rule(&pair, Rule::step)?;
    let mut inner = pair.into_inner();
    let kind = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;

    let mut step = match kind.as_rule() {
        Rule::attribute_step => {
            let test = kind.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            Step::new(deep, Axis::Attribute, parse_name_test(test)?)
        }
        Rule::text_step => {
            let axis = match kind.into_inner().next() {
                Some(axis) => parse_axis(&axis)?,
                None => Axis::Child,
            };
            Step::new(deep, axis, Test::Text)
        }
        Rule::name_step => {
            let mut parts = kind.into_inner();
            let mut axis = Axis::Child;
            let mut next = parts.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            if next.as_rule() == Rule::axis {
                axis = parse_axis(&next)?;
                next = parts.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            }
            Step::new(deep, axis, parse_name_test(next)?)
        }
        _ => return Err(unexpected("step", &kind)),
    };

    for predicate in inner {
        step.predicates.push(parse_predicate(predicate)?);
    }
    Ok(step)
}

fn parse_axis(pair: &Pair<Rule>) -> Result<Axis, QueryParseError> {
    expect_rule(pair, Rule::axis)?;
    match pair.as_str().trim_end_matches("::") {
        "child" => Ok(Axis::Child),
        "descendant" => Ok(Axis::Descendant),
        other => Err(QueryParseError::UnexpectedToken(format!("Unknown axis: {other}"))),
    }
}

fn parse_name_test(pair: Pair<Rule>) -> Result<Test, QueryParseError> {
    expect_rule(&pair, Rule::name_test)?;
    let test = pair.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    match test.as_rule() {
        Rule::wildcard => Ok(Test::Any),
        Rule::qname => {
            let mut name = QName { prefix: None, local: String::new() };
            for part in test.into_inner() {
                match part.as_rule() {
                    Rule::prefix => name.prefix = Some(part.as_str().to_string()),
                    Rule::local => name.local = part.as_str().to_string(),
                    _ => return Err(unexpected("name", &part)),
                }
            }
            Ok(Test::Name(name))
        }
        _ => Err(unexpected("name test", &test)),
    }
}

/// Parse a bracketed predicate.
fn parse_predicate(pair: Pair<Rule>) -> Result<Predicate, QueryParseError> {
    expect_rule(&pair, Rule::predicate)?;
    let body = pair.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    match body.as_rule() {
        Rule::position_index => {
            let index = body.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            Ok(Predicate::Position(Position::Exact(parse_integer(&index)?)))
        }
        Rule::position_compare => {
            let mut inner = body.into_inner();
            let op = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            let n = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            let (op, n) = (parse_compare_op(&op)?, parse_integer(&n)?);
            let position = if op == CompareOp::Eq {
                Position::Exact(n)
            } else {
                Position::Relative(op, n)
            };
            Ok(Predicate::Position(position))
        }
        Rule::filter => {
            let conditions =
                body.into_inner().map(parse_condition).collect::<Result<Vec<_>, _>>()?;
            Ok(Predicate::Filter(conditions))
        }
        _ => Err(unexpected("predicate", &body)),
    }
}

fn parse_integer(pair: &Pair<Rule>) -> Result<usize, QueryParseError> {
    pair.as_str()
        .parse::<usize>()
        .map_err(|_| QueryParseError::UnexpectedToken(pair.as_str().to_string()))
}

fn parse_compare_op(pair: &Pair<Rule>) -> Result<CompareOp, QueryParseError> {
    expect_rule(pair, Rule::compare_op)?;
    match pair.as_str() {
        "=" => Ok(CompareOp::Eq),
        "!=" => Ok(CompareOp::Ne),
        "<" => Ok(CompareOp::Lt),
        "<=" => Ok(CompareOp::Le),
        ">" => Ok(CompareOp::Gt),
        ">=" => Ok(CompareOp::Ge),
        other => Err(QueryParseError::UnexpectedToken(other.to_string())),
    }
}

/// Parse one condition of a filter.
fn parse_condition(pair: Pair<Rule>) -> Result<Condition, QueryParseError> {
    expect_rule(&pair, Rule::condition)?;
    let body = pair.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    match body.as_rule() {
        Rule::relative_path => Ok(Condition::Exists(parse_path(body)?)),
        Rule::comparison => {
            let mut inner = body.into_inner();
            let path = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            let op = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            let literal = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            Ok(Condition::Compare(
                parse_path(path)?,
                parse_compare_op(&op)?,
                parse_literal(literal)?,
            ))
        }
        Rule::matches_call => {
            let mut inner = body.into_inner();
            let path = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            let pattern = inner.next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
            Ok(Condition::Matches(parse_path(path)?, parse_string(pattern)?))
        }
        _ => Err(unexpected("condition", &body)),
    }
}

fn parse_literal(pair: Pair<Rule>) -> Result<Literal, QueryParseError> {
    expect_rule(&pair, Rule::literal)?;
    let value = pair.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    match value.as_rule() {
        Rule::string_literal => Ok(Literal::String(parse_string(value)?)),
        Rule::number => value
            .as_str()
            .parse::<f64>()
            .map(Literal::Number)
            .map_err(|_| QueryParseError::UnexpectedToken(value.as_str().to_string())),
        _ => Err(unexpected("literal", &value)),
    }
}

/// The contents of a quoted string, quotes removed.
fn parse_string(pair: Pair<Rule>) -> Result<String, QueryParseError> {
    expect_rule(&pair, Rule::string_literal)?;
    let contents = pair.into_inner().next().ok_or(QueryParseError::UnexpectedEndOfInput)?;
    Ok(contents.as_str().to_string())
}
