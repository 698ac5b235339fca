/*!
# Functions

Functions compute a value over one or more consumed events instead of
reporting the matched items themselves.

Every function declares:
- whether it is *single-hit* (fires once, the first time its argument
  matches) or *multi-hit* (fires for every match and joins the partial
  results of successive matches),
- which events it can consume at all ([`Function::consumable`]),
- how a new event is folded into a previous partial result
  ([`Function::evaluate`]),
- how two partial results are combined ([`Function::join`]), unless it
  reports every match on its own ([`Function::joins`]),
- the value it reports when it never fired ([`Function::default_result`]).

Functions that *collect text* stay active for the subtree of the element
they fired on; every descendant text event is then folded into the current
partial result, which is how string values split across several character
data events are assembled.
*/
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::event::Event;

/// The functions a query may apply to a location path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `count(p)`: number of matches
    Count,
    /// `sum(p)`: numeric sum of the string values of the matches
    Sum,
    /// `string(p)`: string value of the first match
    String,
    /// `strings(p)`: string value of every match, one result each
    Strings,
    /// `name(p)`: qualified name of the first match
    Name,
    /// `local-name(p)`: local name of the first match
    LocalName,
    /// `boolean(p)`: whether anything matched
    Boolean,
}

/// Error returned when parsing an unknown function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFunction(pub String);

impl Display for UnknownFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown function: {}()", self.0)
    }
}

impl std::error::Error for UnknownFunction {}

impl FromStr for Function {
    type Err = UnknownFunction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "string" => Ok(Self::String),
            "strings" => Ok(Self::Strings),
            "name" => Ok(Self::Name),
            "local-name" => Ok(Self::LocalName),
            "boolean" => Ok(Self::Boolean),
            other => Err(UnknownFunction(other.to_string())),
        }
    }
}

impl Function {
    /// The name the function is called by in queries.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::String => "string",
            Self::Strings => "strings",
            Self::Name => "name",
            Self::LocalName => "local-name",
            Self::Boolean => "boolean",
        }
    }

    /// Whether the function fires at most once per pass.
    #[must_use]
    pub const fn single_hit(self) -> bool {
        !matches!(self, Self::Count | Self::Sum | Self::Strings)
    }

    /// Whether the partial results of successive matches are joined into a
    /// single value.
    #[must_use]
    pub const fn joins(self) -> bool {
        !matches!(self, Self::Strings)
    }

    /// Whether the function folds descendant text of a matched element
    /// into its result.
    #[must_use]
    pub const fn collects_text(self) -> bool {
        matches!(self, Self::Sum | Self::String | Self::Strings)
    }

    /// Whether the function can consume the given event at all.
    #[must_use]
    pub const fn consumable(self, event: &Event<'_>) -> bool {
        match self {
            Self::Count | Self::Boolean => true,
            Self::Sum | Self::String | Self::Strings => {
                matches!(
                    event,
                    Event::Element { .. } | Event::Attribute { .. } | Event::Text(_)
                )
            }
            Self::Name | Self::LocalName => {
                matches!(event, Event::Element { .. } | Event::Attribute { .. })
            }
        }
    }

    /// Produce a new partial result from an event, folding in the previous
    /// partial result of the same context if there is one.
    #[must_use]
    pub fn evaluate(self, event: &Event<'_>, previous: Option<&str>) -> String {
        match self {
            Self::Count => {
                let count = previous.and_then(|p| p.parse::<u64>().ok()).unwrap_or(0);
                (count + 1).to_string()
            }
            Self::Sum | Self::String | Self::Strings => {
                let mut value = previous.unwrap_or_default().to_string();
                match event {
                    Event::Attribute { value: v, .. } | Event::Text(v) => value.push_str(v),
                    _ => {}
                }
                value
            }
            Self::Name => match event {
                Event::Element { qname, .. } | Event::Attribute { qname, .. } => {
                    (*qname).to_string()
                }
                _ => previous.unwrap_or_default().to_string(),
            },
            Self::LocalName => match event {
                Event::Element { name, .. } | Event::Attribute { name, .. } => {
                    name.local.clone()
                }
                _ => previous.unwrap_or_default().to_string(),
            },
            Self::Boolean => "true".to_string(),
        }
    }

    /// Combine two partial results, `earlier` preceding `later` in document
    /// order.
    #[must_use]
    pub fn join(self, earlier: &str, later: &str) -> String {
        match self {
            Self::Count => {
                let a = earlier.parse::<u64>().unwrap_or(0);
                let b = later.parse::<u64>().unwrap_or(0);
                (a + b).to_string()
            }
            Self::Sum => format_number(to_number(earlier) + to_number(later)),
            Self::String | Self::Strings => format!("{earlier}{later}"),
            Self::Name | Self::LocalName | Self::Boolean => earlier.to_string(),
        }
    }

    /// Normalise a final (fully joined) result.
    #[must_use]
    pub fn finish(self, value: String) -> String {
        match self {
            Self::Sum => format_number(to_number(&value)),
            _ => value,
        }
    }

    /// The result reported when the function never fired during a pass.
    #[must_use]
    pub fn default_result(self) -> String {
        let default = match self {
            Self::Count | Self::Sum => "0",
            Self::Strings => "0.0",
            Self::String | Self::Name | Self::LocalName => "",
            Self::Boolean => "false",
        };
        default.to_string()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}()", self.name())
    }
}

/// Convert a string value to a number following XPath 1.0 rules: optional
/// surrounding whitespace, an optional minus sign, digits with an optional
/// fraction. Anything else is `NaN`.
#[must_use]
pub fn to_number(value: &str) -> f64 {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !digits.is_empty()
        && digits != "."
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1;
    if well_formed {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Render a number the way XPath does: integral values without a fraction,
/// `NaN` and signed `Infinity` spelled out.
#[must_use]
pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number.is_infinite() {
        let infinity = if number > 0.0 { "Infinity" } else { "-Infinity" };
        infinity.to_string()
    } else if number == 0.0 {
        // normalises -0
        "0".to_string()
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExpandedName;

    fn element<'a>(name: &'a ExpandedName, qname: &'a str) -> Event<'a> {
        Event::Element { name, qname, position: 1, location: "/x[1]" }
    }

    #[test]
    fn numbers() {
        assert_eq!(to_number(" 42 "), 42.0);
        assert_eq!(to_number("-1.5"), -1.5);
        assert_eq!(to_number(".5"), 0.5);
        assert!(to_number("1e3").is_nan());
        assert!(to_number("inf").is_nan());
        assert!(to_number("").is_nan());
        assert!(to_number("1.2.3").is_nan());
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn count_folds_and_joins() {
        let name = ExpandedName::local("b");
        let event = element(&name, "b");
        let first = Function::Count.evaluate(&event, None);
        assert_eq!(first, "1");
        assert_eq!(Function::Count.evaluate(&event, Some(&first)), "2");
        assert_eq!(Function::Count.join("2", "1"), "3");
        assert_eq!(Function::Count.default_result(), "0");
        assert!(!Function::Count.single_hit());
    }

    #[test]
    fn string_collects_text_fragments() {
        let name = ExpandedName::local("b");
        let start = Function::String.evaluate(&element(&name, "b"), None);
        assert_eq!(start, "");
        let partial = Function::String.evaluate(&Event::Text("hel"), Some(&start));
        let whole = Function::String.evaluate(&Event::Text("lo"), Some(&partial));
        assert_eq!(whole, "hello");
        assert!(Function::String.collects_text());
        assert!(Function::String.single_hit());
    }

    #[test]
    fn strings_keeps_matches_apart() {
        assert!(!Function::Strings.single_hit());
        assert!(!Function::Strings.joins());
        assert!(Function::Strings.collects_text());
        assert_eq!(Function::Strings.default_result(), "0.0");
        assert_eq!("strings".parse::<Function>(), Ok(Function::Strings));
    }

    #[test]
    fn sum_joins_numerically() {
        assert_eq!(Function::Sum.join("1.5", "2"), "3.5");
        assert_eq!(Function::Sum.join("1", "x"), "NaN");
        assert_eq!(Function::Sum.finish(" 7 ".to_string()), "7");
    }

    #[test]
    fn names() {
        let name = ExpandedName::new(Some("urn:x".into()), "item");
        let event = element(&name, "x:item");
        assert_eq!(Function::Name.evaluate(&event, None), "x:item");
        assert_eq!(Function::LocalName.evaluate(&event, None), "item");
        assert!(!Function::Name.consumable(&Event::Text("t")));
    }

    #[test]
    fn boolean_default() {
        assert_eq!(Function::Boolean.default_result(), "false");
        assert_eq!(Function::Boolean.evaluate(&Event::Document, None), "true");
    }

    #[test]
    fn parse_names() {
        assert_eq!("local-name".parse::<Function>(), Ok(Function::LocalName));
        assert!("last".parse::<Function>().is_err());
        assert_eq!(Function::Count.to_string(), "count()");
    }
}
