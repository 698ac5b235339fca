//! # Structural Events
//!
//! The forward-only stream of structural occurrences a document is delivered
//! as. Events borrow from the event source; the engine copies out only the
//! result strings it caches.
use std::fmt::Display;

use crate::model::ExpandedName;

/// A structural occurrence in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// Start of the document
    Document,
    /// An element was opened
    Element {
        /// Expanded (namespace-resolved) name
        name: &'a ExpandedName,
        /// Name as written in the document, including any prefix
        qname: &'a str,
        /// 1-based position among the element's same-named siblings
        position: usize,
        /// Location path of the element, e.g. `/a[1]/b[2]`
        location: &'a str,
    },
    /// An attribute of the most recently opened element
    Attribute {
        /// Expanded (namespace-resolved) name
        name: &'a ExpandedName,
        /// Name as written in the document, including any prefix
        qname: &'a str,
        /// Attribute value, references decoded
        value: &'a str,
    },
    /// Character data
    Text(&'a str),
    /// An element was closed
    End {
        /// Expanded name of the closed element
        name: &'a ExpandedName,
        /// String value accumulated for the element, when one was requested
        value: &'a str,
    },
}

impl<'a> Event<'a> {
    /// The textual result a query reports for this event: the location path
    /// of an element, the value of an attribute, the text itself, or the
    /// string value of a closed element.
    #[must_use]
    pub const fn result(&self) -> &'a str {
        match *self {
            Event::Document => "/",
            Event::Element { location, .. } => location,
            Event::Attribute { value, .. }
            | Event::Text(value)
            | Event::End { value, .. } => value,
        }
    }
}

impl Display for Event<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Document => write!(f, "document"),
            Event::Element { location, .. } => write!(f, "element {location}"),
            Event::Attribute { qname, value, .. } => write!(f, "@{qname}={value:?}"),
            Event::Text(text) => write!(f, "text {text:?}"),
            Event::End { name, .. } => write!(f, "end {name}"),
        }
    }
}
