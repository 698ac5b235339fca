//! # XML Token
//!
//! Defines the tokens an XML document is broken into.
use std::borrow::Cow;
use std::fmt::Display;

/// An attribute of a start tag, value references decoded.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Attribute<'a> {
    /// Name as written, including any prefix
    pub name: &'a str,
    /// Decoded value
    pub value: Cow<'a, str>,
}

/// Represents a token from an XML document.
#[derive(Debug, PartialEq, Clone, Eq)]
pub enum XmlToken<'a> {
    /// Start tag (or empty-element tag)
    StartTag {
        /// Element name as written, including any prefix
        name: &'a str,
        /// Attributes in document order, namespace declarations included
        attributes: Vec<Attribute<'a>>,
        /// Whether the tag was written `<name/>`
        self_closing: bool,
    },

    /// End tag
    EndTag {
        /// Element name as written
        name: &'a str,
    },

    /// Character data, references decoded and CDATA sections unwrapped
    Text(Cow<'a, str>),

    /// End of file
    Eof,
}

impl Display for XmlToken<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XmlToken::StartTag { name, attributes, self_closing } => {
                write!(f, "<{name}")?;
                for attribute in attributes {
                    write!(f, " {}={:?}", attribute.name, attribute.value)?;
                }
                if *self_closing { write!(f, "/>") } else { write!(f, ">") }
            }
            XmlToken::EndTag { name } => write!(f, "</{name}>"),
            XmlToken::Text(text) => write!(f, "{text:?}"),
            XmlToken::Eof => write!(f, ""),
        }
    }
}
