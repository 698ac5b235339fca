//! # Tokenizer/ Lexer
//!
//! Pulls start tags, end tags and character data out of an XML document.
pub mod lexer;
pub mod token;

// Re-exports
pub use lexer::{LexError, Lexer, tokenize};
pub use token::{Attribute, XmlToken};
