//! # XPath Queries
//!
//! The XPath subset evaluated while streaming:
//! - Absolute child and descendant paths, wildcards, attributes and `text()`
//! - Unions of paths
//! - Positional predicates and filters with existence, comparison and
//!   regular expression conditions, nested filters included
//! - Functions over a path: `count`, `sum`, `string`, `name`,
//!   `local-name` and `boolean`
//!
//! Queries are parsed into a [`Query`] AST and compiled into a shared
//! expression forest by a [`QuerySet`].

pub mod ast;
pub mod compiler;
pub mod parser;

// Re-exports
pub use ast::*;
pub use compiler::*;
pub use parser::*;
