/*!
# `xsniff` Library

Evaluates many XPath queries over an XML document in a single streaming
pass, without building a tree of the document.

Queries are compiled into one shared expression forest
([`query::QuerySet`]); the [`sniffer`] then reads the document once and feeds
every structural event to the [`engine`], which caches results in document
order and stops early once a result limit is reached.
*/

pub mod commands;
pub mod engine;
pub mod event;
pub mod model;
pub mod query;
pub mod sniffer;
pub mod tokenizer;
pub mod utils;

pub use sniffer::{Outcome, Results, SniffError, SniffOptions, sniff};
