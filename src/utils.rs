//! Miscellaneous utility functions for printing results.

use anyhow::Context as _;
use colored::Colorize;
use std::collections::BTreeMap;
use std::io::Write;
use std::io::{self, ErrorKind};

/// Treat a broken pipe as success so that piping into `head` or `less`
/// exits cleanly.
fn swallow_broken_pipe(result: io::Result<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err).context("write results to stdout"),
    }
}

/// Write the results of one query: an optional header naming the query,
/// then one value per line.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_results<W: Write>(
    writer: &mut W,
    query: &str,
    values: &[String],
    show_query: bool,
) -> anyhow::Result<()> {
    swallow_broken_pipe((|| -> io::Result<()> {
        if show_query {
            writeln!(writer, "{}:", query.bold().magenta())?;
        }
        for value in values {
            writeln!(writer, "{}", colorize(value))?;
        }
        Ok(())
    })())
}

/// Write the number of results of one query.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_count<W: Write>(
    writer: &mut W,
    query: &str,
    count: usize,
    show_query: bool,
) -> anyhow::Result<()> {
    swallow_broken_pipe(if show_query {
        writeln!(writer, "{}: {}", query.bold().magenta(), count.to_string().green())
    } else {
        writeln!(writer, "{}", count.to_string().green())
    })
}

/// Write every query's results as one JSON object keyed by query.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_json<'a, W: Write>(
    writer: &mut W,
    results: impl IntoIterator<Item = (&'a str, &'a [String])>,
) -> anyhow::Result<()> {
    let object: BTreeMap<&str, &[String]> = results.into_iter().collect();
    let text = serde_json::to_string_pretty(&object).context("serialize results")?;
    swallow_broken_pipe(writeln!(writer, "{text}"))
}

/// Values are green; the `[n]` positions of a location path are dimmed.
fn colorize(value: &str) -> String {
    if !value.starts_with('/') {
        return value.green().to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']').map(|i| open + i + 1) else { break };
        out.push_str(&rest[..open].green().to_string());
        out.push_str(&rest[open..close].dimmed().to_string());
        rest = &rest[close..];
    }
    out.push_str(&rest.green().to_string());
    out
}
