/*!
Main binary for xsniff.
*/

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, IsTerminal, Read, stdout};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use xsniff::commands::generate;
use xsniff::query::QuerySet;
use xsniff::utils::{write_count, write_json, write_results};
use xsniff::{SniffOptions, sniff};

/// Evaluate XPath queries over an XML document in a single streaming pass.
#[derive(Parser)]
#[command(
    name = "xsniff",
    version,
    about,
    arg_required_else_help = true,
    long_about = None,
    disable_help_subcommand = true,
    args_conflicts_with_subcommands = true
)]
struct Args {
    /// Optional subcommands
    #[command(subcommand)]
    command: Option<Commands>,
    /// Queries to evaluate (e.g., "/catalog/book[@id='b1']/title")
    #[arg(value_name = "QUERY")]
    queries: Vec<String>,
    /// Path to the XML document. If omitted, reads from STDIN
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,
    /// Bind a namespace prefix for use in queries, as `prefix=uri`
    #[arg(short, long = "ns", value_name = "PREFIX=URI", value_parser = parse_binding)]
    namespaces: Vec<(String, String)>,
    /// Stop reading the document after this many results. Every match
    /// feeding a function such as count() spends one as well
    #[arg(long, value_name = "N")]
    limit: Option<NonZeroUsize>,
    /// Display the number of results of each query instead of the results
    #[arg(long, action = ArgAction::SetTrue)]
    count: bool,
    /// Print a JSON object mapping each query to its results
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    /// Disable colored output
    #[arg(long, action = ArgAction::SetTrue)]
    no_color: bool,
    /// Print the compiled expression forest instead of reading a document
    #[arg(long, action = ArgAction::SetTrue)]
    explain: bool,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

/// Available subcommands for `xsniff`
#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    /// Generate additional documentation and/or completions
    Generate(GenerateCommand),
}

/// Generate shell completions and man page
#[derive(Subcommand)]
enum GenerateCommand {
    /// Generate shell completions for the given shell to stdout.
    Shell { shell: clap_complete::Shell },
    /// Generate a man page for xsniff to output directory if specified, else
    /// the current directory.
    Man {
        /// The output directory to write the man pages.
        #[clap(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn parse_binding(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((prefix, uri)) if !prefix.is_empty() => Ok((prefix.to_string(), uri.to_string())),
        _ => Err(format!("expected PREFIX=URI, got {text:?}")),
    }
}

/// The document text, memory-mapped from a file or read from STDIN.
enum Document {
    Mapped(Mmap),
    Buffered(String),
}

impl Document {
    fn text(&self) -> Result<&str> {
        match self {
            Self::Mapped(map) => std::str::from_utf8(map).context("Document is not valid UTF-8"),
            Self::Buffered(text) => Ok(text),
        }
    }
}

/// Entry point for main binary.
///
/// This compiles every query into one query set, reads the document once
/// (memory-mapped from `--file`, else piped in on STDIN) and prints each
/// query's results in document order.
fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new().filter_level(args.verbose.log_level_filter()).init();
    if args.no_color {
        colored::control::set_override(false);
    }

    if let Some(Commands::Generate(cmd)) = args.command {
        match cmd {
            GenerateCommand::Shell { shell } => {
                generate::completions(shell, &mut Args::command(), &mut stdout().lock());
            }
            GenerateCommand::Man { output_dir } => {
                for path in generate::man_pages(&Args::command(), output_dir)? {
                    println!("Generated: {}", path.display());
                }
            }
        }
        return Ok(());
    }

    if args.queries.is_empty() {
        anyhow::bail!("At least one query is required unless using a subcommand");
    }

    let mut set = QuerySet::new();
    for (prefix, uri) in &args.namespaces {
        set.declare_namespace(prefix.as_str(), uri.as_str());
    }
    for query in &args.queries {
        set.add_str(query).with_context(|| format!("Failed to compile query {query:?}"))?;
    }
    if args.explain {
        print!("{}", set.forest().dump(set.root()));
        return Ok(());
    }

    let document = if let Some(path) = &args.file {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        // SAFETY: the file is only read, and only for the duration of the pass
        let map = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map {}", path.display()))?;
        Document::Mapped(map)
    } else {
        if io::stdin().is_terminal() {
            // No piped input and no file specified
            let mut cmd = Args::command();
            return Ok(cmd.print_help()?);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).context("Failed to read STDIN")?;
        Document::Buffered(buffer)
    };

    let options = SniffOptions { limit: args.limit };
    let results = sniff(&set, document.text()?, &options).context("Failed to evaluate queries")?;

    let mut out = stdout().lock();
    if args.json {
        let pairs = args
            .queries
            .iter()
            .map(String::as_str)
            .zip(results.values().iter().map(Vec::as_slice));
        return write_json(&mut out, pairs);
    }
    let show_query = args.queries.len() > 1;
    for (query, values) in args.queries.iter().zip(results.values()) {
        if args.count {
            write_count(&mut out, query, values.len(), show_query)?;
        } else {
            write_results(&mut out, query, values, show_query)?;
        }
    }
    Ok(())
}
