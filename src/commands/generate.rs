//! `generate` subcommand.
use anyhow::{Context, Result};
use clap::Command;
use clap_complete::Shell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write completions for `shell` to `writer`.
pub fn completions<W: Write>(shell: Shell, cmd: &mut Command, writer: &mut W) {
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, cmd, name, writer);
}

/// Render the man page of `cmd` and of each of its subcommands, recursively,
/// into `output_dir` (the current directory by default). Returns the paths
/// written.
///
/// # Errors
///
/// Returns an error if the output directory or a page cannot be written.
pub fn man_pages(cmd: &Command, output_dir: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    let output_dir = match output_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Opening current directory")?,
    };
    std::fs::create_dir_all(&output_dir).context("create output Man directories")?;

    let mut written = Vec::new();
    render(cmd.clone(), &output_dir, &mut written)?;
    subcommand_pages(cmd, &output_dir, cmd.get_name(), &mut written)?;
    Ok(written)
}

fn render(cmd: Command, output_dir: &Path, written: &mut Vec<PathBuf>) -> Result<()> {
    let path = output_dir.join(format!("{}.1", cmd.get_name()));
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    clap_mangen::Man::new(cmd).render(&mut file)?;
    written.push(path);
    Ok(())
}

/// Pages for subcommands are named `<parent>-<subcommand>.1`.
fn subcommand_pages(
    cmd: &Command,
    output_dir: &Path,
    prefix: &str,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    for subcmd in cmd.get_subcommands() {
        let prefixed = format!("{prefix}-{}", subcmd.get_name());
        // clap_mangen takes the page name from the command itself; the name
        // must be 'static, which is fine for a one-shot generation
        let name: &'static str = Box::leak(prefixed.clone().into_boxed_str());
        let renamed = subcmd.clone().name(name).disable_help_subcommand(true);
        render(renamed, output_dir, written)?;
        if subcmd.has_subcommands() {
            subcommand_pages(subcmd, output_dir, &prefixed, written)?;
        }
    }
    Ok(())
}
