//! Subcommands of the `xsniff` binary.
pub mod generate;
