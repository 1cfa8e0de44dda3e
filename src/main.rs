//! # Decomposer CLI
//!
//! This is the binary entry point for the `decomposer` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initialising logging and output preferences.
//! - Executing the appropriate command and reporting top-level errors.
//!
//! The conversion pipeline lives in the `decomposer` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
