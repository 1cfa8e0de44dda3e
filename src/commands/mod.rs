//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `decomposer` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `decomposer` library.

pub mod convert;
pub mod presets;

use std::path::PathBuf;

use anyhow::{Context, Result};
use decomposer::registry::Registry;

/// The project directory from the flag, or the current directory.
pub(crate) fn resolve_project_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to determine the current directory"),
    }
}

/// The registry from `--registry`, or the built-in one.
pub(crate) fn load_registry(path: Option<&PathBuf>) -> Result<Registry> {
    match path {
        Some(path) => Registry::from_file(path)
            .with_context(|| format!("Failed to load registry {}", path.display())),
        None => Ok(Registry::builtin()?),
    }
}
