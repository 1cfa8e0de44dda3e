//! # Decomposer Library
//!
//! This library changes how a project's metadata is split across files on
//! disk by applying a named *preset* of decomposition rules. It is designed
//! to be used by the `decomposer` command-line tool but the pipeline can be
//! driven directly.
//!
//! ## Quick Example
//!
//! ```no_run
//! use decomposer::components::SourceTreeBuilder;
//! use decomposer::convert::LocalConverter;
//! use decomposer::phases::{PipelineOptions, PipelineRunner};
//! use decomposer::registry::Registry;
//!
//! let registry = Registry::builtin()?;
//! let builder = SourceTreeBuilder::for_project("my-project".as_ref())?;
//! let runner = PipelineRunner::new("my-project", &registry, &builder, &LocalConverter);
//!
//! let options = PipelineOptions {
//!     dry_run: true,
//!     ..PipelineOptions::default()
//! };
//! let report = runner.run("decomposeCustomLabelsBeta", &options)?;
//! println!("{} file(s) would be created", report.created_files.len());
//! # Ok::<(), decomposer::error::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Registry (`registry`)**: The metadata types, their on-disk layout
//!   strategies, and the presets that change those strategies.
//! - **Project (`project`)**: The `decomposer-project.json` manifest with its
//!   package directories and the ledger of applied presets.
//! - **Components (`components`)**: Component sets built by walking package
//!   directories.
//! - **Conversion (`convert`, `manifest`)**: Moving component sets between
//!   source format and metadata format, and writing `package.xml`.
//! - **Phases (`phases`)**: The pipeline itself, from validation through
//!   cleanup.
//!
//! ## Execution Flow
//!
//! 1.  **Validating**: Load the project and reject an already-applied preset.
//! 2.  **Scanning**: Build the affected component sets and check layout.
//! 3.  **Composing**: Convert to metadata format in a temp workspace.
//! 4.  **LedgerUpdating**: Record the preset.
//! 5.  **Deleting**: Remove the originals.
//! 6.  **Decomposing**: Convert back under the new rules.
//! 7.  **DryRunRestoring**: On dry run, put the manifest back.
//! 8.  **Cleanup**: Remove the temp workspace.

pub mod components;
pub mod convert;
pub mod defaults;
pub mod error;
pub mod manifest;
pub mod output;
pub mod phases;
pub mod presets;
pub mod project;
pub mod registry;
