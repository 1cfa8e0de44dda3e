//! Implementation of the phases of a preset conversion.
//!
//! ## Overview
//!
//! A conversion runs as an explicit sequence of phases:
//! 1. Validating - Load the project manifest and resolve the preset
//! 2. Scanning - Build one component set per package directory and check layout
//! 3. Composing - Convert every unit to metadata format in a temp workspace
//! 4. LedgerUpdating - Record the preset in the project manifest
//! 5. Deleting - Remove the original files (skipped on dry run)
//! 6. Decomposing - Convert back to source format under the new rules
//! 7. DryRunRestoring - Put the manifest bytes back (dry run only)
//! 8. Cleanup - Remove the temp workspace unless asked to keep it
//!
//! Validating and Scanning have no side effects, so any failure there leaves
//! the project untouched. LedgerUpdating is a barrier: every compose finishes
//! before it and no delete or decompose starts until it has committed.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::components::ComponentSet;
use crate::project::PackageDirectory;

// Phase modules
pub mod composing;
pub mod decomposing;
pub mod orchestrator;
pub mod reconcile;
pub mod scanning;
pub mod validation;

pub use orchestrator::PipelineRunner;

/// State of the conversion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Validating,
    Scanning,
    Composing,
    LedgerUpdating,
    Deleting,
    Decomposing,
    DryRunRestoring,
    Cleanup,
    Done,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Validating => "validating",
            Phase::Scanning => "scanning",
            Phase::Composing => "composing",
            Phase::LedgerUpdating => "ledger update",
            Phase::Deleting => "deleting",
            Phase::Decomposing => "decomposing",
            Phase::DryRunRestoring => "dry-run restore",
            Phase::Cleanup => "cleanup",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A package directory together with its non-empty scoped component set
#[derive(Debug, Clone)]
pub struct ConversionUnit {
    pub package_directory: PackageDirectory,
    pub component_set: ComponentSet,
}

/// What to do when a package directory is not rooted at the expected subpath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutPolicy {
    /// Collect a warning and continue
    #[default]
    Warn,
    /// Abort before any mutation
    Error,
}

/// A non-fatal layout violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutWarning {
    pub package_directory: PathBuf,
    pub expected: PathBuf,
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} does not contain {}",
            self.package_directory.display(),
            self.expected.display()
        )
    }
}

/// Where decomposed output is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecomposeMode {
    /// Merge back into the real package directory
    Merge { target_package_dir: PathBuf },
    /// Write to `<dry_run_root>/<packageDirPath>`, leaving the project alone
    Isolate { dry_run_root: PathBuf },
}

/// Caller-selectable options for one run
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub dry_run: bool,
    pub preserve_temp_dir: bool,
    pub layout_policy: LayoutPolicy,
    /// Where the temp workspace is created; see `defaults::default_temp_root`
    pub temp_root: Option<PathBuf>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub applied_presets: Vec<String>,
    pub deleted_files: HashSet<PathBuf>,
    pub created_files: HashSet<PathBuf>,
    pub warnings: Vec<LayoutWarning>,
    /// Phases visited, in order
    pub phases: Vec<Phase>,
    /// Set only when the temp workspace was preserved
    pub temp_dir: Option<PathBuf>,
    /// Set only on dry run
    pub dry_run_root: Option<PathBuf>,
}
