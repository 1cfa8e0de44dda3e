//! # Error Handling
//!
//! This module defines the centralized error type for `decomposer`. It uses
//! the `thiserror` library to create a single `Error` enum that covers every
//! anticipated failure mode of the conversion pipeline.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into three groups:
//!   - Validation failures raised before any side effect
//!     (`ProjectNotFound`, `PresetNotFound`, `PresetAlreadyApplied`,
//!     `LayoutViolation` under the error policy).
//!   - Runtime failures (`Conversion`, `Filesystem`, `Xml`, ...). Once the
//!     pipeline has started mutating state these are wrapped in
//!     `Error::Phase` so the caller can tell how far the run got.
//!   - `Cleanup`, which is only ever logged. Removing the temp workspace is
//!     best-effort and never fails a run.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.

use std::path::PathBuf;

use thiserror::Error;

use crate::phases::Phase;

/// Main error type for decomposer operations
#[derive(Error, Debug)]
pub enum Error {
    /// The project manifest file does not exist.
    #[error("Project not found: no {} in {}", crate::project::MANIFEST_FILE, root.display())]
    ProjectNotFound { root: PathBuf },

    /// The project manifest exists but could not be understood.
    #[error("Invalid project manifest {}: {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    /// No preset with the requested name is defined by the registry.
    #[error("Preset not found: {name}{}", hint(available))]
    PresetNotFound {
        name: String,
        /// Valid preset names, shown to the user as a hint
        available: Vec<String>,
    },

    /// The preset is already recorded in the project's ledger.
    #[error("Preset already applied: {name}")]
    PresetAlreadyApplied { name: String },

    /// A package directory with targeted metadata is not rooted at the
    /// expected subpath.
    #[error("Layout violation: {} does not contain {}", package_directory.display(), expected.display())]
    LayoutViolation {
        package_directory: PathBuf,
        expected: PathBuf,
    },

    /// The format converter could not convert a component.
    #[error("Conversion failed for {component}: {message}")]
    Conversion { component: String, message: String },

    /// Removing the temp workspace failed.
    #[error("Failed to clean up {}: {message}", path.display())]
    Cleanup { path: PathBuf, message: String },

    /// A runtime failure, tagged with the pipeline phase it happened in.
    #[error("{phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },

    /// The metadata registry document is invalid or inconsistent.
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// An XML document could not be parsed or has an unexpected shape.
    #[error("XML error in {}: {message}", path.display())]
    Xml { path: PathBuf, message: String },

    /// A filesystem operation failed on a specific path.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn hint(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!("\n  hint: available presets: {}", available.join(", "))
    }
}

impl Error {
    /// Wrap a runtime error with the phase it was raised in.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            // Never double-wrap
            Error::Phase { .. } => self,
            other => Error::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// The phase a runtime error was raised in, if it was tagged with one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The underlying error with any phase tag removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the project may be left partially converted.
    ///
    /// True once the ledger has been updated: any later failure leaves the
    /// new preset recorded and, past `Deleting`, originals removed.
    pub fn is_partially_applied(&self) -> bool {
        matches!(
            self.phase(),
            Some(Phase::Deleting | Phase::Decomposing | Phase::DryRunRestoring)
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
