//! # Project Manifest
//!
//! Every project carries a `decomposer-project.json` at its root. It declares
//! the package directories and holds the *ledger*: the ordered list of
//! presets already applied to the project.
//!
//! ```json
//! {
//!   "packageDirectories": [{ "path": "pkg", "default": true }],
//!   "sourceApiVersion": "61.0",
//!   "appliedPresets": ["decomposeCustomLabelsBeta"]
//! }
//! ```
//!
//! The ledger is the idempotency gate of the conversion pipeline: a preset
//! that already appears in it is rejected before anything else happens.
//! Fields the tool does not know about are preserved when the file is
//! rewritten.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// File name of the project manifest
pub const MANIFEST_FILE: &str = "decomposer-project.json";

/// Key of the applied-presets ledger inside the manifest
const LEDGER_KEY: &str = "appliedPresets";

/// A package directory declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDirectory {
    /// Path as declared, relative to the project root
    pub path: PathBuf,
    #[serde(default)]
    pub default: bool,
    /// Absolute location on disk
    #[serde(skip)]
    pub full_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFields {
    package_directories: Vec<PackageDirectory>,
    #[serde(default)]
    source_api_version: Option<String>,
    #[serde(default)]
    applied_presets: Vec<String>,
}

/// The parsed project manifest
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    pub root: PathBuf,
    pub package_directories: Vec<PackageDirectory>,
    pub source_api_version: Option<String>,
    pub applied_presets: Vec<String>,
}

impl ProjectManifest {
    pub fn is_applied(&self, preset: &str) -> bool {
        self.applied_presets.iter().any(|p| p == preset)
    }
}

/// Reads and writes the project manifest and its ledger
#[derive(Debug, Clone)]
pub struct ProjectManifestStore {
    root: PathBuf,
}

impl ProjectManifestStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Load and parse the manifest.
    pub fn load(&self) -> Result<ProjectManifest> {
        let raw = self.read_raw()?;
        let path = self.manifest_path();
        let fields: ManifestFields =
            serde_json::from_value(raw).map_err(|e| Error::ManifestParse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if fields.package_directories.is_empty() {
            return Err(Error::ManifestParse {
                path,
                message: "packageDirectories must list at least one directory".to_string(),
            });
        }

        let package_directories = fields
            .package_directories
            .into_iter()
            .map(|mut dir| {
                dir.full_path = self.root.join(&dir.path);
                dir
            })
            .collect();

        Ok(ProjectManifest {
            root: self.root.clone(),
            package_directories,
            source_api_version: fields.source_api_version,
            applied_presets: fields.applied_presets,
        })
    }

    /// Load the manifest and check that `preset` has not been applied yet.
    pub fn load_for_validation(&self, preset: &str) -> Result<ProjectManifest> {
        let manifest = self.load()?;
        if manifest.is_applied(preset) {
            return Err(Error::PresetAlreadyApplied {
                name: preset.to_string(),
            });
        }
        Ok(manifest)
    }

    /// Append `preset` to the ledger and write the manifest immediately.
    pub fn append_preset(&self, preset: &str) -> Result<Vec<String>> {
        let path = self.manifest_path();
        let mut raw = self.read_raw()?;
        let object = raw.as_object_mut().ok_or_else(|| Error::ManifestParse {
            path: path.clone(),
            message: "expected a JSON object".to_string(),
        })?;

        let ledger = object
            .entry(LEDGER_KEY)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| Error::ManifestParse {
                path: path.clone(),
                message: format!("{} must be an array", LEDGER_KEY),
            })?;

        if ledger.iter().any(|v| v.as_str() == Some(preset)) {
            return Err(Error::PresetAlreadyApplied {
                name: preset.to_string(),
            });
        }
        ledger.push(Value::String(preset.to_string()));

        let applied = ledger
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let mut text = serde_json::to_string_pretty(&raw)?;
        text.push('\n');
        fs::write(&path, text).map_err(|e| Error::Filesystem {
            message: format!("Failed to write '{}': {}", path.display(), e),
        })?;

        log::debug!("Recorded preset {} in {}", preset, path.display());
        Ok(applied)
    }

    /// Capture the manifest's bytes exactly as they are on disk.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        let path = self.manifest_path();
        fs::read(&path).map_err(|e| self.read_error(&path, e))
    }

    /// Rewrite the manifest with previously captured bytes.
    pub fn restore_bytes(&self, bytes: &[u8]) -> Result<()> {
        let path = self.manifest_path();
        fs::write(&path, bytes).map_err(|e| Error::Filesystem {
            message: format!("Failed to restore '{}': {}", path.display(), e),
        })
    }

    fn read_raw(&self) -> Result<Value> {
        let path = self.manifest_path();
        let content = fs::read_to_string(&path).map_err(|e| self.read_error(&path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::ManifestParse {
            path,
            message: e.to_string(),
        })
    }

    fn read_error(&self, path: &Path, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ProjectNotFound {
                root: self.root.clone(),
            }
        } else {
            Error::Filesystem {
                message: format!("Failed to read '{}': {}", path.display(), e),
            }
        }
    }
}

/// Presets applied to the project at `root`, or none when it has no manifest.
pub fn applied_presets(root: &Path) -> Result<Vec<String>> {
    match ProjectManifestStore::new(root).load() {
        Ok(manifest) => Ok(manifest.applied_presets),
        Err(Error::ProjectNotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
