//! Phase 1: Validating
//!
//! Loads the project manifest, resolves the preset and applies the
//! idempotency gate. Nothing is written, so a failure here is always safe
//! to retry.

use crate::defaults::DRY_RUN_DIR;
use crate::error::{Error, Result};
use crate::presets::{Preset, PresetCatalog};
use crate::project::{ProjectManifest, ProjectManifestStore};

/// Everything later phases need from validation
#[derive(Debug, Clone)]
pub struct Validated {
    pub manifest: ProjectManifest,
    pub preset: Preset,
}

/// Execute Phase 1: Validating
///
/// Dry-run output must never overlap a package directory: one declared
/// inside `DRY_RUN_OUTPUT` is always rejected, and a dry run is refused when
/// a package directory contains it.
pub fn execute(
    store: &ProjectManifestStore,
    catalog: &PresetCatalog<'_>,
    preset: &str,
    dry_run: bool,
) -> Result<Validated> {
    let manifest = store.load_for_validation(preset)?;
    let preset = catalog.load(preset)?;

    let dry_run_root = manifest.root.join(DRY_RUN_DIR);
    for dir in &manifest.package_directories {
        let overlap = if dir.full_path.starts_with(&dry_run_root) {
            Some("lies inside")
        } else if dry_run && dry_run_root.starts_with(&dir.full_path) {
            Some("contains")
        } else {
            None
        };
        if let Some(relation) = overlap {
            return Err(Error::ManifestParse {
                path: store.manifest_path(),
                message: format!(
                    "package directory '{}' {} {}",
                    dir.path.display(),
                    relation,
                    DRY_RUN_DIR
                ),
            });
        }
    }

    log::debug!(
        "Preset {} affects {} type(s) across {} package directories",
        preset.name,
        preset.affected_types.len(),
        manifest.package_directories.len()
    );

    Ok(Validated { manifest, preset })
}
