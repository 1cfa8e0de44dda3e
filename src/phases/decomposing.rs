//! Phase 6: Decomposing
//!
//! Reads the composed files back out of the temp workspace and converts them
//! to source format under the rules in force *after* the preset was recorded.
//!
//! In merge mode the real package directory is rescanned under the new rules
//! and handed to the converter, so output lands next to whatever already
//! exists there and untouched files survive. In isolate mode everything goes
//! to the dry-run tree instead.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::{ConversionUnit, DecomposeMode};
use crate::components::{BuildRequest, ComponentSetBuilder};
use crate::convert::{ConvertRequest, ConvertResult, FormatConverter, SourceOutput};
use crate::error::{Error, Result};
use crate::registry::RegistryView;

/// Decompose one unit out of the temp workspace.
///
/// An empty temp set is not an error and yields an empty result.
pub fn decompose_from_temp(
    temp_root: &Path,
    unit: &ConversionUnit,
    mode: &DecomposeMode,
    types: &[String],
    registry: &RegistryView,
    builder: &dyn ComponentSetBuilder,
    converter: &dyn FormatConverter,
) -> Result<ConvertResult> {
    let package = &unit.package_directory;
    let project_root = unit.component_set.project_root().to_path_buf();
    let api_version = Some(unit.component_set.api_version().to_string());

    let composed = builder.build(
        &BuildRequest {
            types: types.to_vec(),
            directories: vec![temp_root.join(&package.path)],
            project_root: project_root.clone(),
            api_version: api_version.clone(),
        },
        registry,
    )?;

    if composed.is_empty() {
        log::debug!("Nothing to decompose for {}", package.path.display());
        return Ok(ConvertResult::default());
    }

    log::debug!(
        "Decomposing {} component(s) for {}",
        composed.size(),
        package.path.display()
    );

    match mode {
        DecomposeMode::Merge { target_package_dir } => {
            let existing = builder.build(
                &BuildRequest {
                    types: types.to_vec(),
                    directories: vec![target_package_dir.clone()],
                    project_root,
                    api_version,
                },
                registry,
            )?;
            converter.convert(
                &composed,
                registry,
                ConvertRequest::Source {
                    output: SourceOutput::MergeWith {
                        set: &existing,
                        default_directory: target_package_dir,
                    },
                },
            )
        }
        DecomposeMode::Isolate { dry_run_root } => {
            let output = dry_run_root.join(&package.path);
            converter.convert(
                &composed,
                registry,
                ConvertRequest::Source {
                    output: SourceOutput::Directory(&output),
                },
            )
        }
    }
}

/// Remove a previous dry run's output.
pub fn clear_dry_run_root(dry_run_root: &Path) -> Result<()> {
    if !dry_run_root.exists() {
        return Ok(());
    }
    log::debug!("Clearing {}", dry_run_root.display());
    fs::remove_dir_all(dry_run_root).map_err(|e| Error::Filesystem {
        message: format!("Failed to clear '{}': {}", dry_run_root.display(), e),
    })
}

/// Execute Phase 6: decompose every unit and collect the files created.
///
/// With `dry_run_root` set, every unit is isolated under it; otherwise each
/// unit merges back into its own package directory.
pub fn execute(
    units: &[ConversionUnit],
    temp_root: &Path,
    dry_run_root: Option<&Path>,
    types: &[String],
    registry: &RegistryView,
    builder: &dyn ComponentSetBuilder,
    converter: &dyn FormatConverter,
) -> Result<HashSet<PathBuf>> {
    if let Some(root) = dry_run_root {
        clear_dry_run_root(root)?;
    }

    let results = units
        .par_iter()
        .map(|unit| {
            let mode = match dry_run_root {
                Some(root) => DecomposeMode::Isolate {
                    dry_run_root: root.to_path_buf(),
                },
                None => DecomposeMode::Merge {
                    target_package_dir: unit.package_directory.full_path.clone(),
                },
            };
            decompose_from_temp(temp_root, unit, &mode, types, registry, builder, converter)
        })
        .collect::<Result<Vec<_>>>()?;

    let created = super::reconcile::files_created(&results);
    log::info!("Decomposed into {} file(s)", created.len());
    Ok(created)
}
