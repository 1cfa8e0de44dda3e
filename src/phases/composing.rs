//! Phase 3: Composing
//!
//! Converts each unit's component set to metadata format under
//! `<temp_root>/<packageDirPath>`, using the rules in force *before* the
//! preset is recorded. Units touch disjoint subtrees and run in parallel.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::ConversionUnit;
use crate::convert::{ConvertRequest, FormatConverter};
use crate::error::Result;
use crate::manifest::PACKAGE_MANIFEST;
use crate::registry::RegistryView;

/// Compose one unit into the temp workspace and return the files written,
/// `package.xml` included.
pub fn compose_to_temp(
    unit: &ConversionUnit,
    temp_root: &Path,
    registry: &RegistryView,
    converter: &dyn FormatConverter,
) -> Result<Vec<PathBuf>> {
    let output_directory = temp_root.join(&unit.package_directory.path);
    log::debug!(
        "Composing {} component(s) from {} into {}",
        unit.component_set.size(),
        unit.package_directory.path.display(),
        output_directory.display()
    );

    let result = converter.convert(
        &unit.component_set,
        registry,
        ConvertRequest::Metadata {
            output_directory: &output_directory,
        },
    )?;

    let mut written = result.paths();
    let manifest = output_directory.join(PACKAGE_MANIFEST);
    if manifest.is_file() {
        written.push(manifest);
    }
    Ok(written)
}

/// Execute Phase 3: compose every unit.
pub fn execute(
    units: &[ConversionUnit],
    temp_root: &Path,
    registry: &RegistryView,
    converter: &dyn FormatConverter,
) -> Result<Vec<PathBuf>> {
    let written = units
        .par_iter()
        .map(|unit| compose_to_temp(unit, temp_root, registry, converter))
        .collect::<Result<Vec<_>>>()?;

    let written: Vec<PathBuf> = written.into_iter().flatten().collect();
    log::info!("Composed {} file(s) into {}", written.len(), temp_root.display());
    Ok(written)
}
