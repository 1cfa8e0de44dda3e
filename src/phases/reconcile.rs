//! Reconciliation of the files a run deletes and creates.
//!
//! Both sides are plain sets: a file shared by two components, or reached
//! both as an xml path and through a content directory, is counted once.
//! Callers get no ordering promise.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use walkdir::WalkDir;

use super::ConversionUnit;
use crate::convert::ConvertResult;
use crate::error::{Error, Result};

/// Every file referenced by the units' original component sets.
///
/// Content directories are walked; only files are returned.
pub fn files_to_delete(units: &[ConversionUnit]) -> Result<HashSet<PathBuf>> {
    let mut files = HashSet::new();

    for unit in units {
        for component in unit.component_set.enumerate_files() {
            files.extend(component.xml_path);
            for content in &component.content_paths {
                for entry in WalkDir::new(content) {
                    let entry = entry.map_err(|e| Error::Filesystem {
                        message: format!("Failed to walk '{}': {}", content.display(), e),
                    })?;
                    if entry.file_type().is_file() {
                        files.insert(entry.into_path());
                    }
                }
            }
        }
    }

    Ok(files)
}

/// Every path written by the given conversions.
pub fn files_created(results: &[ConvertResult]) -> HashSet<PathBuf> {
    results.iter().flat_map(ConvertResult::paths).collect()
}

/// Remove `files`. A file that is already gone is not an error.
pub fn delete_files(files: &HashSet<PathBuf>) -> Result<()> {
    for file in files {
        match fs::remove_file(file) {
            Ok(()) => log::debug!("Deleted {}", file.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::Filesystem {
                    message: format!("Failed to delete '{}': {}", file.display(), e),
                })
            }
        }
    }
    log::info!("Deleted {} original file(s)", files.len());
    Ok(())
}
