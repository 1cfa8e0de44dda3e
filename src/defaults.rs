//! Default values for decomposer.
//!
//! This module provides the well-known directory names and environment
//! overrides used across the pipeline and the commands.

use std::path::PathBuf;

/// Subpath every package directory is expected to be rooted at
pub const DEFAULT_PACKAGE_ROOT: &str = "main/default";

/// Directory under the project root that receives dry-run output
pub const DRY_RUN_DIR: &str = "DRY_RUN_OUTPUT";

/// Environment variable overriding where temp workspaces are created
pub const TEMP_DIR_ENV: &str = "DECOMPOSER_TEMP_DIR";

/// Returns the default temp root.
///
/// Uses `DECOMPOSER_TEMP_DIR` when it is set to a non-empty value, and the
/// platform temp directory otherwise.
pub fn default_temp_root() -> PathBuf {
    match std::env::var_os(TEMP_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir(),
    }
}
