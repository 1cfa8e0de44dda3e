//! Phase 2: Scanning
//!
//! Builds one component set per package directory, scoped to the preset's
//! types, and checks that every directory holding targeted metadata is rooted
//! at `main/default`.
//!
//! Directories with nothing to convert are dropped before the layout check,
//! so a directory unrelated to the preset never produces a warning.

use super::{ConversionUnit, LayoutPolicy, LayoutWarning};
use crate::components::{BuildRequest, ComponentSetBuilder};
use crate::defaults::DEFAULT_PACKAGE_ROOT;
use crate::error::{Error, Result};
use crate::project::ProjectManifest;
use crate::registry::RegistryView;

/// Build the conversion units for `types`, in declaration order.
pub fn scan(
    project: &ProjectManifest,
    types: &[String],
    registry: &RegistryView,
    builder: &dyn ComponentSetBuilder,
) -> Result<Vec<ConversionUnit>> {
    let mut units = Vec::new();

    for dir in &project.package_directories {
        let request = BuildRequest {
            types: types.to_vec(),
            directories: vec![dir.full_path.clone()],
            project_root: project.root.clone(),
            api_version: project.source_api_version.clone(),
        };
        let set = builder.build(&request, registry)?;

        if set.is_empty() {
            log::debug!("Skipping {}: nothing to convert", dir.path.display());
            continue;
        }

        log::debug!(
            "Found {} component(s) in {}",
            set.size(),
            dir.path.display()
        );
        units.push(ConversionUnit {
            package_directory: dir.clone(),
            component_set: set,
        });
    }

    Ok(units)
}

/// Check every unit's directory for the expected root subpath.
///
/// Under `LayoutPolicy::Error` the first violation is returned as an error.
pub fn validate_layout(
    units: &[ConversionUnit],
    policy: LayoutPolicy,
) -> Result<Vec<LayoutWarning>> {
    let mut warnings = Vec::new();

    for unit in units {
        let dir = &unit.package_directory.full_path;
        let expected = dir.join(DEFAULT_PACKAGE_ROOT);
        if expected.is_dir() {
            continue;
        }

        match policy {
            LayoutPolicy::Error => {
                return Err(Error::LayoutViolation {
                    package_directory: dir.clone(),
                    expected,
                });
            }
            LayoutPolicy::Warn => {
                let warning = LayoutWarning {
                    package_directory: dir.clone(),
                    expected,
                };
                log::warn!("Layout violation: {}", warning);
                warnings.push(warning);
            }
        }
    }

    Ok(warnings)
}

/// Execute Phase 2: scan and validate layout.
pub fn execute(
    project: &ProjectManifest,
    types: &[String],
    registry: &RegistryView,
    builder: &dyn ComponentSetBuilder,
    policy: LayoutPolicy,
) -> Result<(Vec<ConversionUnit>, Vec<LayoutWarning>)> {
    let units = scan(project, types, registry, builder)?;
    let warnings = validate_layout(&units, policy)?;
    log::info!(
        "Scanned {} package director{}, {} to convert",
        project.package_directories.len(),
        if project.package_directories.len() == 1 { "y" } else { "ies" },
        units.len()
    );
    Ok((units, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::SourceTreeBuilder;
    use crate::project::ProjectManifestStore;
    use crate::registry::Registry;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn setup() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            crate::project::MANIFEST_FILE,
            r#"{"packageDirectories": [{"path": "pkg"}, {"path": "other"}, {"path": "bad"}]}"#,
        );
        write(root, "pkg/main/default/labels/CustomLabels.labels-meta.xml", "<x/>");
        write(root, "other/main/default/classes/Foo.cls-meta.xml", "<x/>");
        write(root, "bad/labels/CustomLabels.labels-meta.xml", "<x/>");
        temp
    }

    fn label_types() -> Vec<String> {
        vec!["CustomLabels".to_string(), "CustomLabel".to_string()]
    }

    #[test]
    fn test_scan_drops_empty_directories() {
        let temp = setup();
        let manifest = ProjectManifestStore::new(temp.path()).load().unwrap();
        let view = Registry::builtin().unwrap().base_view();

        let units = scan(&manifest, &label_types(), &view, &SourceTreeBuilder::new()).unwrap();
        let paths: Vec<_> = units
            .iter()
            .map(|u| u.package_directory.path.clone())
            .collect();
        assert_eq!(paths, vec![Path::new("pkg"), Path::new("bad")]);
    }

    #[test]
    fn test_warn_policy_collects_warnings() {
        let temp = setup();
        let manifest = ProjectManifestStore::new(temp.path()).load().unwrap();
        let view = Registry::builtin().unwrap().base_view();

        let (units, warnings) = execute(
            &manifest,
            &label_types(),
            &view,
            &SourceTreeBuilder::new(),
            LayoutPolicy::Warn,
        )
        .unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].package_directory, temp.path().join("bad"));
    }

    #[test]
    fn test_error_policy_aborts() {
        let temp = setup();
        let manifest = ProjectManifestStore::new(temp.path()).load().unwrap();
        let view = Registry::builtin().unwrap().base_view();

        let err = execute(
            &manifest,
            &label_types(),
            &view,
            &SourceTreeBuilder::new(),
            LayoutPolicy::Error,
        )
        .unwrap_err();
        assert!(matches!(err, Error::LayoutViolation { .. }));
    }

    #[test]
    fn test_unrelated_directory_never_warns() {
        let temp = setup();
        fs::remove_dir_all(temp.path().join("bad")).unwrap();
        write(temp.path(), "bad/classes/Bar.cls-meta.xml", "<x/>");
        let manifest = ProjectManifestStore::new(temp.path()).load().unwrap();
        let view = Registry::builtin().unwrap().base_view();

        let (units, warnings) = execute(
            &manifest,
            &label_types(),
            &view,
            &SourceTreeBuilder::new(),
            LayoutPolicy::Error,
        )
        .unwrap();
        assert_eq!(units.len(), 1);
        assert!(warnings.is_empty());
    }
}
