//! Orchestrator for a complete preset conversion
//!
//! `PipelineRunner` drives the phases in order and owns the two pieces of
//! run-wide state: the temp workspace and, on dry run, the captured manifest
//! bytes.
//!
//! Two registry views are used. Composing sees the rules from before the
//! preset was recorded; decomposing sees a view fetched *after* the ledger
//! update, so the same converter writes the new layout. Nothing global is
//! mutated to switch between them.
//!
//! Failures in Validating or Scanning are returned unchanged and leave the
//! project untouched. Later failures are tagged with their phase. There is no
//! rollback: once the ledger has been updated the preset stays recorded, and
//! once Deleting has run the originals stay deleted.

use std::fs;
use std::path::{Path, PathBuf};

use super::{
    composing, decomposing, reconcile, scanning, validation, ConversionUnit, Phase,
    PipelineOptions, PipelineReport,
};
use crate::components::ComponentSetBuilder;
use crate::convert::FormatConverter;
use crate::defaults::{default_temp_root, DRY_RUN_DIR};
use crate::error::{Error, Result};
use crate::presets::PresetCatalog;
use crate::project::ProjectManifestStore;
use crate::registry::{MetadataRegistry, RegistryView};

/// Drives one conversion of one project
pub struct PipelineRunner<'a> {
    store: ProjectManifestStore,
    registry: &'a dyn MetadataRegistry,
    builder: &'a dyn ComponentSetBuilder,
    converter: &'a dyn FormatConverter,
}

/// The temp directory for one run, removed on drop unless kept
struct TempWorkspace {
    path: PathBuf,
    keep: bool,
}

impl TempWorkspace {
    fn create(temp_root: &Path) -> Result<Self> {
        fs::create_dir_all(temp_root).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", temp_root.display(), e),
        })?;
        let dir = tempfile::Builder::new()
            .prefix("decomposer-")
            .tempdir_in(temp_root)
            .map_err(|e| Error::Filesystem {
                message: format!(
                    "Failed to create temp workspace in '{}': {}",
                    temp_root.display(),
                    e
                ),
            })?;
        Ok(Self {
            path: dir.keep(),
            keep: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort removal; failures are logged and swallowed.
    fn cleanup(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            let error = Error::Cleanup {
                path: self.path.clone(),
                message: e.to_string(),
            };
            log::warn!("{}", error);
        }
        // Only attempt removal once
        self.keep = true;
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        project_root: impl Into<PathBuf>,
        registry: &'a dyn MetadataRegistry,
        builder: &'a dyn ComponentSetBuilder,
        converter: &'a dyn FormatConverter,
    ) -> Self {
        Self {
            store: ProjectManifestStore::new(project_root),
            registry,
            builder,
            converter,
        }
    }

    pub fn project_root(&self) -> &Path {
        self.store.root()
    }

    /// Apply `preset` to the project.
    pub fn run(&self, preset: &str, options: &PipelineOptions) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        let result = self.run_phases(preset, options, &mut report);
        match result {
            Ok(()) => {
                enter(&mut report, Phase::Done);
                Ok(report)
            }
            Err(e) => {
                enter(&mut report, Phase::Aborted);
                log::debug!("Conversion aborted: {}", e);
                Err(e)
            }
        }
    }

    fn run_phases(
        &self,
        preset: &str,
        options: &PipelineOptions,
        report: &mut PipelineReport,
    ) -> Result<()> {
        let root = self.store.root().to_path_buf();
        enter(report, Phase::Idle);

        // Phase 1: Validating
        enter(report, Phase::Validating);
        let catalog = PresetCatalog::new(self.registry);
        let validated = validation::execute(&self.store, &catalog, preset, options.dry_run)?;
        let types = validated.preset.affected_types.clone();

        // Phase 2: Scanning
        enter(report, Phase::Scanning);
        let view_before = self.registry.view(&root)?;
        let (units, warnings) = scanning::execute(
            &validated.manifest,
            &types,
            &view_before,
            self.builder,
            options.layout_policy,
        )?;
        report.warnings = warnings;

        // Last point with no side effects
        let snapshot = if options.dry_run {
            Some(self.store.snapshot_bytes()?)
        } else {
            None
        };
        let temp_root = options.temp_root.clone().unwrap_or_else(default_temp_root);
        let mut workspace =
            TempWorkspace::create(&temp_root).map_err(|e| e.in_phase(Phase::Composing))?;
        workspace.keep = options.preserve_temp_dir;
        log::debug!("Temp workspace at {}", workspace.path().display());

        let outcome = self.mutate(
            &validated.preset.name,
            &types,
            &units,
            &view_before,
            workspace.path(),
            snapshot.as_deref(),
            options,
            report,
        );

        // A failed dry run still gives the manifest back
        if let (Err(_), Some(bytes)) = (&outcome, &snapshot) {
            if !report.phases.contains(&Phase::DryRunRestoring) {
                enter(report, Phase::DryRunRestoring);
                if let Err(e) = self.store.restore_bytes(bytes) {
                    log::warn!("Failed to restore project manifest: {}", e);
                }
            }
        }

        // Phase 8: Cleanup
        enter(report, Phase::Cleanup);
        if options.preserve_temp_dir {
            log::info!("Keeping temp workspace {}", workspace.path().display());
            report.temp_dir = Some(workspace.path().to_path_buf());
        }
        workspace.cleanup();

        outcome
    }

    /// Phases 3 to 7: everything that writes.
    #[allow(clippy::too_many_arguments)]
    fn mutate(
        &self,
        preset: &str,
        types: &[String],
        units: &[ConversionUnit],
        view_before: &RegistryView,
        temp_dir: &Path,
        snapshot: Option<&[u8]>,
        options: &PipelineOptions,
        report: &mut PipelineReport,
    ) -> Result<()> {
        let root = self.store.root();

        // Phase 3: Composing
        enter(report, Phase::Composing);
        composing::execute(units, temp_dir, view_before, self.converter)
            .map_err(|e| e.in_phase(Phase::Composing))?;
        let to_delete =
            reconcile::files_to_delete(units).map_err(|e| e.in_phase(Phase::Composing))?;

        // Phase 4: LedgerUpdating (barrier)
        enter(report, Phase::LedgerUpdating);
        report.applied_presets = self
            .store
            .append_preset(preset)
            .map_err(|e| e.in_phase(Phase::LedgerUpdating))?;
        let view_after = self
            .registry
            .view(root)
            .map_err(|e| e.in_phase(Phase::LedgerUpdating))?;

        // Phase 5: Deleting
        if !options.dry_run {
            enter(report, Phase::Deleting);
            reconcile::delete_files(&to_delete).map_err(|e| e.in_phase(Phase::Deleting))?;
        }
        report.deleted_files = to_delete;

        // Phase 6: Decomposing
        enter(report, Phase::Decomposing);
        let dry_run_root = options.dry_run.then(|| root.join(DRY_RUN_DIR));
        report.created_files = decomposing::execute(
            units,
            temp_dir,
            dry_run_root.as_deref(),
            types,
            &view_after,
            self.builder,
            self.converter,
        )
        .map_err(|e| e.in_phase(Phase::Decomposing))?;
        report.dry_run_root = dry_run_root;

        // Phase 7: DryRunRestoring
        if let Some(bytes) = snapshot {
            enter(report, Phase::DryRunRestoring);
            self.store
                .restore_bytes(bytes)
                .map_err(|e| e.in_phase(Phase::DryRunRestoring))?;
        }

        Ok(())
    }
}

fn enter(report: &mut PipelineReport, phase: Phase) {
    log::debug!("Entering phase: {}", phase);
    report.phases.push(phase);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::SourceTreeBuilder;
    use crate::convert::LocalConverter;
    use crate::phases::LayoutPolicy;
    use crate::registry::Registry;
    use tempfile::TempDir;

    const LABELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CustomLabels xmlns="http://soap.sforce.com/2006/04/metadata">
    <labels>
        <fullName>A</fullName>
        <value>a</value>
    </labels>
    <labels>
        <fullName>B</fullName>
        <value>b</value>
    </labels>
</CustomLabels>
"#;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(
            root.join(crate::project::MANIFEST_FILE),
            "{\n  \"packageDirectories\": [{ \"path\": \"pkg\" }]\n}\n",
        )
        .unwrap();
        let labels = root.join("pkg/main/default/labels");
        fs::create_dir_all(&labels).unwrap();
        fs::write(labels.join("CustomLabels.labels-meta.xml"), LABELS).unwrap();
        temp
    }

    fn options(temp: &TempDir) -> PipelineOptions {
        PipelineOptions {
            temp_root: Some(temp.path().to_path_buf()),
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_run_visits_phases_in_order() {
        let project = project();
        let scratch = TempDir::new().unwrap();
        let registry = Registry::builtin().unwrap();
        let builder = SourceTreeBuilder::new();
        let runner = PipelineRunner::new(project.path(), &registry, &builder, &LocalConverter);

        let report = runner
            .run("decomposeCustomLabelsBeta", &options(&scratch))
            .unwrap();

        assert_eq!(
            report.phases,
            vec![
                Phase::Idle,
                Phase::Validating,
                Phase::Scanning,
                Phase::Composing,
                Phase::LedgerUpdating,
                Phase::Deleting,
                Phase::Decomposing,
                Phase::Cleanup,
                Phase::Done,
            ]
        );
        assert_eq!(report.applied_presets, vec!["decomposeCustomLabelsBeta"]);
        assert_eq!(report.created_files.len(), 2);
        assert!(report.temp_dir.is_none());
        // The temp workspace is gone
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dry_run_visits_restore_phase() {
        let project = project();
        let scratch = TempDir::new().unwrap();
        let registry = Registry::builtin().unwrap();
        let builder = SourceTreeBuilder::new();
        let runner = PipelineRunner::new(project.path(), &registry, &builder, &LocalConverter);

        let mut opts = options(&scratch);
        opts.dry_run = true;
        let report = runner.run("decomposeCustomLabelsBeta", &opts).unwrap();

        assert!(report.phases.contains(&Phase::DryRunRestoring));
        assert!(!report.phases.contains(&Phase::Deleting));
        assert_eq!(
            report.dry_run_root.as_deref(),
            Some(project.path().join(DRY_RUN_DIR).as_path())
        );
    }

    #[test]
    fn test_preserved_temp_dir_is_reported() {
        let project = project();
        let scratch = TempDir::new().unwrap();
        let registry = Registry::builtin().unwrap();
        let builder = SourceTreeBuilder::new();
        let runner = PipelineRunner::new(project.path(), &registry, &builder, &LocalConverter);

        let mut opts = options(&scratch);
        opts.preserve_temp_dir = true;
        let report = runner.run("decomposeCustomLabelsBeta", &opts).unwrap();

        let temp_dir = report.temp_dir.unwrap();
        assert!(temp_dir.join("pkg/labels/CustomLabels.labels").is_file());
        assert!(temp_dir.join("pkg/package.xml").is_file());
    }

    #[test]
    fn test_layout_error_policy_aborts_before_mutation() {
        let project = project();
        let root = project.path();
        fs::rename(root.join("pkg/main/default/labels"), root.join("pkg/labels")).unwrap();
        fs::remove_dir_all(root.join("pkg/main")).unwrap();
        let before = fs::read(root.join(crate::project::MANIFEST_FILE)).unwrap();

        let scratch = TempDir::new().unwrap();
        let registry = Registry::builtin().unwrap();
        let builder = SourceTreeBuilder::new();
        let runner = PipelineRunner::new(root, &registry, &builder, &LocalConverter);

        let mut opts = options(&scratch);
        opts.layout_policy = LayoutPolicy::Error;
        let err = runner.run("decomposeCustomLabelsBeta", &opts).unwrap_err();

        assert!(matches!(err, Error::LayoutViolation { .. }));
        assert!(err.phase().is_none());
        assert_eq!(fs::read(root.join(crate::project::MANIFEST_FILE)).unwrap(), before);
        assert!(root.join("pkg/labels/CustomLabels.labels-meta.xml").exists());
    }

    #[test]
    fn test_conversion_failure_is_tagged_with_phase() {
        let project = project();
        let root = project.path();
        fs::write(
            root.join("pkg/main/default/labels/CustomLabels.labels-meta.xml"),
            "<CustomLabels><labels><value>no name</value></labels></CustomLabels>",
        )
        .unwrap();

        let scratch = TempDir::new().unwrap();
        let registry = Registry::builtin().unwrap();
        let builder = SourceTreeBuilder::new();
        let runner = PipelineRunner::new(root, &registry, &builder, &LocalConverter);

        let err = runner
            .run("decomposeCustomLabelsBeta", &options(&scratch))
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Decomposing));
        assert!(err.is_partially_applied());
        assert!(matches!(err.root(), Error::Conversion { .. }));
        // Documented partial failure: the ledger keeps the preset
        assert_eq!(
            crate::project::applied_presets(root).unwrap(),
            vec!["decomposeCustomLabelsBeta"]
        );
        // The temp workspace is still removed
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
