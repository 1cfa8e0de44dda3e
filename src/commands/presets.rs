//! Presets command implementation
//!
//! Lists the presets the registry defines, in declaration order, with the
//! types each one affects. Presets already recorded in the project's ledger
//! are marked as applied; outside a project nothing is marked.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;

use decomposer::output::{emoji, paint, OutputConfig};
use decomposer::presets::PresetCatalog;
use decomposer::project;

/// Arguments for the presets command
#[derive(Args, Debug)]
pub struct PresetsArgs {
    /// Project directory (defaults to current directory)
    #[arg(long, value_name = "DIR", env = "DECOMPOSER_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Custom metadata registry (YAML)
    #[arg(long, value_name = "FILE")]
    pub registry: Option<PathBuf>,
}

/// One line of the listing
#[derive(Debug, PartialEq, Eq)]
struct PresetLine {
    name: String,
    types: Vec<String>,
    applied: bool,
}

fn collect(args: &PresetsArgs) -> Result<Vec<PresetLine>> {
    let project_dir = super::resolve_project_dir(args.project_dir.clone())?;
    let registry = super::load_registry(args.registry.as_ref())?;
    let catalog = PresetCatalog::new(&registry);
    let applied = project::applied_presets(&project_dir)?;

    catalog
        .list()
        .into_iter()
        .map(|name| {
            let preset = catalog.load(&name)?;
            Ok(PresetLine {
                applied: applied.contains(&preset.name),
                name: preset.name,
                types: preset.affected_types,
            })
        })
        .collect()
}

/// Execute the presets command
pub fn execute(args: PresetsArgs, output: &OutputConfig) -> Result<()> {
    let lines = collect(&args)?;
    if lines.is_empty() {
        println!("No presets defined.");
        return Ok(());
    }

    for line in lines {
        let marker = if line.applied {
            emoji(output, "✅", "[applied]")
        } else {
            emoji(output, "  ", "         ")
        };
        println!(
            "{} {} ({})",
            marker,
            paint(output, &line.name, Style::new().bold()),
            line.types.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_marks_applied_presets() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(project::MANIFEST_FILE),
            r#"{"packageDirectories": [{"path": "pkg"}], "appliedPresets": ["decomposeWorkflowBeta"]}"#,
        )
        .unwrap();

        let lines = collect(&PresetsArgs {
            project_dir: Some(temp.path().to_path_buf()),
            registry: None,
        })
        .unwrap();

        let applied: Vec<&str> = lines
            .iter()
            .filter(|l| l.applied)
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(applied, vec!["decomposeWorkflowBeta"]);
        assert_eq!(lines[0].name, "decomposeCustomLabelsBeta");
    }

    #[test]
    fn test_collect_outside_project() {
        let temp = TempDir::new().unwrap();
        let lines = collect(&PresetsArgs {
            project_dir: Some(temp.path().to_path_buf()),
            registry: None,
        })
        .unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| !l.applied));
    }

    #[test]
    fn test_execute_with_custom_registry() {
        let temp = TempDir::new().unwrap();
        let registry = temp.path().join("registry.yaml");
        fs::write(
            &registry,
            "apiVersion: \"1.0\"\nxmlNamespace: \"urn:test\"\ntypes: []\npresets: []\n",
        )
        .unwrap();

        execute(
            PresetsArgs {
                project_dir: Some(temp.path().to_path_buf()),
                registry: Some(registry),
            },
            &OutputConfig::without_color(),
        )
        .unwrap();
    }
}
