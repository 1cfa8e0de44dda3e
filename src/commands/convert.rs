//! Convert command implementation
//!
//! Runs the full conversion pipeline for one preset:
//! 1. Validate the project and preset
//! 2. Scan the package directories
//! 3. Compose into a temp workspace
//! 4. Record the preset in the ledger
//! 5. Delete the originals (skipped on dry run)
//! 6. Decompose back under the new rules
//! 7. Restore the manifest on dry run, then clean up

use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Args, ValueEnum};
use console::Style;
use dialoguer::{theme::ColorfulTheme, Confirm};

use decomposer::components::SourceTreeBuilder;
use decomposer::convert::LocalConverter;
use decomposer::output::{display_path, emoji, paint, OutputConfig};
use decomposer::phases::{LayoutPolicy, PipelineOptions, PipelineReport, PipelineRunner};

/// How to treat a package directory not rooted at `main/default`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LayoutPolicyArg {
    /// Print a warning and continue
    #[default]
    Warn,
    /// Abort before anything is changed
    Error,
}

impl From<LayoutPolicyArg> for LayoutPolicy {
    fn from(arg: LayoutPolicyArg) -> Self {
        match arg {
            LayoutPolicyArg::Warn => LayoutPolicy::Warn,
            LayoutPolicyArg::Error => LayoutPolicy::Error,
        }
    }
}

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Name of the preset to apply
    #[arg(short, long, value_name = "NAME")]
    pub preset: String,

    /// Show what would change; output goes to DRY_RUN_OUTPUT
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Keep the temp workspace and print its location
    #[arg(long)]
    pub preserve_temp_dir: bool,

    /// Treatment of package directories without main/default
    #[arg(long, value_enum, value_name = "POLICY", default_value_t = LayoutPolicyArg::Warn)]
    pub layout_policy: LayoutPolicyArg,

    /// Project directory (defaults to current directory)
    #[arg(long, value_name = "DIR", env = "DECOMPOSER_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Custom metadata registry (YAML)
    #[arg(long, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the convert command
pub fn execute(args: ConvertArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();
    let project_dir = super::resolve_project_dir(args.project_dir)?;
    let registry = super::load_registry(args.registry.as_ref())?;
    let builder = SourceTreeBuilder::for_project(&project_dir)?;

    if !args.dry_run && !args.yes && std::io::stdin().is_terminal() {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Apply preset {} to {}? Original files will be deleted.",
                args.preset,
                project_dir.display()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Conversion cancelled.");
            return Ok(());
        }
    }

    if args.dry_run {
        println!(
            "{} DRY RUN MODE - the project will not be changed",
            emoji(output, "🔎", "[DRY RUN]")
        );
        println!();
    }

    let runner = PipelineRunner::new(&project_dir, &registry, &builder, &LocalConverter);
    let options = PipelineOptions {
        dry_run: args.dry_run,
        preserve_temp_dir: args.preserve_temp_dir,
        layout_policy: args.layout_policy.into(),
        temp_root: None,
    };

    match runner.run(&args.preset, &options) {
        Ok(report) => {
            print_report(&project_dir, &report, output);
            println!(
                "{} Applied {} in {:.2}s",
                emoji(output, "✅", "[OK]"),
                args.preset,
                start_time.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} Conversion failed", emoji(output, "❌", "[FAIL]"));
            if e.is_partially_applied() {
                println!(
                    "{} The project may be partially converted: {} is recorded as applied",
                    emoji(output, "⚠️ ", "[WARN]"),
                    args.preset
                );
            }
            Err(e.into())
        }
    }
}

fn print_report(root: &Path, report: &PipelineReport, output: &OutputConfig) {
    for warning in &report.warnings {
        println!(
            "{} {}",
            paint(output, "warning:", Style::new().yellow().bold()),
            warning
        );
    }

    let deleted_label = if report.dry_run_root.is_some() {
        "Would delete"
    } else {
        "Deleted"
    };
    print_files(root, deleted_label, &report.deleted_files, output);
    print_files(root, "Created", &report.created_files, output);

    if let Some(dry_run_root) = &report.dry_run_root {
        println!("Dry-run output: {}", dry_run_root.display());
    }
    if let Some(temp_dir) = &report.temp_dir {
        println!("Temp workspace kept at {}", temp_dir.display());
    }
    println!("Applied presets: {}", report.applied_presets.join(", "));
}

fn print_files(root: &Path, label: &str, files: &HashSet<PathBuf>, output: &OutputConfig) {
    println!("{} {} file(s)", paint(output, label, Style::new().bold()), files.len());
    for file in files {
        println!("   {}", display_path(root, file));
    }
}
