//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use decomposer::output::OutputConfig;

use crate::commands;

/// Decomposer - Apply metadata decomposition presets to a project
#[derive(Parser, Debug)]
#[command(name = "decomposer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a decomposition preset to the project
    Convert(commands::convert::ConvertArgs),

    /// List the available presets and mark the applied ones
    Presets(commands::presets::PresetsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Convert(args) => commands::convert::execute(args, &output),
            Commands::Presets(args) => commands::presets::execute(args, &output),
        }
    }
}

/// Initialise `env_logger`. `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second initialisation (e.g. in tests) is harmless
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
