//! Terminal styling for the `convert` and `presets` commands.
//!
//! `--color=auto` defers to `console`, which looks at the TTY, `TERM`,
//! `CLICOLOR` and `CLICOLOR_FORCE`. `NO_COLOR` turns styling off on top of
//! that. Without color, emoji markers fall back to bracketed words.

use std::env;
use std::path::Path;

use console::Style;

/// Whether report output is styled
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag (`always`, `never`, anything else is auto).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_ascii_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => env::var_os("NO_COLOR").is_none() && console::colors_enabled(),
        };
        Self { use_color }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

/// `styled` when color is on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, styled: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        styled
    } else {
        plain
    }
}

pub fn paint(config: &OutputConfig, text: &str, style: Style) -> String {
    if config.use_color {
        style.apply_to(text).to_string()
    } else {
        text.to_string()
    }
}

/// Report paths are absolute; show them relative to the project when possible.
pub fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
