//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress,
//! status lines and errors to the user.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::Level;

use crate::error::StageError;

/// Output preferences from the global flags
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress everything but errors
    pub quiet: bool,
    /// Machine-readable output
    pub json: bool,
    /// Verbosity level (-v, -vv)
    pub verbose: u8,
}

impl OutputConfig {
    /// Create a new output configuration
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Most verbose tracing level to show
    pub fn level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    /// Whether progress spinners should be drawn
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Print an error and its causes to stderr
pub fn display_error(err: &anyhow::Error) {
    eprintln!("{} {err}", status::ERROR);
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }

    let fatal = err
        .chain()
        .any(|cause| cause.downcast_ref::<StageError>().is_some_and(StageError::is_fatal));
    if fatal {
        eprintln!(
            "{} please check your manifest for the missing or conflicting file",
            status::INFO
        );
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(OutputConfig::new(false, false, 0).level(), Level::WARN);
        assert_eq!(OutputConfig::new(false, false, 1).level(), Level::INFO);
        assert_eq!(OutputConfig::new(false, false, 3).level(), Level::DEBUG);
        assert_eq!(OutputConfig::new(true, false, 2).level(), Level::ERROR);
    }

    #[test]
    fn test_progress_hidden_for_scripts() {
        assert!(OutputConfig::new(false, false, 0).show_progress());
        assert!(!OutputConfig::new(false, true, 0).show_progress());
        assert!(!OutputConfig::new(true, false, 0).show_progress());
    }
}
