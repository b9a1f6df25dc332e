//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod show;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::cli::output::OutputConfig;
use crate::config::defaults::DEFAULT_PLAN_FILE;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the manifest and lay out the output image
    Build {
        /// Build plan (defaults to ./stage.toml)
        plan: Option<PathBuf>,

        /// Output image path, overriding the plan
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Boot image written ahead of the filesystem
        #[arg(long)]
        boot: Option<PathBuf>,

        /// Filesystem size, e.g. 64M
        #[arg(long)]
        size: Option<String>,

        /// Filesystem label
        #[arg(long)]
        label: Option<String>,

        /// Build an empty filesystem, ignoring staged files
        #[arg(long)]
        empty: bool,
    },

    /// Build the manifest and print it
    Show {
        /// Build plan (defaults to ./stage.toml)
        plan: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the command
    pub fn run(self, output: OutputConfig) -> Result<()> {
        match self {
            Self::Build {
                plan,
                output: out_path,
                boot,
                size,
                label,
                empty,
            } => {
                let options = build::BuildOptions {
                    output: out_path,
                    boot,
                    size,
                    label,
                    empty,
                };
                build::execute(&plan_path(plan), options, output)
            }
            Self::Show { plan } => show::execute(&plan_path(plan), output),
        }
    }
}

fn plan_path(plan: Option<PathBuf>) -> PathBuf {
    plan.unwrap_or_else(|| PathBuf::from(DEFAULT_PLAN_FILE))
}
