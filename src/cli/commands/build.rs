//! Build command implementation
//!
//! Implements `rootstage build` to stage a manifest and lay out the image.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::output::{create_spinner, status, OutputConfig};
use crate::core::image::ImageLayout;
use crate::core::plan::BuildPlan;
use crate::core::tree::TreeStats;
use crate::error::StageError;

/// Build options given on the command line
#[derive(Debug, Default)]
pub struct BuildOptions {
    /// Output image path
    pub output: Option<PathBuf>,
    /// Boot image path
    pub boot: Option<PathBuf>,
    /// Filesystem size
    pub size: Option<String>,
    /// Filesystem label
    pub label: Option<String>,
    /// Ignore staged files
    pub empty: bool,
}

/// What a build produced
#[derive(Debug, Serialize)]
struct BuildSummary<'a> {
    layout: &'a ImageLayout,
    program: Option<&'a str>,
    root: TreeStats,
    boot: TreeStats,
}

/// Execute the build command
pub fn execute(plan_path: &Path, options: BuildOptions, output: OutputConfig) -> Result<()> {
    if !plan_path.exists() {
        bail!("No build plan found at {}", plan_path.display());
    }

    let plan = BuildPlan::load(plan_path)
        .map_err(StageError::from)
        .with_context(|| format!("Failed to load {}", plan_path.display()))?;

    tracing::info!("Staging manifest from {}", plan_path.display());
    let manifest = plan.build_manifest()?;
    let root = manifest.root().stats();
    let boot = manifest.boot().stats();

    let mut cmd = plan.image_command(manifest)?;
    if let Some(out) = options.output {
        cmd.set_output_path(out);
    }
    if let Some(boot) = options.boot {
        cmd.set_boot(boot);
    }
    if let Some(size) = options.size.as_deref() {
        cmd.set_filesystem_size(size).map_err(StageError::from)?;
    }
    if let Some(label) = options.label.as_deref() {
        cmd.set_label(label);
    }
    if options.empty {
        tracing::info!("Building an empty filesystem");
        cmd.set_empty_filesystem();
    }

    let spinner = output
        .show_progress()
        .then(|| create_spinner("Writing image..."));
    let result = cmd.execute().map_err(StageError::from);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let layout = result?;

    let summary = BuildSummary {
        layout: &layout,
        program: cmd.manifest().and_then(|m| m.program()),
        root,
        boot,
    };

    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else if !output.quiet {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &BuildSummary<'_>) {
    println!(
        "{} Wrote {}",
        status::SUCCESS,
        summary.layout.output.display()
    );
    if let Some(program) = summary.program {
        println!("  Program:        {program}");
    }
    println!(
        "  Root fs:        {} directories, {} files, {} links",
        summary.root.directories, summary.root.files, summary.root.links
    );
    println!(
        "  Boot fs:        {} files",
        summary.boot.files
    );
    println!("  Boot image:     {} bytes", summary.layout.boot_image_size);
    println!("  Root fs offset: {}", summary.layout.root_fs_offset);
    if summary.layout.size > 0 {
        println!("  Size:           {} bytes", summary.layout.size);
    }
    if !summary.layout.label.is_empty() {
        println!("  Label:          {}", summary.layout.label);
    }
}
