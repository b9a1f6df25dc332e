//! CLI command for displaying a staged manifest
//!
//! Implements the `rootstage show` command.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::cli::output::{status, OutputConfig};
use crate::core::manifest::Manifest;
use crate::core::plan::BuildPlan;
use crate::error::StageError;

/// Execute the show command
pub fn execute(plan_path: &Path, output: OutputConfig) -> Result<()> {
    if !plan_path.exists() {
        bail!("No build plan found at {}", plan_path.display());
    }

    let plan = BuildPlan::load(plan_path)
        .map_err(StageError::from)
        .with_context(|| format!("Failed to load {}", plan_path.display()))?;
    let manifest = plan.build_manifest()?;

    if output.json {
        println!(
            "{}",
            manifest.to_json().context("Failed to serialize manifest")?
        );
    } else {
        print!("{}", format_manifest(&manifest));
    }
    Ok(())
}

/// Format a manifest for humans
pub fn format_manifest(manifest: &Manifest) -> String {
    let mut output = manifest.root().render_tree("/");

    if manifest.has_boot() {
        output.push('\n');
        output.push_str(&manifest.boot().render_tree("boot:"));
    }

    output.push('\n');
    if let Some(program) = manifest.program() {
        output.push_str(&format!("program: {program}\n"));
    } else {
        output.push_str(&format!("{} no program set\n", status::WARNING));
    }
    if !manifest.arguments().is_empty() {
        output.push_str(&format!("arguments: {}\n", manifest.arguments().join(" ")));
    }
    for (name, value) in manifest.environment() {
        output.push_str(&format!("env: {name}={value}\n"));
    }
    for (label, path) in manifest.mounts() {
        output.push_str(&format!("mount: {label} -> {path}\n"));
    }
    if let Some(network) = manifest.network() {
        output.push_str(&format!(
            "network: ip={} gateway={} netmask={}\n",
            network.ip, network.gateway, network.netmask
        ));
    }
    if !manifest.notrace().is_empty() {
        output.push_str(&format!("notrace: {}\n", manifest.notrace().join(", ")));
    }
    for (name, value) in manifest.debug_flags() {
        output.push_str(&format!("debug: {name}={value}\n"));
    }
    if let Some(klibs) = manifest.klibs() {
        output.push_str(&format!("klibs: {klibs}\n"));
    }
    output
}
