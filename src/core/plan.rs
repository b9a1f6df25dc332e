//! Build plan (stage.toml) loading
//!
//! A build plan lists everything to stage into a manifest plus the image
//! settings. String values may reference environment variables using
//! `${VAR}` syntax, and a plan may inherit from another with
//! `extends = "base.toml"`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::image::ImageCommand;
use crate::core::manifest::{Manifest, NetworkConfig};
use crate::error::{PlanError, StageError};
use crate::infra::filesystem;

/// Everything needed to build one image
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildPlan {
    /// Staged root consulted before the host filesystem
    #[serde(default)]
    pub target_root: String,

    /// Program image to run
    #[serde(default)]
    pub program: Option<String>,

    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Virtual path to host file
    #[serde(default)]
    pub files: BTreeMap<String, String>,

    /// Virtual path to host symlink
    #[serde(default)]
    pub links: BTreeMap<String, String>,

    /// Host directories mirrored at their own path
    #[serde(default)]
    pub dirs: Vec<String>,

    /// Host directories whose contents land at `/`
    #[serde(default)]
    pub relative_dirs: Vec<String>,

    /// Shared libraries staged at their host path
    #[serde(default)]
    pub libs: Vec<String>,

    /// Kernel image
    #[serde(default)]
    pub kernel: Option<String>,

    /// Kernel-loadable libraries
    #[serde(default)]
    pub klibs: Option<KlibsConfig>,

    /// Volume label to mount point
    #[serde(default)]
    pub mounts: BTreeMap<String, String>,

    /// Static network configuration
    #[serde(default)]
    pub network: Option<NetworkConfig>,

    /// Names excluded from tracing
    #[serde(default)]
    pub notrace: Vec<String>,

    /// Debug flags, each a single character
    #[serde(default)]
    pub debug: BTreeMap<String, String>,

    /// Output image settings
    #[serde(default)]
    pub image: ImageConfig,
}

/// Klibs to stage and where to find them
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KlibsConfig {
    /// Klib file names
    #[serde(default)]
    pub names: Vec<String>,

    /// Host directory holding them
    pub dir: String,
}

/// Output image settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    /// Boot image written ahead of the filesystem
    #[serde(default)]
    pub boot: Option<String>,

    /// Filesystem size, e.g. `64M`
    #[serde(default)]
    pub size: Option<String>,

    /// Filesystem label
    #[serde(default)]
    pub label: Option<String>,

    /// Output image path
    #[serde(default)]
    pub output: Option<String>,
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid env var pattern")
    })
}

/// Substitute environment variables in a string using ${VAR} syntax.
///
/// Unset variables are replaced with an empty string.
///
/// # Examples
/// ```
/// use rootstage::core::plan::substitute_env_vars;
///
/// std::env::set_var("STAGE_DOC_VAR", "hello");
/// let result = substitute_env_vars("prefix_${STAGE_DOC_VAR}_suffix");
/// assert_eq!(result, "prefix_hello_suffix");
/// std::env::remove_var("STAGE_DOC_VAR");
/// ```
pub fn substitute_env_vars(input: &str) -> String {
    env_var_pattern()
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// Recursively substitute environment variables in a TOML value
fn substitute_in_value(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => *s = substitute_env_vars(s),
        toml::Value::Array(arr) => arr.iter_mut().for_each(substitute_in_value),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| substitute_in_value(v)),
        _ => {}
    }
}

/// Merge two TOML tables, with `override_table` values taking precedence.
/// This performs a deep merge for nested tables.
fn merge_toml_tables(base: &mut toml::value::Table, override_table: &toml::value::Table) {
    for (key, override_value) in override_table {
        match (base.get_mut(key), override_value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(override_table)) => {
                merge_toml_tables(base_table, override_table);
            }
            _ => {
                base.insert(key.clone(), override_value.clone());
            }
        }
    }
}

/// Load a TOML file and resolve its `extends` directive recursively
fn load_toml_with_inheritance(
    path: &Path,
    seen: &mut HashSet<PathBuf>,
) -> Result<toml::Value, PlanError> {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !seen.insert(key) {
        return Err(PlanError::CircularExtends {
            path: path.to_path_buf(),
        });
    }

    let content = filesystem::read_file(path).map_err(|e| PlanError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let mut value: toml::Value = toml::from_str(&content).map_err(|e| PlanError::Parse {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let extends = value
        .get("extends")
        .and_then(toml::Value::as_str)
        .map(str::to_string);

    if let toml::Value::Table(table) = &mut value {
        table.remove("extends");
    }

    if let Some(extends) = extends {
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let base_path = base_dir.join(substitute_env_vars(&extends));
        tracing::debug!("{} extends {}", path.display(), base_path.display());

        if let toml::Value::Table(mut merged) = load_toml_with_inheritance(&base_path, seen)? {
            if let toml::Value::Table(current) = &value {
                merge_toml_tables(&mut merged, current);
            }
            value = toml::Value::Table(merged);
        }
    }

    Ok(value)
}

impl BuildPlan {
    /// Load a plan from `path`, resolving `extends` and `${VAR}` references
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let mut value = load_toml_with_inheritance(path, &mut HashSet::new())?;
        substitute_in_value(&mut value);
        value.try_into().map_err(|e: toml::de::Error| PlanError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load a plan from a TOML string, without substitution or inheritance
    #[cfg(test)]
    fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize the plan to a TOML string
    #[cfg(test)]
    fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Debug flags as characters
    pub fn debug_flags(&self) -> Result<Vec<(String, char)>, PlanError> {
        self.debug
            .iter()
            .map(|(name, value)| {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok((name.clone(), c)),
                    _ => Err(PlanError::InvalidDebugFlag {
                        name: name.clone(),
                        value: value.clone(),
                    }),
                }
            })
            .collect()
    }

    /// Build a fresh manifest from this plan
    pub fn build_manifest(&self) -> Result<Manifest, StageError> {
        let mut manifest = Manifest::new(&self.target_root);
        self.apply(&mut manifest)?;
        Ok(manifest)
    }

    /// Stage everything in this plan into `manifest`
    pub fn apply(&self, manifest: &mut Manifest) -> Result<(), StageError> {
        let debug_flags = self.debug_flags()?;

        if let Some(kernel) = &self.kernel {
            manifest.add_kernel(kernel)?;
        }
        if let Some(klibs) = &self.klibs {
            manifest.add_klibs(klibs.names.as_slice(), &klibs.dir)?;
        }
        if let Some(program) = &self.program {
            manifest.add_user_program(program)?;
        }
        for arg in &self.args {
            manifest.add_argument(arg);
        }
        for (name, value) in &self.env {
            manifest.add_environment_variable(name, value);
        }
        for (virtual_path, host_path) in &self.files {
            manifest.add_file(virtual_path, host_path)?;
        }
        for (virtual_path, host_path) in &self.links {
            manifest.add_link(virtual_path, host_path)?;
        }
        for lib in &self.libs {
            manifest.add_library(lib)?;
        }
        for dir in &self.dirs {
            manifest.add_directory(dir)?;
        }
        for dir in &self.relative_dirs {
            manifest.add_relative_directory(dir)?;
        }
        for (label, virtual_path) in &self.mounts {
            manifest.add_mount(label, virtual_path)?;
        }
        if let Some(network) = &self.network {
            manifest.add_network_config(network.clone());
        }
        for name in &self.notrace {
            manifest.add_no_trace(name);
        }
        for (name, value) in debug_flags {
            manifest.add_debug_flag(&name, value);
        }
        Ok(())
    }

    /// Configure an image command for `manifest` from the `[image]` table
    pub fn image_command(&self, manifest: Manifest) -> Result<ImageCommand, StageError> {
        let mut cmd = ImageCommand::new(manifest);
        if let Some(boot) = &self.image.boot {
            cmd.set_boot(boot);
        }
        if let Some(size) = &self.image.size {
            cmd.set_filesystem_size(size)?;
        }
        if let Some(label) = &self.image.label {
            cmd.set_label(label);
        }
        if let Some(output) = &self.image.output {
            cmd.set_output_path(output);
        }
        Ok(cmd)
    }
}
