//! Image manifest and its builder operations
//!
//! A [`Manifest`] owns two independent trees: the root filesystem and the
//! boot filesystem (kernel and klibs). The two namespaces never overlap and
//! are serialized separately downstream. Every mutation goes through the
//! `add_*` operations below; host sources are resolved before the tree is
//! touched, so a failed resolution leaves the manifest as it was.
//! File leaves keep the host path as given; the image writer resolves it
//! again against [`Manifest::target_root`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defaults::{KERNEL_NAME, KLIBS_MARKER, KLIB_DIR};
use crate::core::tree::{self, InsertOutcome, Node};
use crate::core::walker::{self, PathMapping};
use crate::error::ManifestError;
use crate::infra::{filesystem, resolve};

/// Static network configuration handed to the guest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Static IP address
    #[serde(default)]
    pub ip: String,

    /// Default gateway
    #[serde(default)]
    pub gateway: String,

    /// Network mask
    #[serde(default)]
    pub netmask: String,
}

/// In-memory description of a filesystem image
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    /// Root filesystem tree
    root: Node,

    /// Boot filesystem tree
    boot: Node,

    /// Staged root consulted before the host filesystem
    #[serde(skip)]
    target_root: Option<PathBuf>,

    /// Virtual path of the program to run
    #[serde(skip_serializing_if = "Option::is_none")]
    program: Option<String>,

    /// Program arguments, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    arguments: Vec<String>,

    /// Environment variables
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, String>,

    /// Static network settings
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<NetworkConfig>,

    /// Volume label to mount point
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    mounts: BTreeMap<String, String>,

    /// Names excluded from tracing
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notrace: Vec<String>,

    /// Single-character debug flags
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    debug_flags: BTreeMap<String, char>,

    /// Where klibs live once staged
    #[serde(skip_serializing_if = "Option::is_none")]
    klibs: Option<String>,
}

impl Manifest {
    /// Create an empty manifest.
    ///
    /// An empty `target_root` resolves every host path directly.
    pub fn new(target_root: impl AsRef<Path>) -> Self {
        let target_root = target_root.as_ref();
        Self {
            target_root: (!target_root.as_os_str().is_empty()).then(|| target_root.to_path_buf()),
            ..Self::default()
        }
    }

    /// Add a file to the root filesystem
    pub fn add_file(&mut self, virtual_path: &str, host_path: &str) -> Result<(), ManifestError> {
        stage_file(
            self.target_root.as_deref(),
            &mut self.root,
            virtual_path,
            host_path,
        )
    }

    /// Add a host symlink to the root filesystem, keeping its literal target
    pub fn add_link(&mut self, virtual_path: &str, host_path: &str) -> Result<(), ManifestError> {
        let host = Path::new(host_path);
        resolve::resolve(self.target_root.as_deref(), host)?;
        let target = filesystem::read_link(host).map_err(|e| ManifestError::BadLink {
            path: host.to_path_buf(),
            error: e.to_string(),
        })?;
        let target = target.to_string_lossy().into_owned();

        let outcome = self
            .root
            .insert_leaf(virtual_path, Node::Link(target.clone()))?;
        report(virtual_path, &target, &outcome);
        Ok(())
    }

    /// Add the program to run and record it.
    ///
    /// A relative image path is rooted at `/` in the image.
    pub fn add_user_program(&mut self, image_path: &str) -> Result<(), ManifestError> {
        let program = tree::clean_path(image_path);
        self.add_file(&program, image_path)?;
        tracing::debug!("program set to {program}");
        self.program = Some(program);
        Ok(())
    }

    /// Mirror a host directory; relative host paths are rooted at `/`
    pub fn add_directory(&mut self, host_dir: impl AsRef<Path>) -> Result<(), ManifestError> {
        walker::walk(self, host_dir.as_ref(), PathMapping::Absolute)
    }

    /// Mirror the contents of a host directory at the image root
    pub fn add_relative_directory(
        &mut self,
        host_dir: impl AsRef<Path>,
    ) -> Result<(), ManifestError> {
        walker::walk(self, host_dir.as_ref(), PathMapping::Relative)
    }

    /// Add a shared library at the same path it has on the host
    pub fn add_library(&mut self, host_path: &str) -> Result<(), ManifestError> {
        stage_file(
            self.target_root.as_deref(),
            &mut self.root,
            host_path,
            host_path,
        )
    }

    /// Add kernel-loadable libraries from `host_dir` to the boot filesystem
    pub fn add_klibs<S: AsRef<str>>(
        &mut self,
        names: &[S],
        host_dir: impl AsRef<Path>,
    ) -> Result<(), ManifestError> {
        let sources = names
            .iter()
            .map(|name| -> Result<(String, String), ManifestError> {
                let host = host_dir.as_ref().join(name.as_ref());
                resolve::resolve(self.target_root.as_deref(), &host)?;
                Ok((name.as_ref().to_string(), host.to_string_lossy().into_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let klib_dir = self
            .boot
            .mk_dir(KLIB_DIR)
            .map_err(|kind| ManifestError::Conflict {
                kind,
                path: format!("/{KLIB_DIR}"),
            })?;
        for (name, source) in sources {
            insert_file(klib_dir, &name, source)?;
        }

        self.klibs = Some(KLIBS_MARKER.to_string());
        Ok(())
    }

    /// Set the kernel in the boot filesystem
    pub fn add_kernel(&mut self, host_path: &str) -> Result<(), ManifestError> {
        stage_file(
            self.target_root.as_deref(),
            &mut self.boot,
            KERNEL_NAME,
            host_path,
        )
    }

    /// Create the mount point directory and record the volume label for it
    pub fn add_mount(&mut self, label: &str, virtual_path: &str) -> Result<(), ManifestError> {
        self.root.mk_dir_path(virtual_path)?;
        self.mounts
            .insert(label.to_string(), virtual_path.to_string());
        Ok(())
    }

    /// Set an environment variable, replacing any previous value
    pub fn add_environment_variable(&mut self, name: &str, value: &str) {
        self.environment.insert(name.to_string(), value.to_string());
    }

    /// Append a program argument
    pub fn add_argument(&mut self, arg: &str) {
        self.arguments.push(arg.to_string());
    }

    /// Append a name to exclude from tracing
    pub fn add_no_trace(&mut self, name: &str) {
        self.notrace.push(name.to_string());
    }

    /// Set a debug flag
    pub fn add_debug_flag(&mut self, name: &str, value: char) {
        self.debug_flags.insert(name.to_string(), value);
    }

    /// Set static network configuration
    pub fn add_network_config(&mut self, config: NetworkConfig) {
        self.network = Some(config);
    }

    /// Check whether a regular file is staged at `virtual_path`
    pub fn file_exists(&self, virtual_path: &str) -> bool {
        self.root.lookup(virtual_path).is_some_and(Node::is_file)
    }

    /// Root filesystem tree
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Boot filesystem tree
    pub fn boot(&self) -> &Node {
        &self.boot
    }

    /// Check if anything was staged for the boot filesystem
    pub fn has_boot(&self) -> bool {
        !self.boot.is_empty()
    }

    /// Staged root used for resolution, if any
    pub fn target_root(&self) -> Option<&Path> {
        self.target_root.as_deref()
    }

    /// Virtual path of the program
    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    /// Program arguments
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Environment variables
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Network configuration
    pub fn network(&self) -> Option<&NetworkConfig> {
        self.network.as_ref()
    }

    /// Mount points by volume label
    pub fn mounts(&self) -> &BTreeMap<String, String> {
        &self.mounts
    }

    /// Names excluded from tracing
    pub fn notrace(&self) -> &[String] {
        &self.notrace
    }

    /// Debug flags
    pub fn debug_flags(&self) -> &BTreeMap<String, char> {
        &self.debug_flags
    }

    /// Klibs marker
    pub fn klibs(&self) -> Option<&str> {
        self.klibs.as_deref()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Check that `host_path` resolves, then insert it unchanged at `virtual_path` under `dir`
fn stage_file(
    target_root: Option<&Path>,
    dir: &mut Node,
    virtual_path: &str,
    host_path: &str,
) -> Result<(), ManifestError> {
    resolve::resolve(target_root, Path::new(host_path))?;
    insert_file(dir, virtual_path, host_path.to_string())
}

fn insert_file(dir: &mut Node, virtual_path: &str, source: String) -> Result<(), ManifestError> {
    let outcome = dir.insert_leaf(virtual_path, Node::File(source.clone()))?;
    report(virtual_path, &source, &outcome);
    Ok(())
}

fn report(virtual_path: &str, source: &str, outcome: &InsertOutcome) {
    match outcome {
        InsertOutcome::Inserted => tracing::debug!("added {virtual_path} <- {source}"),
        InsertOutcome::Unchanged => {}
        InsertOutcome::Replaced { previous } => {
            let old = match previous {
                Node::File(s) | Node::Link(s) => s.as_str(),
                Node::Directory(_) => "",
            };
            tracing::warn!(
                "overwriting existing file {virtual_path} hostpath old: {old} new: {source}"
            );
        }
    }
}
