//! Virtual filesystem tree
//!
//! A [`Node`] is a directory, a file backed by a host path, or a symlink
//! holding its literal target. A path addresses exactly one node, and a
//! node never silently changes between directory and leaf.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::{ConflictKind, ManifestError};

/// A named entry in the virtual filesystem namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Directory with its children keyed by name
    Directory(BTreeMap<String, Node>),
    /// Regular file sourced from a host path
    File(String),
    /// Symbolic link with an unresolved target
    Link(String),
}

/// What an insertion did to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Nothing existed at the path
    Inserted,
    /// An identical leaf was already there
    Unchanged,
    /// A different leaf was replaced
    Replaced {
        /// The leaf that was overwritten
        previous: Node,
    },
}

/// Node counts for a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// Directories, not counting the root itself
    pub directories: usize,
    /// Regular files
    pub files: usize,
    /// Symbolic links
    pub links: usize,
}

impl Default for Node {
    fn default() -> Self {
        Self::directory()
    }
}

impl Node {
    /// Create an empty directory
    pub fn directory() -> Self {
        Self::Directory(BTreeMap::new())
    }

    /// Check if this node is a directory
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Check if this node is a regular file
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Check if this node is a symbolic link
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link(_))
    }

    /// Children of a directory, `None` for leaves
    pub fn children(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Self::Directory(children) => Some(children),
            Self::File(_) | Self::Link(_) => None,
        }
    }

    /// Mutable children of a directory, `None` for leaves
    pub fn children_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match self {
            Self::Directory(children) => Some(children),
            Self::File(_) | Self::Link(_) => None,
        }
    }

    /// Child `name` of this node, if this is a directory holding one
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children().and_then(|children| children.get(name))
    }

    /// Check if a directory has no children (leaves are never empty)
    pub fn is_empty(&self) -> bool {
        self.children().is_some_and(BTreeMap::is_empty)
    }

    /// Get or create the directory `name` under this directory.
    ///
    /// Fails if this node, or the existing entry called `name`, is a leaf.
    pub fn mk_dir(&mut self, name: &str) -> Result<&mut Node, ConflictKind> {
        let children = self
            .children_mut()
            .ok_or(ConflictKind::DirectoryOverFile)?;
        let child = children.entry(name.to_string()).or_insert_with(Node::directory);
        if child.is_directory() {
            Ok(child)
        } else {
            Err(ConflictKind::DirectoryOverFile)
        }
    }

    /// Apply [`Node::mk_dir`] for every segment of `path`
    pub fn mk_dir_path(&mut self, path: &str) -> Result<&mut Node, ManifestError> {
        let segments = segments(path);
        self.mk_dir_segments(&segments)
    }

    fn mk_dir_segments(&mut self, segments: &[&str]) -> Result<&mut Node, ManifestError> {
        let mut node = self;
        for (i, segment) in segments.iter().enumerate() {
            node = node
                .mk_dir(segment)
                .map_err(|kind| ManifestError::Conflict {
                    kind,
                    path: join_segments(&segments[..=i]),
                })?;
        }
        Ok(node)
    }

    /// Insert a file or link leaf at `path`, creating parent directories.
    ///
    /// An existing directory at `path` is a conflict and leaves it untouched.
    /// A different leaf is replaced, last write wins.
    pub fn insert_leaf(&mut self, path: &str, leaf: Node) -> Result<InsertOutcome, ManifestError> {
        debug_assert!(!leaf.is_directory(), "insert_leaf takes files and links");

        let segments = segments(path);
        let Some((name, parents)) = segments.split_last() else {
            return Err(ManifestError::EmptyPath {
                path: path.to_string(),
            });
        };

        let parent = self.mk_dir_segments(parents)?;
        let children = parent
            .children_mut()
            .ok_or_else(|| ManifestError::Conflict {
                kind: ConflictKind::DirectoryOverFile,
                path: join_segments(parents),
            })?;

        match children.get_mut(*name) {
            Some(existing) if existing.is_directory() => Err(ManifestError::Conflict {
                kind: ConflictKind::FileOverDirectory,
                path: join_segments(&segments),
            }),
            Some(existing) if *existing == leaf => Ok(InsertOutcome::Unchanged),
            Some(existing) => Ok(InsertOutcome::Replaced {
                previous: std::mem::replace(existing, leaf),
            }),
            None => {
                children.insert((*name).to_string(), leaf);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    /// Look up `path` without creating anything
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        segments(path)
            .into_iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Count the nodes below this one
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.accumulate(&mut stats);
        stats
    }

    fn accumulate(&self, stats: &mut TreeStats) {
        if let Some(children) = self.children() {
            for child in children.values() {
                match child {
                    Self::Directory(_) => {
                        stats.directories += 1;
                        child.accumulate(stats);
                    }
                    Self::File(_) => stats.files += 1,
                    Self::Link(_) => stats.links += 1,
                }
            }
        }
    }

    /// Format the tree below this node for display
    pub fn render_tree(&self, root_label: &str) -> String {
        let mut output = String::new();
        output.push_str(root_label);
        output.push('\n');
        if let Some(children) = self.children() {
            Self::render_children(&mut output, children, "");
        }
        output
    }

    fn render_children(output: &mut String, children: &BTreeMap<String, Node>, prefix: &str) {
        for (i, (name, node)) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            let connector = if is_last { "└── " } else { "├── " };
            let _ = match node {
                Self::Directory(_) => writeln!(output, "{prefix}{connector}{name}/"),
                Self::File(host) => writeln!(output, "{prefix}{connector}{name} <- {host}"),
                Self::Link(target) => writeln!(output, "{prefix}{connector}{name} -> {target}"),
            };

            if let Self::Directory(grandchildren) = node {
                let child_prefix = if is_last {
                    format!("{prefix}    ")
                } else {
                    format!("{prefix}│   ")
                };
                Self::render_children(output, grandchildren, &child_prefix);
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Directory(children) => {
                let mut map = serializer.serialize_map(Some(children.len()))?;
                for (name, child) in children {
                    map.serialize_entry(name, child)?;
                }
                map.end()
            }
            Self::File(host) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("file", host)?;
                map.end()
            }
            Self::Link(target) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("link", target)?;
                map.end()
            }
        }
    }
}

/// Split a virtual path into cleaned segments.
///
/// Empty and `.` segments are dropped and `..` removes the previous
/// segment, stopping at the root.
pub fn segments(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            _ => out.push(part),
        }
    }
    out
}

/// Join segments back into an absolute virtual path
pub fn join_segments(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

/// Normalize any virtual path to its absolute, cleaned form
pub fn clean_path(path: &str) -> String {
    join_segments(&segments(path))
}
