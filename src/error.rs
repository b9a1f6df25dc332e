//! Error types for rootstage
//!
//! Domain-specific error types using thiserror.
//!
//! Whether a failure should end the process is decided in one place,
//! [`ManifestError::is_fatal`], and acted on only by the binary.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Host path resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Neither the overlay root nor the host has the path
    #[error("No such file or directory: {path}")]
    NotFound { path: PathBuf },

    /// Absolute symlinks inside the overlay root kept pointing at each other
    #[error("Too many levels of symbolic links resolving '{path}' ({hops} hops)")]
    TooManyLinks { path: PathBuf, hops: usize },

    /// Any other stat/readlink failure
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// Structural conflict between an existing node and a new insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A file or link would replace a directory
    FileOverDirectory,
    /// A directory would replace a file or link
    DirectoryOverFile,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileOverDirectory => write!(f, "file overriding an existing directory"),
            Self::DirectoryOverFile => write!(f, "directory conflicting with an existing file"),
        }
    }
}

/// Manifest construction errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Host source could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Variant conflict at a virtual path
    #[error("{kind}: '{path}'")]
    Conflict { kind: ConflictKind, path: String },

    /// Host symlink target could not be read
    #[error("Bad link '{path}': {error}")]
    BadLink { path: PathBuf, error: String },

    /// Virtual path has no segments left after cleaning
    #[error("Virtual path '{path}' does not name an entry")]
    EmptyPath { path: String },

    /// A directory walk was aborted
    #[error("Failed to add directory '{root}': {source}")]
    Walk {
        root: PathBuf,
        source: Box<ManifestError>,
    },

    /// The walker could not read an entry of the host tree
    #[error("Failed to walk '{path}': {error}")]
    WalkIo { path: PathBuf, error: String },
}

impl ManifestError {
    /// Whether the manifest is left unusable by this error.
    ///
    /// | error                                | fatal |
    /// |--------------------------------------|-------|
    /// | missing host source                  | yes   |
    /// | unreadable host symlink              | yes   |
    /// | file over directory (direct insert)  | yes   |
    /// | anything raised inside a walk        | no    |
    /// | directory over file, other I/O       | no    |
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Resolve(ResolveError::NotFound { .. }) | Self::BadLink { .. } => true,
            Self::Conflict { kind, .. } => *kind == ConflictKind::FileOverDirectory,
            Self::Resolve(_) | Self::EmptyPath { .. } | Self::Walk { .. } | Self::WalkIo { .. } => {
                false
            }
        }
    }

    /// Conflict kind, looking through walk wrappers
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            Self::Conflict { kind, .. } => Some(*kind),
            Self::Walk { source, .. } => source.conflict_kind(),
            _ => None,
        }
    }
}

/// Image assembly errors
#[derive(Error, Debug)]
pub enum ImageError {
    /// Size string is not `<digits>[k|m|g]`
    #[error("Invalid size '{size}': expected digits with an optional k, m or g suffix")]
    InvalidSize { size: String },

    /// No output path configured
    #[error("Output image file path not set")]
    OutputNotSet,

    /// Output file could not be created
    #[error("Cannot create output file '{path}': {error}")]
    CreateOutput { path: PathBuf, error: String },

    /// Boot image could not be opened
    #[error("Cannot open boot image '{path}': {error}")]
    OpenBoot { path: PathBuf, error: String },

    /// Boot image read failed midway
    #[error("Cannot read boot image '{path}': {error}")]
    ReadBoot { path: PathBuf, error: String },

    /// Output write failed
    #[error("Cannot write output file '{path}': {error}")]
    WriteOutput { path: PathBuf, error: String },
}

/// Build plan loading errors
#[derive(Error, Debug)]
pub enum PlanError {
    /// Failed to read a plan file
    #[error("Failed to read build plan '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse a plan file
    #[error("Failed to parse build plan '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// `extends` chain loops back on itself
    #[error("Build plan '{path}' extends itself")]
    CircularExtends { path: PathBuf },

    /// Debug flag value is not a single character
    #[error("Debug flag '{name}' must be a single character, got '{value}'")]
    InvalidDebugFlag { name: String, value: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to inspect a path
    #[error("Failed to stat '{path}': {error}")]
    Stat { path: PathBuf, error: String },

    /// Failed to read a symlink
    #[error("Failed to read link '{path}': {error}")]
    ReadLink { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Top-level rootstage error type
#[derive(Error, Debug)]
pub enum StageError {
    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Image error
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Plan error
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}

impl StageError {
    /// Whether the process should stop immediately
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Manifest(e) if e.is_fatal())
    }
}
