//! Rootstage - stage bootable filesystem image manifests
//!
//! This library builds the in-memory manifest of a disk image: a root
//! filesystem tree and a boot filesystem tree whose leaves point at host
//! files or hold symlink targets, plus the program, arguments, environment
//! and other runtime settings. Serializing the manifest to disk bytes is
//! left to a downstream image writer.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Manifest, tree, directory walking, build plans and image layout
//! - [`infra`] - Host filesystem inspection and path resolution
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and the fatal error policy

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
