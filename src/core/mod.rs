//! Core staging logic module
//!
//! Host access goes through [`crate::infra`].
//!
//! # Submodules
//!
//! - [`tree`] - Virtual filesystem tree nodes and insertion rules
//! - [`manifest`] - The image manifest and its builder operations
//! - [`walker`] - Mirroring host directories into a manifest
//! - [`image`] - Output image layout and size parsing
//! - [`plan`] - Build plan (stage.toml) loading

pub mod image;
pub mod manifest;
pub mod plan;
pub mod tree;
pub mod walker;
