//! Image command assembly
//!
//! Lays out the output image: the boot image bytes first, then room for
//! the kernel log dump when a boot filesystem is staged, then the root
//! filesystem region. Writing the root filesystem itself from the
//! manifest is left to the serializer that consumes [`ImageLayout`].

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::defaults::{BOOT_COPY_BUFFER_SIZE, KLOG_DUMP_SIZE};
use crate::core::manifest::Manifest;
use crate::error::ImageError;

/// Parse a size like `512`, `64k`, `10M` or `2g` into bytes
pub fn parse_size(size: &str) -> Result<u64, ImageError> {
    let invalid = || ImageError::InvalidSize {
        size: size.to_string(),
    };

    let units_index = size
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(size.len());
    if units_index == 0 {
        return Err(invalid());
    }

    let multiplier: u64 = match size[units_index..].to_ascii_lowercase().as_str() {
        "" => 1,
        "k" => 1024,
        "m" => 1024 * 1024,
        "g" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };

    size[..units_index]
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

/// Where everything lands in the output image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageLayout {
    /// Output image file
    pub output: PathBuf,
    /// Bytes copied from the boot image
    pub boot_image_size: u64,
    /// Offset at which the root filesystem starts
    pub root_fs_offset: u64,
    /// Requested filesystem size in bytes, 0 if unset
    pub size: u64,
    /// Filesystem label
    pub label: String,
}

/// Builds the output image around a finished manifest
#[derive(Debug)]
pub struct ImageCommand {
    boot_path: Option<PathBuf>,
    label: String,
    manifest: Option<Manifest>,
    size: u64,
    out_path: Option<PathBuf>,
}

impl ImageCommand {
    /// Create a command for `manifest`
    pub fn new(manifest: Manifest) -> Self {
        Self {
            boot_path: None,
            label: String::new(),
            manifest: Some(manifest),
            size: 0,
            out_path: None,
        }
    }

    /// Build an empty filesystem, dropping the manifest
    pub fn set_empty_filesystem(&mut self) {
        self.manifest = None;
    }

    /// Set the filesystem size from a string such as `64M`
    pub fn set_filesystem_size(&mut self, size: &str) -> Result<(), ImageError> {
        self.size = parse_size(size)?;
        Ok(())
    }

    /// Set the boot image written ahead of the filesystem
    pub fn set_boot(&mut self, boot: impl Into<PathBuf>) {
        self.boot_path = Some(boot.into());
    }

    /// Set the output image path
    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) {
        self.out_path = Some(path.into());
    }

    /// Set the filesystem label
    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    /// Requested filesystem size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Filesystem label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Manifest to be serialized, `None` for an empty filesystem
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Create the output image and lay out its regions
    pub fn execute(&self) -> Result<ImageLayout, ImageError> {
        let out_path = self.out_path.as_deref().ok_or(ImageError::OutputNotSet)?;
        let mut out_file = File::create(out_path).map_err(|e| ImageError::CreateOutput {
            path: out_path.to_path_buf(),
            error: e.to_string(),
        })?;

        let boot_image_size = match &self.boot_path {
            Some(boot_path) => copy_boot_image(boot_path, &mut out_file, out_path)?,
            None => 0,
        };
        let mut root_fs_offset = boot_image_size;

        if self.manifest.as_ref().is_some_and(Manifest::has_boot) {
            root_fs_offset += KLOG_DUMP_SIZE;
        }

        tracing::info!(
            "{}: boot image {boot_image_size} bytes, root filesystem at offset {root_fs_offset}",
            out_path.display()
        );

        Ok(ImageLayout {
            output: out_path.to_path_buf(),
            boot_image_size,
            root_fs_offset,
            size: self.size,
            label: self.label.clone(),
        })
    }
}

fn copy_boot_image(boot_path: &Path, out: &mut File, out_path: &Path) -> Result<u64, ImageError> {
    let mut boot_file = File::open(boot_path).map_err(|e| ImageError::OpenBoot {
        path: boot_path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut buf = vec![0u8; BOOT_COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match boot_file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ImageError::ReadBoot {
                    path: boot_path.to_path_buf(),
                    error: e.to_string(),
                })
            }
        };
        out.write_all(&buf[..n])
            .map_err(|e| ImageError::WriteOutput {
                path: out_path.to_path_buf(),
                error: e.to_string(),
            })?;
        copied += n as u64;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::MIN_PROPTEST_ITERATIONS;
    use crate::test_utils::generators::size_unit;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("10M").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        for bad in ["abc", "", "M", "10MB", "10T", "-5", "1.5G", "9999999999999999999G"] {
            assert!(
                matches!(parse_size(bad), Err(ImageError::InvalidSize { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_execute_requires_output() {
        let cmd = ImageCommand::new(Manifest::new(""));
        assert!(matches!(cmd.execute(), Err(ImageError::OutputNotSet)));
    }

    #[test]
    fn test_execute_without_boot() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("disk.img");

        let mut cmd = ImageCommand::new(Manifest::new(""));
        cmd.set_output_path(&out);
        cmd.set_label("root");
        cmd.set_filesystem_size("1M").unwrap();
        let layout = cmd.execute().unwrap();

        assert!(out.exists());
        assert_eq!(layout.boot_image_size, 0);
        assert_eq!(layout.root_fs_offset, 0);
        assert_eq!(layout.size, 1024 * 1024);
        assert_eq!(layout.label, "root");
    }

    #[test]
    fn test_execute_copies_boot_image() {
        let dir = TempDir::new().unwrap();
        let boot = dir.path().join("boot.img");
        let bytes: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&boot, &bytes).unwrap();
        let out = dir.path().join("disk.img");

        let mut cmd = ImageCommand::new(Manifest::new(""));
        cmd.set_boot(&boot);
        cmd.set_output_path(&out);
        let layout = cmd.execute().unwrap();

        assert_eq!(layout.boot_image_size, bytes.len() as u64);
        assert_eq!(layout.root_fs_offset, bytes.len() as u64);
        assert_eq!(fs::read(&out).unwrap(), bytes);
    }

    #[test]
    fn test_execute_reserves_klog_space_with_boot_fs() {
        let dir = TempDir::new().unwrap();
        let kernel = dir.path().join("kernel.img");
        fs::write(&kernel, b"kernel").unwrap();
        let boot = dir.path().join("boot.img");
        fs::write(&boot, [0u8; 512]).unwrap();

        let mut manifest = Manifest::new("");
        manifest.add_kernel(&kernel.to_string_lossy()).unwrap();

        let mut cmd = ImageCommand::new(manifest);
        cmd.set_boot(&boot);
        cmd.set_output_path(dir.path().join("disk.img"));
        let layout = cmd.execute().unwrap();

        assert_eq!(layout.root_fs_offset, 512 + KLOG_DUMP_SIZE);
    }

    #[test]
    fn test_empty_filesystem_skips_klog_space() {
        let dir = TempDir::new().unwrap();
        let kernel = dir.path().join("kernel.img");
        fs::write(&kernel, b"kernel").unwrap();

        let mut manifest = Manifest::new("");
        manifest.add_kernel(&kernel.to_string_lossy()).unwrap();

        let mut cmd = ImageCommand::new(manifest);
        cmd.set_empty_filesystem();
        cmd.set_output_path(dir.path().join("disk.img"));
        let layout = cmd.execute().unwrap();

        assert!(cmd.manifest().is_none());
        assert_eq!(layout.root_fs_offset, 0);
    }

    #[test]
    fn test_missing_boot_image() {
        let dir = TempDir::new().unwrap();
        let mut cmd = ImageCommand::new(Manifest::new(""));
        cmd.set_boot(dir.path().join("missing.img"));
        cmd.set_output_path(dir.path().join("disk.img"));
        assert!(matches!(cmd.execute(), Err(ImageError::OpenBoot { .. })));
    }

    #[test]
    fn test_invalid_size_keeps_previous() {
        let mut cmd = ImageCommand::new(Manifest::new(""));
        cmd.set_filesystem_size("8k").unwrap();
        assert!(cmd.set_filesystem_size("abc").is_err());
        assert_eq!(cmd.size(), 8192);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn prop_parse_size_multiplies(n in 0u64..1_000_000, (suffix, mul) in size_unit()) {
            prop_assert_eq!(parse_size(&format!("{n}{suffix}")).unwrap(), n * mul);
        }

        #[test]
        fn prop_parse_size_rejects_letter_prefix(s in "[a-zA-Z][a-zA-Z0-9]{0,6}") {
            prop_assert!(parse_size(&s).is_err());
        }
    }
}
