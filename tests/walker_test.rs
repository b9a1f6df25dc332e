//! Integration tests for directory mirroring
//!
//! - Every file, directory and symlink of the host tree is staged
//! - Broken symlinks are skipped without failing the walk
//! - Symlinks that cannot be followed abort the walk
//! - Structural conflicts abort the walk with a recoverable error
//! - Relative mirroring strips the walked root

mod common;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use common::TestProject;
use predicates::prelude::*;
use rootstage::core::manifest::Manifest;
use rootstage::core::tree::Node;
use rootstage::error::{ConflictKind, ManifestError};

/// Helper to build a small static site tree
fn static_site() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("site/index.html").write_str("<html/>").unwrap();
    temp.child("site/css/site.css").write_str("body{}").unwrap();
    temp.child("site/empty").create_dir_all().unwrap();
    temp.child("site/latest.html")
        .symlink_to_file("index.html")
        .unwrap();
    temp
}

#[test]
fn test_add_directory_mirrors_at_host_path() {
    let temp = static_site();
    let root = temp.child("site");

    let mut manifest = Manifest::new("");
    manifest.add_directory(root.path()).unwrap();

    let base = root.path().to_string_lossy().into_owned();
    assert!(manifest.file_exists(&format!("{base}/index.html")));
    assert!(manifest.file_exists(&format!("{base}/css/site.css")));
    assert!(manifest
        .root()
        .lookup(&format!("{base}/empty"))
        .unwrap()
        .is_directory());
    assert_eq!(
        manifest.root().lookup(&format!("{base}/latest.html")),
        Some(&Node::Link("index.html".to_string()))
    );
}

#[test]
fn test_add_relative_directory_roots_contents() {
    let temp = static_site();

    let mut manifest = Manifest::new("");
    manifest.add_relative_directory(temp.child("site").path()).unwrap();

    assert!(manifest.file_exists("/index.html"));
    assert!(manifest.file_exists("/css/site.css"));
    assert!(manifest.root().lookup("/empty").unwrap().is_directory());
    assert!(manifest.root().lookup("/latest.html").unwrap().is_link());

    let stats = manifest.root().stats();
    assert_eq!(stats.directories, 2);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.links, 1);
}

#[test]
fn test_broken_symlink_is_skipped() {
    let project = TestProject::new();
    project.create_file("tree/ok.txt", "ok");
    project.create_symlink("tree/dangling", "does-not-exist");

    let mut manifest = Manifest::new("");
    manifest
        .add_relative_directory(project.path().join("tree"))
        .expect("broken links must not abort the walk");

    assert!(manifest.file_exists("/ok.txt"));
    assert!(manifest.root().lookup("/dangling").is_none());
}

#[test]
fn test_unfollowable_symlink_aborts_walk() {
    let project = TestProject::new();
    project.create_file("tree/ok.txt", "ok");
    project.create_symlink("tree/loop", "loop");

    let mut manifest = Manifest::new("");
    let err = manifest
        .add_relative_directory(project.path().join("tree"))
        .unwrap_err();

    match &err {
        ManifestError::Walk { source, .. } => {
            assert!(matches!(**source, ManifestError::WalkIo { .. }));
        }
        other => panic!("expected Walk, got {other:?}"),
    }
    assert!(!err.is_fatal());
    assert!(manifest.root().lookup("/loop").is_none());
}

#[test]
fn test_directory_over_file_aborts_walk() {
    let project = TestProject::new();
    project.create_file("tree/etc/hosts", "127.0.0.1 localhost");
    project.create_file("etc-file", "plain");

    let mut manifest = Manifest::new("");
    manifest.add_file("/etc", &project.host("etc-file")).unwrap();

    let err = manifest
        .add_relative_directory(project.path().join("tree"))
        .unwrap_err();
    assert!(matches!(err, ManifestError::Walk { .. }));
    assert_eq!(err.conflict_kind(), Some(ConflictKind::DirectoryOverFile));
    assert!(!err.is_fatal());
    assert!(manifest.file_exists("/etc"));
}

#[test]
fn test_file_over_directory_inside_walk_is_recoverable() {
    let project = TestProject::new();
    project.create_file("tree/opt", "now a file");
    project.create_file("tool", "bin");

    let mut manifest = Manifest::new("");
    manifest.add_file("/opt/tool", &project.host("tool")).unwrap();

    let err = manifest
        .add_relative_directory(project.path().join("tree"))
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::FileOverDirectory));
    assert!(!err.is_fatal());
    assert!(manifest.file_exists("/opt/tool"));
}

#[test]
fn test_missing_directory_fails_walk() {
    let project = TestProject::new();
    let mut manifest = Manifest::new("");

    let err = manifest
        .add_directory(project.path().join("nope"))
        .unwrap_err();
    assert!(predicate::str::contains("nope").eval(&err.to_string()));
    assert!(!err.is_fatal());
}

#[test]
fn test_walk_twice_is_idempotent() {
    let temp = static_site();
    let root = temp.child("site");

    let mut manifest = Manifest::new("");
    manifest.add_relative_directory(root.path()).unwrap();
    let before = manifest.root().clone();
    manifest.add_relative_directory(root.path()).unwrap();

    assert_eq!(manifest.root(), &before);
}
