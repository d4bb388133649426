//! Binary-level checks that need no container daemon.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const MANIFEST: &str = include_str!("fixtures/satchel.toml");

fn satchel(dir: &TempDir) -> Command {
    let mut command = Command::cargo_bin("satchel").unwrap();
    command
        .current_dir(dir.path())
        .env_remove("SATCHEL_MANIFEST")
        .env_remove("SATCHEL_OUTPUT")
        .env("SATCHEL_DOCKER", "satchel-test-missing-docker");
    command
}

#[test]
fn test_help_lists_flags() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    satchel(&temp_dir)
        .arg("-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--in <PATH>"))
        .stdout(predicate::str::contains("--out <PATH>"))
        .stdout(predicate::str::contains("--public"));
}

#[test]
fn test_missing_manifest_exits_nonzero() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    satchel(&temp_dir)
        .args(["-in", "nope.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Input file 'nope.toml' not found"))
        .stderr(predicate::str::contains("Recovery suggestions"));

    assert!(!temp_dir.path().join("satchel-images.tgz").exists());
    assert!(!temp_dir.path().join("load-images.sh").exists());
}

#[test]
fn test_default_manifest_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    satchel(&temp_dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'satchel.toml' not found"));
}

#[test]
fn test_unreachable_daemon_is_fatal() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(temp_dir.path().join("satchel.toml"), MANIFEST).unwrap();

    satchel(&temp_dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot connect to the container daemon"));

    assert!(!temp_dir.path().join("load-images.sh").exists());
}

#[test]
fn test_malformed_manifest_is_fatal() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(temp_dir.path().join("satchel.toml"), "[[image]\n").unwrap();

    satchel(&temp_dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error loading file satchel.toml"));
}

#[test]
fn test_script_and_archive_paths_must_differ() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    satchel(&temp_dir)
        .args(["-out", "same", "--script", "same"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid arguments"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    satchel(&temp_dir).arg("-frobnicate").assert().code(2);
}
