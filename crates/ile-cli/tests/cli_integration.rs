//! CLI Integration Tests
//!
//! These tests verify the wiring between the CLI and the core library:
//! configuration loading, exit codes and the stdout/stderr split. Database
//! endpoints point at a closed local port so every connection fails fast.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Address nothing listens on
const DEAD_DSN: &str = "tcp(127.0.0.1:1)";

fn cli_cmd() -> Command {
    Command::cargo_bin("ile").expect("Failed to find ile binary")
}

/// Write a config file with `sources` log-source entries into `dir`.
fn write_config(dir: &TempDir, sources: usize) -> PathBuf {
    let source_list: Vec<String> = (0..sources)
        .map(|i| {
            format!(
                r#"{{ "dsn": "{}", "db": "icinga{}", "user": "icinga", "password": "pw" }}"#,
                DEAD_DSN, i
            )
        })
        .collect();
    let raw = format!(
        r#"{{
            "timeout": "2s",
            "thruk_db": {{ "dsn": "{}", "db": "thruk", "user": "thruk", "password": "pw" }},
            "icinga_db": [{}]
        }}"#,
        DEAD_DSN,
        source_list.join(",")
    );
    let path = dir.path().join("ile_config.json");
    std::fs::write(&path, raw).unwrap();
    path
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_missing_config_is_fatal() {
    let dir = TempDir::new().unwrap();

    cli_cmd()
        .arg("-c")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("config file missing"));
}

#[test]
fn test_unparseable_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"timeout\": ").unwrap();

    cli_cmd()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn test_invalid_timeout_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ile_config.json");
    std::fs::write(
        &path,
        r#"{ "timeout": "whenever", "thruk_db": { "dsn": "db", "db": "thruk" } }"#,
    )
    .unwrap();

    cli_cmd()
        .arg("-c")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid timeout"));
}

// ============================================================================
// Degraded Runs
// ============================================================================

#[test]
fn test_empty_source_list_exits_cleanly() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, 0);

    cli_cmd()
        .arg("-c")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unreachable_databases_are_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, 2);

    cli_cmd()
        .arg("-c")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("no watermark found"))
        .stderr(predicate::str::contains("skipping"));
}

#[test]
fn test_sort_and_concurrent_flags_accepted() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, 2);

    cli_cmd()
        .args(["--sort", "--concurrent", "-v"])
        .arg("-c")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("export finished"));
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn test_help_mentions_config_flag() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"));
}
