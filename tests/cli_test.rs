//! CLI tests for the cks binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cks(temp: &Path) -> Command {
    let config = temp.join("config.yml");
    if !config.exists() {
        fs::write(
            &config,
            format!("store-path: {}\nchunk-size: 16\n", temp.join("store.db").display()),
        )
        .unwrap();
    }

    let mut cmd = Command::cargo_bin("cks").unwrap();
    cmd.arg("--config").arg(&config);
    cmd
}

#[test]
fn test_set_then_get() {
    let temp = TempDir::new().unwrap();

    cks(temp.path())
        .args(["set", "profile", r#"{"name":"Ada","favorites":[1,2,3]}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored"));

    cks(temp.path())
        .args(["get", "profile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"Ada\""));
}

#[test]
fn test_get_missing_key_fails() {
    let temp = TempDir::new().unwrap();

    cks(temp.path())
        .args(["get", "nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Key not found"));
}

#[test]
fn test_set_rejects_invalid_json() {
    let temp = TempDir::new().unwrap();

    cks(temp.path())
        .args(["set", "profile", "{broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_set_from_stdin() {
    let temp = TempDir::new().unwrap();

    cks(temp.path())
        .args(["set", "notes", "-"])
        .write_stdin(r#"["first","second"]"#)
        .assert()
        .success();

    cks(temp.path())
        .args(["get", "notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("second"));
}

#[test]
fn test_keys_stats_and_remove() {
    let temp = TempDir::new().unwrap();

    cks(temp.path())
        .args(["set", "big"])
        .arg(format!("\"{}\"", "x".repeat(40)))
        .assert()
        .success();
    cks(temp.path()).args(["set", "small", "1"]).assert().success();

    cks(temp.path())
        .arg("keys")
        .assert()
        .success()
        .stdout(predicate::str::contains("big").and(predicate::str::contains("small")))
        .stdout(predicate::str::contains("big_chunks").not());

    cks(temp.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Physical keys: 5"));

    cks(temp.path()).args(["remove", "big"]).assert().success();
    cks(temp.path()).args(["remove", "big"]).assert().success();

    cks(temp.path())
        .arg("keys")
        .assert()
        .success()
        .stdout(predicate::str::contains("big").not());
}

#[test]
fn test_store_flag_overrides_config() {
    let temp = TempDir::new().unwrap();
    let other = temp.path().join("other.db");

    cks(temp.path())
        .arg("--store")
        .arg(&other)
        .args(["set", "k", "true"])
        .assert()
        .success();

    assert!(other.exists());
    cks(temp.path()).args(["get", "k"]).assert().failure();
}

#[test]
fn test_cleanup_reports_count() {
    let temp = TempDir::new().unwrap();

    cks(temp.path())
        .arg("cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Evicted 0 keys"));
}
