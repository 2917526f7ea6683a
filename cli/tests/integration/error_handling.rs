//! Error handling and exit code tests for the pmv CLI.

#![cfg(unix)]

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::MoveFixture;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

fn pmv(fixture: &MoveFixture) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pmv");
    cmd.arg(fixture.src.path())
        .arg(fixture.dst.path())
        .arg("--rsync")
        .arg(fixture.rsync())
        .arg("--check-interval")
        .arg("1")
        .arg("--inactivity-period")
        .arg("5")
        .arg("--failure-interval")
        .arg("0");
    cmd
}

#[test]
fn test_missing_rsync_is_a_configuration_error() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    let mut cmd = cargo_bin_cmd!("pmv");
    cmd.arg(fixture.src.path())
        .arg(fixture.dst.path())
        .arg("--rsync")
        .arg("/nonexistent/rsync")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("rsync"));

    assert!(fixture.src.path().join("run-1").exists());
}

#[test]
fn test_rsync_too_old_is_a_configuration_error() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    let tools = TempDir::new().unwrap();
    let old_rsync = tools.path().join("rsync");
    fs::write(
        &old_rsync,
        "#!/bin/sh\necho \"rsync  version 2.5.7  protocol version 26\"\n",
    )
    .unwrap();
    fs::set_permissions(&old_rsync, fs::Permissions::from_mode(0o755)).unwrap();

    let mut cmd = cargo_bin_cmd!("pmv");
    cmd.arg(fixture.src.path())
        .arg(fixture.dst.path())
        .arg("--rsync")
        .arg(&old_rsync)
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("2.5.7"));
}

#[test]
fn test_source_must_be_a_directory() {
    let fixture = MoveFixture::new();
    let file = fixture.src.path().join("plain-file");
    fs::write(&file, "not a directory").unwrap();

    let mut cmd = cargo_bin_cmd!("pmv");
    cmd.arg(&file)
        .arg(fixture.dst.path())
        .arg("--rsync")
        .arg(fixture.rsync())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn test_named_item_must_exist() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    pmv(&fixture)
        .arg("--item")
        .arg("does-not-exist")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No such item"));

    assert!(fixture.src.path().join("run-1").exists());
}

#[test]
fn test_rsync_module_requires_destination_host() {
    let fixture = MoveFixture::new();

    let mut cmd = cargo_bin_cmd!("pmv");
    cmd.arg(fixture.src.path())
        .arg(fixture.dst.path())
        .arg("--rsync-module")
        .arg("archive")
        .assert()
        .failure()
        .stderr(predicate::str::contains("destination-host"));
}

#[test]
fn test_unreachable_rsync_module_is_a_configuration_error() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    pmv(&fixture)
        .arg("--destination-host")
        .arg("archive-host")
        .arg("--rsync-module")
        .arg("incoming")
        .env("FAKE_RSYNC_EXIT", "5")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("incoming"));

    assert!(fixture.src.path().join("run-1").exists());
}

#[test]
fn test_retriable_failures_exhaust_the_retry_budget() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    pmv(&fixture)
        .arg("--max-retries")
        .arg("1")
        .env("FAKE_RSYNC_EXIT", "23")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("failed: run-1"));

    // The source survives a failed move intact.
    assert!(fixture.src.path().join("run-1/data.txt").exists());
    assert!(
        !fixture
            .dst
            .path()
            .join(".MARKER_is_finished_run-1")
            .exists()
    );
}

#[test]
fn test_fatal_rsync_error_fails_the_item() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    pmv(&fixture)
        .arg("--max-retries")
        .arg("5")
        .env("FAKE_RSYNC_EXIT", "1")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("failed: run-1"));

    assert!(fixture.src.path().join("run-1/data.txt").exists());
}

#[test]
fn test_one_bad_item_does_not_block_the_others() {
    let fixture = MoveFixture::new();
    fixture.seed_item("good");
    fixture.seed_item("broken-item");

    // The fake rsync fails every copy of the broken item; the rest of
    // the batch still goes through.
    pmv(&fixture)
        .arg("--max-retries")
        .arg("0")
        .env("FAKE_RSYNC_FAIL_FOR", "broken-item")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("failed: broken-item"));

    fixture.assert_moved("good");
    assert!(fixture.src.path().join("broken-item/data.txt").exists());
}
