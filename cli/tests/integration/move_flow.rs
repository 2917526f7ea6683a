//! End-to-end move flow tests for the pmv CLI.
//!
//! These run the real binary against a fake rsync shell script, so they
//! are restricted to Unix.

#![cfg(unix)]

#[path = "../common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::MoveFixture;
use predicates::prelude::*;
use std::fs;

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
fn test_move_single_item() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    pmv(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 1 item(s)."));

    fixture.assert_moved("run-1");
}

#[test]
fn test_move_all_items() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");
    fixture.seed_item("run-2");
    fixture.seed_item("run-3");

    pmv(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 3 item(s)."));

    fixture.assert_moved("run-1");
    fixture.assert_moved("run-2");
    fixture.assert_moved("run-3");
}

#[test]
fn test_move_named_item_leaves_others() {
    let fixture = MoveFixture::new();
    fixture.seed_item("wanted");
    fixture.seed_item("not-yet");

    pmv(&fixture).arg("--item").arg("wanted").assert().success();

    fixture.assert_moved("wanted");
    assert!(fixture.src.path().join("not-yet").exists());
    assert!(!fixture.dst.path().join("not-yet").exists());
}

#[test]
fn test_marker_files_in_source_are_not_items() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");
    fs::write(
        fixture.src.path().join(".MARKER_is_finished_old-run"),
        "",
    )
    .unwrap();

    pmv(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 1 item(s)."));

    fixture.assert_moved("run-1");
    // The stray marker stays behind untouched.
    assert!(
        fixture
            .src
            .path()
            .join(".MARKER_is_finished_old-run")
            .exists()
    );
}

#[test]
fn test_recovery_from_interrupted_deletion_skips_copy() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    // A previous run finished the copy and crashed mid-deletion: the
    // destination holds the data and the deletion-in-progress marker.
    let copied = fixture.dst.path().join("run-1");
    fs::create_dir_all(copied.join("sub")).unwrap();
    fs::write(copied.join("data.txt"), "payload of run-1").unwrap();
    fs::write(copied.join("sub/more.txt"), "nested").unwrap();
    fs::write(
        fixture
            .dst
            .path()
            .join(".MARKER_deletion_in_progress_run-1"),
        "",
    )
    .unwrap();

    // A failing rsync proves the recovery path never launches a copy.
    pmv(&fixture)
        .env("FAKE_RSYNC_EXIT", "1")
        .assert()
        .success();

    fixture.assert_moved("run-1");
}

#[test]
fn test_empty_source_succeeds() {
    let fixture = MoveFixture::new();

    pmv(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 0 item(s)."));
}

#[test]
fn test_json_output() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    pmv(&fixture)
        .arg("--output")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"moved\":1"))
        .stdout(predicate::str::contains("\"total\":1"));

    fixture.assert_moved("run-1");
}

#[test]
fn test_rerun_after_completion_is_a_no_op() {
    let fixture = MoveFixture::new();
    fixture.seed_item("run-1");

    pmv(&fixture).assert().success();
    fixture.assert_moved("run-1");

    // The source is empty now; a second run has nothing to do and must
    // not disturb the moved data or its marker.
    pmv(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 0 item(s)."));
    fixture.assert_moved("run-1");
}
