#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use std::path::Path;

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::predicate;

const VALID_ARTIFACT: &str = r#"{
  "generatedAt": "2024-06-12T06:00:00+01:00",
  "sourceStatus": {
    "picturehouse-central": "ok",
    "curzon-soho": "failed",
    "everyman-islington": "ok",
    "bfi-imax": "ok",
    "odeon-leicester-square": "ok"
  },
  "showings": [
    {"cinemaId":"picturehouse-central","filmTitle":"Dune: Part Two","startTime":"2024-06-12T19:30:00+01:00","format":"Regular","day":"Today","bookingUrl":"https://ph.test/1"},
    {"cinemaId":"everyman-islington","filmTitle":"Past Lives","startTime":"2024-06-13T18:00:00+01:00","format":"Regular","day":"Tomorrow","bookingUrl":""},
    {"cinemaId":"bfi-imax","filmTitle":"Oppenheimer","startTime":"2024-06-14T19:30:00+01:00","format":"IMAX","day":"Friday","bookingUrl":""},
    {"cinemaId":"odeon-leicester-square","filmTitle":"Inside Out 2","startTime":"2024-06-15T12:00:00+01:00","format":"Dolby Cinema","day":"Future","bookingUrl":""}
  ]
}"#;

const INVALID_ARTIFACT: &str = r#"{
  "generatedAt": "2024-06-12T06:00:00+01:00",
  "sourceStatus": {"picturehouse-central": "ok"},
  "showings": [
    {"cinemaId":"picturehouse-central","filmTitle":"Dune: Part Two","startTime":"2024-06-12T19:30:00+01:00","format":"Regular","day":"Today","bookingUrl":""},
    {"cinemaId":"odeon-marble-arch","filmTitle":"Dune: Part Two","startTime":"2024-06-12T19:30:00+01:00","format":"Regular","day":"Today","bookingUrl":""}
  ]
}"#;

fn write_artifact(dir: &Path, content: &str) {
    std::fs::write(dir.join("schedule.json"), content).unwrap();
}

#[test]
fn test_version_flag() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cinesched"));
}

#[test]
fn test_run_help() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_validate_valid_artifact() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    write_artifact(dir.path(), VALID_ARTIFACT);

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["validate", "--strict", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Artifact is valid"));
}

#[test]
fn test_validate_strict_fails_on_invalid_artifact() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    write_artifact(dir.path(), INVALID_ARTIFACT);

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["validate", "--strict", "--dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("artifact is invalid"));
}

#[test]
fn test_validate_without_strict_reports_but_succeeds() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("elsewhere.json");
    std::fs::write(&artifact, INVALID_ARTIFACT).unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["validate", "--dir"])
        .arg(dir.path())
        .arg("--artifact")
        .arg(&artifact)
        .assert()
        .success()
        .stdout(predicate::str::contains("Artifact has errors"));
}

#[test]
fn test_validate_missing_artifact() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["validate", "--dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no artifact at"));
}

#[test]
fn test_status_lists_cinemas() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    write_artifact(dir.path(), VALID_ARTIFACT);

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["status", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("curzon-soho"))
        .stdout(predicate::str::contains("Total: 4 showings"));
}

#[test]
fn test_sources_lists_default_urls() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["sources", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("bfi-imax"))
        .stdout(predicate::str::contains("whatson.bfi.org.uk"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let mut first = cargo_bin_cmd!("cinesched");
    first.args(["init", "--dir"]).arg(dir.path()).assert().success();

    // Act & Assert
    assert!(dir.path().join("config.toml").exists());
    let mut second = cargo_bin_cmd!("cinesched");
    second
        .args(["init", "--dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_run_with_every_source_disabled_keeps_previous_artifact() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let config: String = [
        "picturehouse-central",
        "curzon-soho",
        "everyman-islington",
        "bfi-imax",
        "odeon-leicester-square",
    ]
    .iter()
    .map(|id| format!("[sources.{id}]\nenabled = false\n\n"))
    .collect();
    std::fs::write(dir.path().join("config.toml"), config).unwrap();
    write_artifact(dir.path(), VALID_ARTIFACT);

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("cinesched");
    cmd.args(["run", "--dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("schedule not updated"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("schedule.json")).unwrap(),
        VALID_ARTIFACT
    );
}
