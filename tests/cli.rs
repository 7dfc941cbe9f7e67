//! CLI test cases.
//!
//! These use `sidecar` recognizers, which read pre-recorded transcripts from
//! `tests/fixtures/dataset`, so no OCR engine needs to be installed.

use std::{fs, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Dataset with two scorable images and one image with no reference.
static DATASET: &str = "tests/fixtures/dataset";

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("ocr-bench").unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_score() {
    cmd()
        .arg("score")
        .arg("tests/fixtures/texts/reference.txt")
        .arg("tests/fixtures/texts/candidate.txt")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""distance": 1"#))
        .stdout(predicate::str::contains(r#""reference_length": 5"#))
        .stdout(predicate::str::contains(r#""similarity": 80.0"#));
}

#[test]
fn test_score_against_empty_reference_fails() {
    cmd()
        .arg("score")
        .arg("tests/fixtures/texts/empty.txt")
        .arg("tests/fixtures/texts/candidate.txt")
        .assert()
        .failure();
}

#[test]
fn test_run_writes_csv_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("results.csv");
    let json_path = dir.path().join("report.json");

    cmd()
        .arg("run")
        .arg(DATASET)
        .arg("--config")
        .arg("tests/fixtures/sidecars.toml")
        .arg("-o")
        .arg(&csv_path)
        .arg("--report-json")
        .arg(&json_path)
        .assert()
        .success();

    let csv = fs::read_to_string(&csv_path).unwrap();
    let lines = csv.lines().collect::<Vec<_>>();
    assert_eq!(
        lines[0],
        "image,reference,good text,good time_ms,good score,bad text,bad time_ms,bad score"
    );
    assert!(lines[1].starts_with("letters/hello.png,hello,hello,"));
    assert!(lines[1].contains(",100.00,hallo,"));
    assert!(lines[1].ends_with(",80.00"));
    assert!(lines[2].starts_with("numbers/digits.png,0123456789,0123456789,"));
    assert!(lines[2].ends_with(",90.00"));
    assert!(lines[3].starts_with("AVG,,AVG,"));
    assert!(lines[3].contains(",100.00,AVG,"));
    assert!(lines[3].ends_with(",85.00"));
    assert!(lines[4].starts_with("images amount,2"));
    assert_eq!(lines.len(), 5);

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(report["sample_count"], 2);
    assert_eq!(report["skipped"][0]["id"], "numbers/orphan.png");
    assert_eq!(report["summaries"][0]["recognizer"], "good");
    assert_eq!(report["summaries"][0]["average_score"], 100.0);
    assert_eq!(report["summaries"][1]["average_score"], 85.0);
}

#[test]
fn test_run_without_texts() {
    cmd()
        .arg("run")
        .arg(DATASET)
        .arg("--config")
        .arg("tests/fixtures/sidecars.toml")
        .arg("--without-texts")
        .arg("--take-first")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("letters/hello.png,,,"))
        .stdout(predicate::str::contains("hallo").not())
        .stdout(predicate::str::contains("images amount,1"));
}

#[test]
fn test_run_checks_failure_rate() {
    // Half of all calls fail, because "missing" has no transcripts.
    cmd()
        .arg("run")
        .arg(DATASET)
        .arg("--config")
        .arg("tests/fixtures/missing.toml")
        .assert()
        .success();

    cmd()
        .arg("run")
        .arg(DATASET)
        .arg("--config")
        .arg("tests/fixtures/missing.toml")
        .arg("--allowed-failure-rate")
        .arg("0.25")
        .assert()
        .failure()
        .stderr(predicate::str::contains("recognizer calls failed"));
}

#[test]
fn test_run_on_empty_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .arg("run")
        .arg(dir.path())
        .arg("--config")
        .arg("tests/fixtures/sidecars.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no images found"));
}
