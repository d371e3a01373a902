mod common;

use assert_cmd::Command;
use common::{TestWorkspace, write_item_master};
use predicates::prelude::*;
use predicates::str::contains;

fn miner() -> Command {
    Command::cargo_bin("mapping-miner").expect("binary exists")
}

#[test]
fn analyze_prints_table_report() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    miner()
        .args(["analyze", "--legacy"])
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(contains("SHEET"))
        .stdout(contains("FIELD_NAME"))
        .stdout(contains("Copy from FUDS"))
        .stdout(contains("Value is 'EU'"))
        .stdout(contains("ITTY == 'SRV'"))
        .stdout(contains("92.0%"));
}

#[test]
fn analyze_writes_csv_draft() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    let output = workspace.path().join("draft.csv");
    miner()
        .args(["analyze", "--format", "csv", "--legacy"])
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&output).expect("read draft");
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some("\"SHEET\",\"FIELD_NAME\",\"RULE_TYPE\",\"SOURCE_FIELD\",\"LOGIC\",\"CONFIDENCE\"")
    );
    assert_eq!(
        lines.next(),
        Some("\"MITMAS\",\"NAME\",\"DIRECT\",\"FUDS\",\"Copy from FUDS\",\"100.0%\"")
    );
    assert_eq!(lines.count(), 2);
}

#[test]
fn analyze_json_honors_skip_and_threshold() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    let assert = miner()
        .args(["analyze", "--format", "json", "--skip", "NAME", "--threshold", "95"])
        .arg("--legacy")
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json report");
    let fields = value["fields"].as_array().expect("fields");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0]["target"], "LOCATION");
    assert_eq!(fields[1]["target"], "STAT");
    assert_eq!(fields[1]["kind"], "UNKNOWN");
}

#[test]
fn analyze_reads_settings_from_config_file() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    let config = workspace.write(
        "miner.yaml",
        "high_confidence_threshold: 95\nskip_targets:\n  - NAME\n",
    );
    miner()
        .args(["analyze", "--format", "csv"])
        .arg("--legacy")
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("\"STAT\",\"UNKNOWN\""))
        .stdout(contains("\"NAME\"").not());
}

#[test]
fn unknown_config_fields_are_rejected() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    let config = workspace.write("miner.yaml", "threshold: 95\n");
    miner()
        .args(["analyze", "--legacy"])
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn align_writes_joined_rows() {
    let workspace = TestWorkspace::new();
    let legacy = workspace.write("legacy.csv", "MMITNO,MMSTAT\nA1,20\nA2,90\nA3,20\n");
    let target = workspace.write("target.csv", "ITNO,STAT\nA1,20\nA2,90\n");
    let output = workspace.path().join("aligned.csv");
    miner()
        .args(["align", "--legacy"])
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let contents = std::fs::read_to_string(&output).expect("read aligned");
    assert_eq!(
        contents,
        "\"ITNO\",\"STAT_SRC\",\"STAT_TGT\"\n\"A1\",\"20\",\"20\"\n\"A2\",\"90\",\"90\"\n"
    );
}

#[test]
fn profile_lists_predictor_verdicts() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    miner()
        .args(["profile", "--legacy"])
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(contains("verdict"))
        .stdout(contains("ITTY"))
        .stdout(contains("identifier-like"))
        .stdout(contains("predictor"));
}

#[test]
fn missing_common_key_is_reported() {
    let workspace = TestWorkspace::new();
    let legacy = workspace.write("legacy.csv", "MMAAAA\n1\n");
    let target = workspace.write("target.csv", "BBBB\n1\n");
    miner()
        .args(["analyze", "--legacy"])
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .assert()
        .failure()
        .stderr(contains("No common key columns"));
}

#[test]
fn explicit_key_must_exist_on_both_sides() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    miner()
        .args(["analyze", "--key", "CUNO", "--legacy"])
        .arg(&legacy)
        .arg("--target")
        .arg(&target)
        .assert()
        .failure()
        .stderr(contains("CUNO"));
}
