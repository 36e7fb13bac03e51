//! End-to-end tests for the oa-core binary.
//!
//! Every test runs against a generated dataset in a temp dir, with config
//! resolution pinned to that dir so host config never leaks in.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

/// 200 ordinary approvals and 40 slow ones, most of the slow ones from the US.
fn write_dataset(dir: &Path) -> PathBuf {
    let mut instances = Vec::new();
    for i in 0..240 {
        let slow = i >= 200;
        let country = match (slow, i) {
            (false, i) if i < 20 => "US",
            (false, _) => "DE",
            (true, i) if i < 230 => "US",
            (true, _) => "FR",
        };
        let approve = if slow { 20_000.0 } else { 1000.0 + (i % 10) as f64 };
        instances.push(json!({
            "processInstanceId": format!("pi-{:03}", i),
            "processDefinitionKey": "invoice",
            "processDefinitionVersion": 1,
            "flowNodeInstances": [
                {"flowNodeId": "approve", "flowNodeType": "userTask", "totalDurationInMs": approve},
                {"flowNodeId": "archive", "flowNodeType": "serviceTask", "totalDurationInMs": 40},
                {"flowNodeId": "split", "flowNodeType": "exclusiveGateway", "totalDurationInMs": 1}
            ],
            "variables": [{"name": "country", "value": country}]
        }));
    }
    let path = dir.join("invoice.json");
    fs::write(&path, Value::Array(instances).to_string()).unwrap();
    path
}

struct Fixture {
    dir: TempDir,
    data: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data = write_dataset(dir.path());
        Fixture { dir, data }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("oa-core").expect("oa-core binary should exist");
        cmd.env("XDG_CONFIG_HOME", self.dir.path())
            .env_remove("OA_CONFIG")
            .env_remove("OA_DATA")
            .env_remove("OA_LOG")
            .env_remove("OA_LOG_FORMAT")
            .env_remove("RUST_LOG");
        cmd
    }

    fn with_data(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--data").arg(&self.data);
        cmd
    }
}

fn json_stdout(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ============================================================================
// Pure commands
// ============================================================================

#[test]
fn version_reports_schema() {
    let fx = Fixture::new();
    let output = fx.cmd().arg("version").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let v = json_stdout(&output);
    assert_eq!(v["command"], "version");
    assert_eq!(v["data"]["schema_version"], oa_common::SCHEMA_VERSION);
    assert!(v["run_id"].as_str().unwrap().starts_with("run-"));
}

#[test]
fn interval_uses_ceiling_division() {
    let fx = Fixture::new();
    let output = fx
        .cmd()
        .args(["interval", "--min", "0", "--max", "100000", "--target", "80"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let v = json_stdout(&output);
    assert_eq!(v["data"]["interval"], 1250);
    assert_eq!(v["data"]["bucket_count"], 80);
}

#[test]
fn interval_rejects_inverted_range() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["interval", "--min", "10", "--max", "5", "--target", "3"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn bounds_from_explicit_stats() {
    let fx = Fixture::new();
    let output = fx
        .cmd()
        .args([
            "bounds", "--count", "100", "--min", "0", "--max", "20000", "--mean", "2000",
            "--std-dev", "3000",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let bounds = &json_stdout(&output)["data"]["bounds"];
    assert!(bounds["lower_bound_value"].is_null());
    assert_eq!(bounds["upper_bound_value"], 6500.0);
}

#[test]
fn bounds_without_spread_are_clean() {
    let fx = Fixture::new();
    fx.cmd()
        .args([
            "--format", "summary", "bounds", "--count", "50", "--min", "100", "--max", "10100",
            "--mean", "1000", "--std-dev", "0",
        ])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("lower -, upper -"));
}

#[test]
fn bounds_need_stats_or_a_process() {
    let fx = Fixture::new();
    fx.cmd().args(["bounds", "--min", "0"]).assert().code(10);
}

// ============================================================================
// Dataset commands
// ============================================================================

#[test]
fn findings_report_the_slow_user_task() {
    let fx = Fixture::new();
    let output = fx
        .with_data()
        .args(["findings", "--process", "invoice"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let findings = &json_stdout(&output)["data"]["findings"];
    let approve = &findings["approve"];
    assert_eq!(approve["total_count"], 240);
    assert_eq!(approve["higher_outlier"]["count"], 40);
    assert_eq!(approve["heat"], 1.0);
    assert!(findings.get("split").is_none());
}

#[test]
fn findings_for_unknown_process_are_empty() {
    let fx = Fixture::new();
    let output = fx
        .with_data()
        .args(["findings", "--process", "shipping"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let v = json_stdout(&output);
    assert_eq!(v["data"]["findings"], json!({}));
}

#[test]
fn chart_with_derived_bounds_flags_the_slow_bucket() {
    let fx = Fixture::new();
    let output = fx
        .with_data()
        .args(["chart", "--process", "invoice", "--flow-node", "approve"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let v = json_stdout(&output);
    let entries = v["data"]["entries"].as_array().unwrap();
    assert!(entries.len() <= 81);
    let last = entries.last().unwrap();
    assert_eq!(last["is_outlier"], true);
    assert_eq!(last["count"], 40);
    assert!(v["data"]["higher_outlier_bound"].is_number());
}

#[test]
fn terms_find_over_represented_countries() {
    let fx = Fixture::new();
    let output = fx
        .with_data()
        .args([
            "terms", "--process", "invoice", "--flow-node", "approve", "--higher", "5000",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let terms = json_stdout(&output)["data"]["terms"].clone();
    assert_eq!(terms[0]["term"], "US");
    assert_eq!(terms[0]["outlier_instance_count"], 30);
    assert!(terms
        .as_array()
        .unwrap()
        .iter()
        .all(|t| t["term"] != "DE"));
}

#[test]
fn instances_respect_the_export_limit() {
    let fx = Fixture::new();
    let config = fx.dir.path().join("limits.json");
    fs::write(&config, r#"{"export_limit": 12, "max_page_size": 5}"#).unwrap();

    let output = fx
        .with_data()
        .arg("--config")
        .arg(&config)
        .args([
            "instances", "--process", "invoice", "--flow-node", "approve", "--higher", "5000",
            "--variable", "country", "--term", "US",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let ids = json_stdout(&output)["data"]["instance_ids"].clone();
    let ids = ids.as_array().unwrap();
    assert_eq!(ids.len(), 12);
    assert_eq!(ids[0], "pi-200");
}

#[test]
fn data_can_come_from_the_environment() {
    let fx = Fixture::new();
    fx.cmd()
        .env("OA_DATA", &fx.data)
        .args(["--format", "summary", "findings", "--process", "invoice"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("hottest approve"));
}

#[test]
fn markdown_output_renders_a_table() {
    let fx = Fixture::new();
    fx.with_data()
        .args(["--format", "md", "findings", "--process", "invoice"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("| approve |"));
}

// ============================================================================
// Errors and exit codes
// ============================================================================

#[test]
fn missing_dataset_is_an_argument_error() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["findings", "--process", "invoice"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("OA_DATA"));
}

#[test]
fn unreadable_dataset_is_an_io_error() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("--data")
        .arg(fx.dir.path().join("nope.json"))
        .args(["findings", "--process", "invoice"])
        .assert()
        .code(21);
}

#[test]
fn malformed_dataset_is_an_io_error() {
    let fx = Fixture::new();
    let bad = fx.dir.path().join("bad.json");
    fs::write(&bad, "{ not json").unwrap();
    fx.cmd()
        .arg("--data")
        .arg(&bad)
        .args(["findings", "--process", "invoice"])
        .assert()
        .code(21);
}

#[test]
fn terms_without_bounds_on_flat_data_are_empty() {
    let fx = Fixture::new();
    let output = fx
        .with_data()
        .args(["terms", "--process", "invoice", "--flow-node", "archive"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json_stdout(&output)["data"]["terms"], json!([]));
}

#[test]
fn json_errors_are_structured() {
    let fx = Fixture::new();
    let output = fx
        .cmd()
        .args(["interval", "--min", "0", "--max", "10", "--target", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(10));
    let v: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(v["status"], "error");
    assert_eq!(v["command"], "interval");
    assert_eq!(v["error"]["category"], "validation");
}

#[test]
fn unknown_command_fails() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_default_is_valid_json() {
    let fx = Fixture::new();
    let output = fx.cmd().args(["config", "default"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let v = json_stdout(&output);
    assert_eq!(v["target_bucket_count"], 80);
    assert_eq!(v["significance_level"], 0.001);
}

#[test]
fn config_show_reports_defaults() {
    let fx = Fixture::new();
    let output = fx.cmd().args(["config", "show"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let v = json_stdout(&output);
    assert_eq!(v["data"]["status"], "loaded");
    assert_eq!(v["data"]["config"]["export_limit"], 1000);
}

#[test]
fn config_validate_rejects_bad_values() {
    let fx = Fixture::new();
    let config = fx.dir.path().join("bad-config.json");
    fs::write(&config, r#"{"target_bucket_count": 0}"#).unwrap();
    fx.cmd()
        .args(["config", "validate"])
        .arg(&config)
        .assert()
        .code(11);
}

#[test]
fn config_validate_accepts_a_good_file() {
    let fx = Fixture::new();
    let config = fx.dir.path().join("good-config.json");
    fs::write(&config, r#"{"significance_level": 0.01}"#).unwrap();
    let output = fx
        .cmd()
        .args(["config", "validate"])
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json_stdout(&output)["data"]["status"], "valid");
}

#[test]
fn xdg_config_is_picked_up() {
    let fx = Fixture::new();
    let xdg = fx.dir.path().join("outlier_analysis");
    fs::create_dir_all(&xdg).unwrap();
    fs::write(xdg.join("config.json"), r#"{"target_bucket_count": 5}"#).unwrap();
    let output = fx
        .cmd()
        .args(["interval", "--min", "0", "--max", "100"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json_stdout(&output)["data"]["interval"], 20);
}
