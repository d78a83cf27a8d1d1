#![allow(missing_docs)]

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn config_dir(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

fn stdout_of(cmd: &mut assert_cmd::Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf8 stdout")
}

#[test]
fn analyze_single_query_reports_issue_and_summary() {
    let (_dir, config) = config_dir("");
    let printed = stdout_of(
        cargo_bin_cmd!("sparql-analyze")
            .args(["--color", "never", "--config"])
            .arg(&config)
            .args(["analyze", "--compact"])
            .arg("SELECT * WHERE { ?s ?p ?o FILTER(?x = 1) }"),
    );
    assert!(
        printed.contains("ISSUE: UnboundFilterVariable: Variable will be unbound in FILTER evaluation: ?x"),
        "{printed}"
    );
    assert!(printed.contains("1 total queries analyzed."), "{printed}");
    assert!(printed.contains("1 total issues found:"), "{printed}");
    assert!(printed.contains("-      1 UnboundFilterVariable"), "{printed}");
}

#[test]
fn analyze_stdin_batch_continues_after_parse_failure() {
    let (_dir, config) = config_dir("[output]\nprint_issues = false\n");
    let printed = stdout_of(
        cargo_bin_cmd!("sparql-analyze")
            .args(["--stdin", "--color", "never", "--config"])
            .arg(&config)
            .arg("analyze")
            .write_stdin("SELECT * WHERE { OPTIONAL { ?s ?p ?o } }\nSELECT WHERE\n# skipped\nASK { ?s ?p ?o }\n"),
    );
    assert!(printed.contains("ERROR:2: Failed to analyze query"), "{printed}");
    assert!(printed.contains("FAILED:2: SELECT WHERE"), "{printed}");
    assert!(!printed.contains("ISSUE:"), "{printed}");
    assert!(printed.contains("2 total queries analyzed."), "{printed}");
    assert!(printed.contains("UselessOptionalAnalyzer"), "{printed}");
}

#[test]
fn analyze_json_summary_respects_disabled_analyzers() {
    let (_dir, config) = config_dir("disabled_analyzers = [\"UnboundFilterVariable\"]\n");
    let output = cargo_bin_cmd!("sparql-analyze")
        .args(["--format", "json", "--config"])
        .arg(&config)
        .args(["analyze", "--no-issues"])
        .arg("SELECT * WHERE { ?s ?p ?o FILTER(?x = 1) }")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["queries"], 1);
    assert!(json["counts"].as_object().is_some_and(|c| c.is_empty()));
}

#[test]
fn url_decoded_stdin_paths() {
    let (_dir, config) = config_dir("");
    let printed = stdout_of(
        cargo_bin_cmd!("sparql-analyze")
            .args(["-c", "-d", "--config"])
            .arg(&config)
            .args(["complex-paths"])
            .write_stdin("SELECT+*+WHERE+%7B+%3Fs+%28%3Chttp%3A%2F%2Fx%2Fp%3E%2F%3Chttp%3A%2F%2Fx%2Fq%3E%29%2B+%3Fo+%7D\n"),
    );
    assert!(
        printed.contains("COMPLEX PATH: ?s (<http://x/p>/<http://x/q>)+ ?o"),
        "{printed}"
    );
    assert!(printed.ends_with("1 complex plus/star paths in 1 total path patterns\n"));
}

#[test]
fn query_argument_may_be_a_file() {
    let (dir, config) = config_dir("");
    let query = dir.path().join("query.rq");
    fs::write(&query, "SELECT * WHERE { ?s ?p ?o }").expect("write query");
    let printed = stdout_of(
        cargo_bin_cmd!("sparql-analyze")
            .arg("--config")
            .arg(&config)
            .arg("unbound-predicates")
            .arg(&query),
    );
    assert!(printed.ends_with("1/1 (100.0%) queries have an unbound predicate\n"), "{printed}");
}

#[test]
fn characteristic_sets_as_json() {
    let (_dir, config) = config_dir("");
    let output = cargo_bin_cmd!("sparql-analyze")
        .args(["--format", "json", "--config"])
        .arg(&config)
        .arg("characteristic-sets")
        .arg("SELECT * WHERE { ?s <http://x/b> ?o ; <http://x/a> ?v }")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json, serde_json::json!([["<http://x/a>", "<http://x/b>"]]));
}

#[test]
fn missing_query_and_bad_config_fail() {
    let (_dir, config) = config_dir("");
    cargo_bin_cmd!("sparql-analyze")
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .assert()
        .failure();

    let (_bad_dir, bad) = config_dir("disabled_analyzers = [\"NoSuchAnalyzer\"]\n");
    let output = cargo_bin_cmd!("sparql-analyze")
        .arg("--config")
        .arg(&bad)
        .args(["analyze", "ASK {}"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8 stderr");
    assert!(stderr.contains("unknown analyzer 'NoSuchAnalyzer'"), "{stderr}");
}
