use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn write_config(path: &std::path::Path) {
    fs::write(
        path,
        r#"
periodics:
  - name: nightly
    cluster: build
    tenant_id: platform
allowed_clusters: ["build"]
job_url_prefix: "https://ci.example.com/view/"
"#,
    )
    .expect("write config");
}

#[test]
fn validate_reports_the_loaded_counts() {
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("gateway.yaml");
    write_config(&config_path);

    Command::cargo_bin("gateway-cli")
        .expect("binary")
        .arg("--config")
        .arg(&config_path)
        .arg("validate")
        .assert()
        .success()
        .stdout(contains("periodics: 1"));
}

#[test]
fn resolve_prints_the_matched_job_spec() {
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("gateway.yaml");
    write_config(&config_path);

    Command::cargo_bin("gateway-cli")
        .expect("binary")
        .arg("--config")
        .arg(&config_path)
        .arg("resolve")
        .arg("nightly")
        .assert()
        .success()
        .stdout(contains("\"job_name\": \"nightly\""));
}

#[test]
fn resolve_fails_for_an_unknown_job_name() {
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("gateway.yaml");
    write_config(&config_path);

    Command::cargo_bin("gateway-cli")
        .expect("binary")
        .arg("--config")
        .arg(&config_path)
        .arg("resolve")
        .arg("does-not-exist")
        .assert()
        .failure();
}

#[test]
fn missing_config_file_fails_before_any_subcommand_runs() {
    Command::cargo_bin("gateway-cli")
        .expect("binary")
        .arg("--config")
        .arg("/nonexistent/gateway.yaml")
        .arg("validate")
        .assert()
        .failure();
}
