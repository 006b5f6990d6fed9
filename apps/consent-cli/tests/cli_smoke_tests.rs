#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the consent-cli binary.

use std::process::{Command, Stdio};

use tempfile::TempDir;

fn run_consent_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_consent-cli"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute consent-cli")
}

const CONFIG: &str = r#"
account_id: 22
property_id: 16893
property_name: mobile.multicampaign.demo
campaigns:
  - kind: GDPR
    privacy_manager_id: "488393"
"#;

#[test]
fn help_lists_subcommands() {
    let output = run_consent_cli(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    for command in ["load", "accept-all", "reject-all", "show", "clear", "check"] {
        assert!(stdout.contains(command), "missing `{command}` in help");
    }
}

#[test]
fn check_prints_effective_configuration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("consent.yaml");
    std::fs::write(&path, CONFIG).unwrap();

    let output = run_consent_cli(&["--config", path.to_str().unwrap(), "check"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration is valid"));
    assert!(stdout.contains("\"property_id\": 16893"));
}

#[test]
fn missing_config_file_fails() {
    let output = run_consent_cli(&["--config", "/nonexistent/consent.yaml", "check"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config file does not exist"));
}

#[test]
fn invalid_configuration_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("consent.yaml");
    std::fs::write(&path, "account_id: 22\nproperty_id: 1\nproperty_name: demo\n").unwrap();

    let output = run_consent_cli(&["--config", path.to_str().unwrap(), "check"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least one"));
}
