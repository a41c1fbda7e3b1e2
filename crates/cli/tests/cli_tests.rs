//! CLI integration tests

use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "risk-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Accident Risk Predictor"), "Should show app name");
    for command in ["predict", "models", "stats", "performance", "history", "features"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("arisk"), "Should show binary name");
}

#[test]
fn test_predict_help_lists_every_input() {
    let output = run(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for flag in [
        "--road-type",
        "--num-lanes",
        "--curvature",
        "--speed-limit",
        "--lighting",
        "--weather",
        "--road-signs-present",
        "--public-road",
        "--time-of-day",
        "--holiday",
        "--school-season",
        "--num-reported-accidents",
    ] {
        assert!(stdout.contains(flag), "Should show {}", flag);
    }
}

#[test]
fn test_predict_rejects_out_of_range_input() {
    for args in [
        ["predict", "--num-lanes", "9"],
        ["predict", "--curvature", "0.35"],
        ["predict", "--weather", "snowy"],
    ] {
        let output = run(&args);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(!output.status.success(), "{:?} should be rejected", args);
        assert!(
            stderr.contains("invalid value"),
            "{:?} should fail argument validation, got: {}",
            args,
            stderr
        );
    }
}

#[test]
fn test_models_load_requires_filename() {
    let output = run(&["models", "load"]);
    assert!(!output.status.success());
}
