//! Runs the binary in a subprocess for the flags that exit before joining the network.

use std::process::Command;

#[test]
fn test_help_exits_successfully() {
    let out = Command::new(env!("CARGO_BIN_EXE_meetpoint"))
        .arg("-h")
        .output()
        .expect("failed to run meetpoint");

    let stdout = String::from_utf8_lossy(&out.stdout);

    assert!(out.status.success(), "-h should exit with 0; stdout:\n{stdout}");
    assert!(
        stdout.contains("-r, --rendezvous <STRING>"),
        "usage should document -r; stdout:\n{stdout}"
    );
    assert!(
        stdout.contains("-l, --listen"),
        "usage should document -l; stdout:\n{stdout}"
    );
    assert!(
        stdout.contains("$ meetpoint -l"),
        "usage should include examples; stdout:\n{stdout}"
    );
}

#[test]
fn test_missing_config_file_fails() {
    let out = Command::new(env!("CARGO_BIN_EXE_meetpoint"))
        .args(["--config", "/nonexistent/meetpoint.toml"])
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run meetpoint");

    let stderr = String::from_utf8_lossy(&out.stderr);

    assert!(!out.status.success(), "a missing config should be fatal");
    assert!(
        stderr.contains("failed to read configuration"),
        "stderr should explain the failure; stderr:\n{stderr}"
    );
}
