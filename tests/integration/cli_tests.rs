//! Integration tests for the CLI binary.
//!
//! Verifies that the `jit` binary responds to basic flags and can drive a
//! request/list/scan/revoke cycle against a temporary rule store.
//!
//! This test is registered as a [[test]] in the jit-access-cli crate
//! so that CARGO_BIN_EXE_jit is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `jit` binary.
fn jit_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jit"));
    for key in [
        "JIT_SUBSCRIPTION_ID",
        "JIT_RESOURCE_GROUP",
        "JIT_SERVER_NAME",
        "JIT_GRANT_TTL_SECS",
        "JIT_STORE_DIR",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Run `jit` against a store rooted at `dir`.
fn jit_in(dir: &Path, args: &[&str]) -> Output {
    jit_binary()
        .env("JIT_SUBSCRIPTION_ID", "sub-0001")
        .env("JIT_RESOURCE_GROUP", "rg-data")
        .env("JIT_SERVER_NAME", "sql-prod")
        .arg("--store-dir")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to execute jit")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = jit_binary()
        .arg("--help")
        .output()
        .expect("failed to execute jit --help");

    assert!(
        output.status.success(),
        "jit --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let text = stdout(&output);
    assert!(
        text.contains("jit") || text.contains("Usage"),
        "jit --help output should contain usage information, got: {text}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = jit_binary()
        .arg("--version")
        .output()
        .expect("failed to execute jit --version");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(
        text.contains("0.3") || text.contains("jit"),
        "jit --version should contain version info, got: {text}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = jit_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute jit");

    assert!(
        !output.status.success(),
        "jit with unknown flag should exit with error"
    );
}

#[test]
fn cli_fails_without_target() {
    let dir = tempfile::tempdir().unwrap();
    let output = jit_binary()
        .arg("--store-dir")
        .arg(dir.path())
        .arg("list")
        .output()
        .expect("failed to execute jit");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("JIT_SUBSCRIPTION_ID"),
        "error should name the missing setting, got: {stderr}"
    );
}

#[test]
fn cli_request_list_scan_revoke() {
    let dir = tempfile::tempdir().unwrap();

    // ── Step 1: Request a grant ─────────────────────────────────────────
    let output = jit_in(dir.path(), &["--json", "request", "--ip", "203.0.113.5", "--ttl", "30m"]);
    assert!(
        output.status.success(),
        "request failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let grant: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(grant["status"], "Granted");
    assert_eq!(grant["subject"], "203.0.113.5");
    let rule = grant["rule"].as_str().unwrap().to_string();
    assert!(rule.starts_with("JIT_"));

    // ── Step 2: List shows it as active ─────────────────────────────────
    let output = jit_in(dir.path(), &["list"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(&rule));
    assert!(text.contains("active until"));

    // ── Step 3: Scan leaves the active grant alone ──────────────────────
    let output = jit_in(dir.path(), &["--json", "scan"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["active_remaining"], 1);
    assert_eq!(report["expired_deleted"], 0);

    // ── Step 4: Revoke it early ─────────────────────────────────────────
    let output = jit_in(dir.path(), &["revoke", "--rule", &rule]);
    assert!(
        output.status.success(),
        "revoke failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = jit_in(dir.path(), &["list"]);
    assert!(stdout(&output).contains("(none)"));
}

#[test]
fn cli_refuses_to_revoke_foreign_rule() {
    let dir = tempfile::tempdir().unwrap();
    let output = jit_in(dir.path(), &["revoke", "--rule", "manual-allow-office"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a JIT-managed rule"));
}

#[test]
fn cli_rejects_bad_subject_and_ttl() {
    let dir = tempfile::tempdir().unwrap();

    let output = jit_in(dir.path(), &["request", "--ip", "not-an-address"]);
    assert!(!output.status.success());

    let output = jit_in(dir.path(), &["request", "--ip", "203.0.113.5", "--ttl", "10x"]);
    assert!(!output.status.success());
}

#[test]
fn cli_rejects_oversized_ttl_without_panicking() {
    let dir = tempfile::tempdir().unwrap();

    for ttl in ["99999999999999999", "9999999999999999d", "200000d"] {
        let output = jit_in(dir.path(), &["request", "--ip", "203.0.113.5", "--ttl", ttl]);
        assert_eq!(
            output.status.code(),
            Some(1),
            "--ttl {ttl} should fail cleanly, stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("too large") || stderr.contains("must not exceed"),
            "--ttl {ttl}: unexpected error {stderr}"
        );
    }
}
