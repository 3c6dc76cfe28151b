//! Duplicate launches of the monitor binary must fail in the caller's process.

use std::process::Command;

use cec_adbd::guard::{default_lock_path, InstanceGuard};

// ============================================================================
// Test Helpers
// ============================================================================

fn monitor(key_dir: &tempfile::TempDir, extra: &[&str]) -> Command {
    let key_path = key_dir.path().join("adbkey");
    std::fs::write(&key_path, "private").unwrap();
    std::fs::write(key_dir.path().join("adbkey.pub"), "public").unwrap();

    let mut command = Command::new(env!("CARGO_BIN_EXE_hdmi-cec-monitor"));
    command
        .arg("--tv-ip-address")
        .arg("127.0.0.1")
        .arg("--adb-key-filepath")
        .arg(&key_path)
        .arg("--cec-client")
        .arg("/bin/true")
        .args(extra);
    command
}

// ============================================================================
// Duplicate Instance Tests
// ============================================================================

// One test holds the fixed lock path for the whole binary; parallel tests
// would contend for it.
#[test]
fn test_duplicate_launch_exits_non_zero() {
    let _held = InstanceGuard::acquire(default_lock_path(), "no-such-monitor-name").unwrap();
    let keys = tempfile::tempdir().unwrap();

    let foreground = monitor(&keys, &[]).output().unwrap();
    assert_eq!(foreground.status.code(), Some(1));

    // The daemonizing parent must not exit 0 before the lock is checked
    let daemon = monitor(&keys, &["-d"]).output().unwrap();
    assert_eq!(daemon.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&daemon.stderr);
    assert!(stderr.contains("already running"), "{stderr}");
}
