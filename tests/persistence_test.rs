#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("atm_db");

    // 1. First run: settle a 300.00 withdrawal against John Doe.
    let mut script1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(script1, "op, account, handle, amount, outcome, reason").unwrap();
    writeln!(script1, "withdraw, 1, 1, 300.00, ,").unwrap();
    writeln!(script1, "complete, , 1, , success,").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("cashpoint"));
    cmd1.arg(script1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,************0366,John Doe,4700.00,4700.00,1000.00,700.00"));

    // 2. Second run on the same DB: the 4700.00 balance and today's
    // consumed limit must have been recovered, not re-seeded.
    let mut script2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(script2, "op, account, handle, amount, outcome, reason").unwrap();
    writeln!(script2, "deposit, 1, 1, 500.00, ,").unwrap();
    writeln!(script2, "complete, , 1, , success,").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("cashpoint"));
    cmd2.arg(script2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("1,************0366,John Doe,5200.00,5200.00,1000.00,700.00"));
}
