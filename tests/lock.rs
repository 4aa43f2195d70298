//! End-to-end lock directory scenarios: reconciliation followed by claim.

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use procvisor::{reconcile, LockRegistry, RuntimeError};
use tempfile::tempdir;

#[test]
fn clean_directory_reconcile_then_claim() {
    let dir = tempdir().unwrap();

    let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
    assert_eq!(outcome.removed, 0);
    assert!(outcome.is_clean());

    let record = LockRegistry::claim(dir.path(), "svc-a").unwrap();
    let content = fs::read_to_string(record.path()).unwrap();
    assert_eq!(content.trim(), std::process::id().to_string());
}

#[cfg(unix)]
#[test]
fn stale_marker_reconciled_then_claim_succeeds() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("svc-a.pid"), "999999999\n").unwrap();

    let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
    assert_eq!(outcome.removed, 1);

    let record = LockRegistry::claim(dir.path(), "svc-a").unwrap();
    assert_eq!(record.owning_pid(), std::process::id());
}

#[test]
fn live_marker_defeats_claim() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("svc-a.pid"),
        format!("{}\n", std::process::id()),
    )
    .unwrap();

    // Reconciliation must not touch a live owner's marker.
    let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.kept_live, 1);

    match LockRegistry::claim(dir.path(), "svc-a") {
        Err(RuntimeError::AlreadyRunning { identity, pid }) => {
            assert_eq!(identity, "svc-a");
            assert_eq!(pid, Some(std::process::id()));
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
}

#[test]
fn garbage_marker_survives_reconcile_and_defeats_claim() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("svc-a.pid");
    fs::write(&path, "not-a-pid\n").unwrap();

    // Reconciliation must not delete a marker it cannot attribute to a
    // dead owner; it reports the file and leaves it for claim to refuse.
    let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
    assert_eq!(outcome.removed, 0);
    assert!(!outcome.is_clean());
    assert!(path.exists());

    match LockRegistry::claim(dir.path(), "svc-a") {
        Err(RuntimeError::AlreadyRunning { pid, .. }) => assert_eq!(pid, None),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
    assert!(path.exists());
}

#[test]
fn sequential_claims_are_exclusive_until_release() {
    let dir = tempdir().unwrap();

    let mut first = LockRegistry::claim(dir.path(), "svc-a").unwrap();

    // Second claim while the first instance (us) is alive must fail.
    assert!(matches!(
        LockRegistry::claim(dir.path(), "svc-a"),
        Err(RuntimeError::AlreadyRunning { .. })
    ));

    first.release();
    let _second = LockRegistry::claim(dir.path(), "svc-a").unwrap();
}

#[test]
fn concurrent_claims_admit_exactly_one_winner() {
    let dir = tempdir().unwrap();
    let path = Arc::new(dir.path().to_path_buf());
    let barrier = Arc::new(Barrier::new(8));

    let claimers: Vec<_> = (0..8)
        .map(|_| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                LockRegistry::claim(path.as_path(), "svc-a")
            })
        })
        .collect();

    let results: Vec<_> = claimers
        .into_iter()
        .map(|t| t.join().expect("claimer panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one concurrent claim may succeed");
    for r in &results {
        if let Err(e) = r {
            assert!(matches!(e, RuntimeError::AlreadyRunning { .. }));
        }
    }
    assert!(path.join("svc-a.pid").exists());
}

#[test]
fn reconcile_and_release_are_idempotent() {
    let dir = tempdir().unwrap();

    // Reconcile on an empty directory, twice: no-op, never fails.
    assert_eq!(reconcile(dir.path(), "*.pid", "svc-a").unwrap().removed, 0);
    assert_eq!(reconcile(dir.path(), "*.pid", "svc-a").unwrap().removed, 0);

    let mut record = LockRegistry::claim(dir.path(), "svc-a").unwrap();
    record.release();
    record.release();
    drop(record);
    assert!(!dir.path().join("svc-a.pid").exists());
}
