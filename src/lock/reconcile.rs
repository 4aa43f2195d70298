//! # Orphan reconciler: startup-time cleanup of stale lock markers.
//!
//! [`reconcile`] scans the lock directory for marker files matching a
//! glob-style pattern scoped to an identity, probes the recorded pid of
//! each, and deletes markers whose owner is no longer alive. Markers owned
//! by a live process are left untouched — another instance is genuinely
//! running, and the subsequent `claim` will catch that race too.
//!
//! ## Rules
//! - Runs once, at startup, strictly **before** `LockRegistry::claim`.
//! - Idempotent: re-running on an empty or clean directory removes nothing.
//! - A marker that cannot be read or removed is reported in the outcome
//!   (the caller's logger turns these into warnings) and left in place;
//!   `claim` then conservatively treats it as live.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::registry::read_marker_pid;
use super::pid_alive;

/// Result of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Stale markers removed.
    pub removed: usize,
    /// Markers left in place because their owner is alive.
    pub kept_live: usize,
    /// Markers that could not be read or removed, with the failure.
    ///
    /// These are warnings, not fatal: a later `claim` on the same identity
    /// may still fail with `AlreadyRunning`.
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl ReconcileOutcome {
    /// True when nothing went wrong during the pass.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Removes stale lock markers under `dir`.
///
/// A file participates when its name matches `pattern` (glob-style, `*`
/// wildcards, e.g. `"*.pid"`) **and** starts with `identity` — the same
/// scoping the deterministic marker naming uses at claim time.
///
/// Returns the outcome; only listing the directory itself is a hard error.
/// An absent directory counts as empty.
pub fn reconcile(
    dir: impl AsRef<Path>,
    pattern: &str,
    identity: &str,
) -> io::Result<ReconcileOutcome> {
    let dir = dir.as_ref();
    let mut outcome = ReconcileOutcome::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(outcome),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(identity) || !glob_match(pattern, name) {
            continue;
        }

        match read_marker_pid(&path) {
            Ok(Some(pid)) if pid_alive(pid) => {
                outcome.kept_live += 1;
            }
            Ok(Some(_)) => {
                // Dead owner; removal is safe.
                match fs::remove_file(&path) {
                    Ok(()) => outcome.removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => outcome.failures.push((path, e)),
                }
            }
            // Vanished mid-scan.
            Ok(None) => {}
            // Unreadable or unparseable; `claim` treats the same marker as
            // live, so deleting it here would defeat that check.
            Err(e) => outcome.failures.push((path, e)),
        }
    }

    Ok(outcome)
}

/// Glob-style match supporting `*` wildcards only.
///
/// Iterative two-pointer matcher with backtracking to the last star; the
/// patterns used here are short (`"*.pid"`), so no compilation step.
fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((spi, sni)) = star {
            pi = spi + 1;
            ni = sni + 1;
            star = Some((spi, sni + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn glob_matching() {
        assert!(glob_match("*.pid", "svc-a.pid"));
        assert!(glob_match("*.pid", ".pid"));
        assert!(glob_match("svc-*", "svc-a.pid"));
        assert!(glob_match("*", "anything"));
        assert!(!glob_match("*.pid", "svc-a.lock"));
        assert!(!glob_match("*.pid", "svc-a.pidx"));
        assert!(!glob_match("a*b*c", "axbyd"));
        assert!(glob_match("a*b*c", "axxbyyc"));
    }

    #[test]
    fn empty_directory_is_a_noop() {
        let dir = tempdir().unwrap();
        let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.kept_live, 0);
        assert!(outcome.is_clean());
    }

    #[test]
    fn missing_directory_counts_as_empty() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("never-created");
        let outcome = reconcile(&gone, "*.pid", "svc-a").unwrap();
        assert_eq!(outcome.removed, 0);
    }

    #[cfg(unix)]
    #[test]
    fn stale_markers_are_removed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("svc-a.pid"), "999999999\n").unwrap();
        fs::write(dir.path().join("svc-a-1.pid"), "999999998\n").unwrap();

        let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
        assert_eq!(outcome.removed, 2);
        assert!(!dir.path().join("svc-a.pid").exists());
        assert!(!dir.path().join("svc-a-1.pid").exists());
    }

    #[test]
    fn garbage_markers_are_kept_and_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svc-a.pid");
        fs::write(&path, "not-a-pid\n").unwrap();

        let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.failures.len(), 1);
        assert!(!outcome.is_clean());
        // The marker survives: claim must still see it and refuse.
        assert!(path.exists());
    }

    #[test]
    fn live_markers_are_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svc-a.pid");
        fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.kept_live, 1);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn out_of_scope_files_are_untouched() {
        let dir = tempdir().unwrap();
        // Different identity prefix, and a non-matching extension.
        fs::write(dir.path().join("other.pid"), "999999999\n").unwrap();
        fs::write(dir.path().join("svc-a.lock"), "999999999\n").unwrap();

        let outcome = reconcile(dir.path(), "*.pid", "svc-a").unwrap();
        assert_eq!(outcome.removed, 0);
        assert!(dir.path().join("other.pid").exists());
        assert!(dir.path().join("svc-a.lock").exists());
    }
}
