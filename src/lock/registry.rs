//! # Lock registry: single-instance enforcement via pid markers.
//!
//! [`LockRegistry::claim`] creates a marker file `<identity>.pid` with
//! `O_EXCL` semantics and writes the current pid into it, so concurrent
//! claims for one identity admit exactly one winner. A present marker with
//! a live owning pid fails the claim with `AlreadyRunning`; a marker whose
//! pid is dead is stale and removed before claiming (the orphan reconciler
//! also does this proactively, so claim mostly finds a clean directory).
//!
//! ## Release guarantees
//! [`LockRecord`] is a scoped resource: dropping it releases the marker,
//! so every exit path of the supervisor — normal return, fatal startup
//! error after claim, signal-triggered shutdown — removes the file.
//! Best-effort only: a hard kill of the supervisor itself leaves the marker
//! behind for the next instance's reconciler.
//!
//! ## Rules
//! - At most one live record per identity at any time.
//! - `release()` is unconditional and idempotent.
//! - An unreadable marker is conservatively treated as live.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::RuntimeError;

use super::pid_alive;

/// Claims and releases singleton lock markers inside one directory.
pub struct LockRegistry;

impl LockRegistry {
    /// Claims the singleton lock for `identity` inside `dir`.
    ///
    /// Creates `dir` if missing, then creates the marker with `O_EXCL`
    /// semantics: when several instances race for the same identity,
    /// exactly one creation succeeds. A marker whose recorded pid is dead
    /// is removed and the creation retried.
    ///
    /// ### Errors
    /// - [`RuntimeError::AlreadyRunning`] when a live marker exists, when
    ///   an existing marker cannot be read (conservative), or when the
    ///   retry budget is exhausted under contention.
    /// - [`RuntimeError::LockUnavailable`] when the directory cannot be
    ///   created or the marker cannot be written.
    pub fn claim(dir: impl AsRef<Path>, identity: &str) -> Result<LockRecord, RuntimeError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| RuntimeError::LockUnavailable {
            identity: identity.to_string(),
            source,
        })?;

        let path = dir.join(format!("{identity}.pid"));
        let pid = std::process::id();

        // `create_new` is the mutual-exclusion point: the filesystem
        // admits exactly one creator per path. The loop only re-runs after
        // removing a stale marker.
        for _ in 0..4 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    if let Err(source) = file.write_all(format!("{pid}\n").as_bytes()) {
                        drop(file);
                        let _ = fs::remove_file(&path);
                        return Err(RuntimeError::LockUnavailable {
                            identity: identity.to_string(),
                            source,
                        });
                    }
                    return Ok(LockRecord {
                        path,
                        identity: identity.to_string(),
                        pid,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => match read_marker(&path) {
                    MarkerState::Live(owner) => {
                        return Err(RuntimeError::AlreadyRunning {
                            identity: identity.to_string(),
                            pid: Some(owner),
                        });
                    }
                    MarkerState::Unreadable => {
                        // Also covers a racing winner that created the file
                        // but has not written its pid yet.
                        return Err(RuntimeError::AlreadyRunning {
                            identity: identity.to_string(),
                            pid: None,
                        });
                    }
                    MarkerState::Stale => {
                        if let Err(source) = fs::remove_file(&path) {
                            if source.kind() != ErrorKind::NotFound {
                                return Err(RuntimeError::LockUnavailable {
                                    identity: identity.to_string(),
                                    source,
                                });
                            }
                        }
                    }
                    // Vanished between the open and the read; retry.
                    MarkerState::Absent => {}
                },
                Err(source) => {
                    return Err(RuntimeError::LockUnavailable {
                        identity: identity.to_string(),
                        source,
                    });
                }
            }
        }

        // Markers kept appearing and going stale across every retry; fail
        // conservatively rather than spin.
        Err(RuntimeError::AlreadyRunning {
            identity: identity.to_string(),
            pid: None,
        })
    }
}

/// Proof that this supervisor instance owns `identity` in its lock directory.
///
/// Dropping the record releases the marker (best-effort), so holding it for
/// the duration of `Monitor::run` guarantees cleanup on every exit path.
#[derive(Debug)]
pub struct LockRecord {
    path: PathBuf,
    identity: String,
    pid: u32,
    released: bool,
}

impl LockRecord {
    /// Marker file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity this record is scoped to.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Pid recorded in the marker (the current process).
    pub fn owning_pid(&self) -> u32 {
        self.pid
    }

    /// Removes the marker unconditionally. Idempotent: repeated calls and
    /// an already-missing file are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = fs::remove_file(&self.path);
    }
}

impl Drop for LockRecord {
    fn drop(&mut self) {
        self.release();
    }
}

enum MarkerState {
    Absent,
    Live(u32),
    Stale,
    Unreadable,
}

fn read_marker(path: &Path) -> MarkerState {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return MarkerState::Absent,
        Err(_) => return MarkerState::Unreadable,
    };

    match parse_pid(&content) {
        Some(pid) if pid_alive(pid) => MarkerState::Live(pid),
        Some(_) => MarkerState::Stale,
        None => MarkerState::Unreadable,
    }
}

/// Parses the plain-text pid recorded in a marker file.
pub(crate) fn parse_pid(content: &str) -> Option<u32> {
    content.trim().parse::<u32>().ok()
}

/// Reads and parses a marker file, distinguishing absence from corruption.
///
/// - `Ok(Some(pid))`: the marker records a pid.
/// - `Ok(None)`: the file does not exist.
/// - `Err(InvalidData)`: the file exists but its content is not a pid;
///   callers must not treat this as removable — `claim` considers such a
///   marker live.
pub(crate) fn read_marker_pid(path: &Path) -> io::Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(content) => match parse_pid(&content) {
            Some(pid) => Ok(Some(pid)),
            None => Err(io::Error::new(
                ErrorKind::InvalidData,
                "marker content is not a pid",
            )),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn claim_on_empty_directory_succeeds() {
        let dir = tempdir().unwrap();
        let record = LockRegistry::claim(dir.path(), "svc-a").unwrap();

        let written = fs::read_to_string(record.path()).unwrap();
        assert_eq!(parse_pid(&written), Some(std::process::id()));
        assert_eq!(record.identity(), "svc-a");
        assert_eq!(record.owning_pid(), std::process::id());
    }

    #[test]
    fn claim_fails_when_owner_is_alive() {
        let dir = tempdir().unwrap();
        // Our own pid is definitely alive.
        let path = dir.path().join("svc-a.pid");
        fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        match LockRegistry::claim(dir.path(), "svc-a") {
            Err(RuntimeError::AlreadyRunning { identity, pid }) => {
                assert_eq!(identity, "svc-a");
                assert_eq!(pid, Some(std::process::id()));
            }
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
        // The live marker is untouched.
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn claim_reclaims_stale_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svc-a.pid");
        // Pid from far beyond any default pid_max rollover in tests.
        fs::write(&path, "999999999\n").unwrap();

        let record = LockRegistry::claim(dir.path(), "svc-a").unwrap();
        let written = fs::read_to_string(record.path()).unwrap();
        assert_eq!(parse_pid(&written), Some(std::process::id()));
    }

    #[test]
    fn claim_treats_garbage_marker_as_live() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("svc-a.pid"), "not-a-pid\n").unwrap();

        match LockRegistry::claim(dir.path(), "svc-a") {
            Err(RuntimeError::AlreadyRunning { pid, .. }) => assert_eq!(pid, None),
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
    }

    #[test]
    fn release_is_idempotent_and_runs_on_drop() {
        let dir = tempdir().unwrap();
        let mut record = LockRegistry::claim(dir.path(), "svc-a").unwrap();
        let path = record.path().to_path_buf();
        assert!(path.exists());

        record.release();
        assert!(!path.exists());
        record.release(); // no-op
        drop(record); // no-op

        // A second instance can claim after release.
        let record = LockRegistry::claim(dir.path(), "svc-a").unwrap();
        drop(record);
        assert!(!dir.path().join("svc-a.pid").exists());
    }

    #[test]
    fn distinct_identities_do_not_conflict() {
        let dir = tempdir().unwrap();
        let _a = LockRegistry::claim(dir.path(), "svc-a").unwrap();
        let _b = LockRegistry::claim(dir.path(), "svc-b").unwrap();
    }
}
