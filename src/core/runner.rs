//! # Run a single launch attempt of a managed child.
//!
//! Spawns the OS process described by a [`ProcessSpec`], publishes lifecycle
//! events to the [`Bus`], and waits for exit or cancellation.
//!
//! - **Execute ONE attempt**: spawn, confirm pid, wait.
//! - **Redirect output**: child stdout/stderr are appended verbatim to the
//!   spec's log sink (or discarded); the runner never interprets content.
//! - **Drop privilege**: `run_as` uid/gid are applied at spawn; the runner
//!   never escalates beyond what the spec configures.
//! - **Graceful cancellation**: SIGTERM first, SIGKILL only after the
//!   configured escalation timeout.
//!
//! ## Event flow
//! ```text
//! Spawn ok:
//!   spawn() → publish ProcStarted{pid} → wait()
//!       ├─ exit 0        → publish ProcStopped           → Ok(())
//!       ├─ exit code ≠ 0 → publish ProcFailed{exit_code} → Err(Exited)
//!       └─ signal death  → publish ProcFailed            → Err(Signaled)
//!
//! Spawn refused:
//!   spawn() → Err → publish ProcFailed → Err(Launch)
//!
//! Cancellation:
//!   token fires → SIGTERM → wait (≤ escalation) → [SIGKILL] → wait
//!              → publish ProcStopped (graceful exit) → Err(Canceled)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event per attempt:
//!   `ProcStopped` or `ProcFailed`.
//! - `Canceled` is a graceful exit → `ProcStopped` (not `ProcFailed`).
//! - `ProcStarted` carries the pid and is published only once the OS
//!   confirms the spawn; the tracker clears the pid again on the terminal
//!   event, before any respawn decision.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::ProcError;
use crate::events::{Bus, Event, EventKind};
use crate::procs::ProcessSpec;

/// Executes a single launch attempt of `spec`, publishing lifecycle events.
///
/// `kill_escalation` bounds how long a cancelled child may ignore SIGTERM
/// before SIGKILL; `None` waits indefinitely.
pub async fn run_once(
    spec: &ProcessSpec,
    parent: &CancellationToken,
    attempt: u32,
    kill_escalation: Option<Duration>,
    bus: &Bus,
) -> Result<(), ProcError> {
    let mut child = match spawn_child(spec) {
        Ok(child) => child,
        Err(e) => {
            publish_failed(bus, spec.name(), attempt, None, &e);
            return Err(e);
        }
    };

    if let Some(pid) = child.id() {
        bus.publish(
            Event::now(EventKind::ProcStarted)
                .with_proc(spec.name())
                .with_pid(pid)
                .with_attempt(attempt),
        );
    }

    tokio::select! {
        status = child.wait() => match status {
            Ok(st) if st.success() => {
                publish_stopped(bus, spec.name(), attempt);
                Ok(())
            }
            Ok(st) => {
                let err = exit_error(st);
                let code = match &err {
                    ProcError::Exited { code } => Some(*code),
                    _ => None,
                };
                publish_failed(bus, spec.name(), attempt, code, &err);
                Err(err)
            }
            Err(e) => {
                let err = ProcError::Launch { error: e.to_string() };
                publish_failed(bus, spec.name(), attempt, None, &err);
                Err(err)
            }
        },
        _ = parent.cancelled() => {
            graceful_stop(&mut child, kill_escalation).await;
            publish_stopped(bus, spec.name(), attempt);
            Err(ProcError::Canceled)
        }
    }
}

/// Builds and spawns the OS process for `spec`.
fn spawn_child(spec: &ProcessSpec) -> Result<Child, ProcError> {
    let (stdout, stderr) = open_log_sinks(spec).map_err(|e| ProcError::Launch {
        error: format!("log sink: {e}"),
    })?;

    let mut cmd = Command::new(spec.executable());
    cmd.args(spec.args())
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);

    #[cfg(unix)]
    if let Some(run_as) = spec.run_as() {
        cmd.uid(run_as.uid).gid(run_as.gid);
    }

    cmd.spawn().map_err(|e| ProcError::Launch {
        error: e.to_string(),
    })
}

/// Opens the spec's log sink in append mode for both output streams, or
/// discards output when no sink is configured.
fn open_log_sinks(spec: &ProcessSpec) -> std::io::Result<(Stdio, Stdio)> {
    match spec.log_path() {
        Some(path) => {
            let out = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let err = out.try_clone()?;
            Ok((Stdio::from(out), Stdio::from(err)))
        }
        None => Ok((Stdio::null(), Stdio::null())),
    }
}

/// Maps a non-success exit status to the matching error.
fn exit_error(status: std::process::ExitStatus) -> ProcError {
    if let Some(code) = status.code() {
        return ProcError::Exited { code };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ProcError::Signaled { signal };
        }
    }

    ProcError::Exited { code: -1 }
}

/// Asks the child to terminate gracefully; escalates to SIGKILL after the
/// timeout when configured.
async fn graceful_stop(child: &mut Child, escalation: Option<Duration>) {
    request_term(child);

    match escalation {
        Some(timeout) => {
            if time::timeout(timeout, child.wait()).await.is_err() {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        None => {
            let _ = child.wait().await;
        }
    }
}

/// Delivers SIGTERM to the child, fire-and-forget.
#[cfg(unix)]
fn request_term(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn request_term(child: &mut Child) {
    let _ = child.start_kill();
}

/// Publishes `ProcStopped` (success or graceful cancellation).
fn publish_stopped(bus: &Bus, name: &str, attempt: u32) {
    bus.publish(
        Event::now(EventKind::ProcStopped)
            .with_proc(name)
            .with_attempt(attempt),
    );
}

/// Publishes `ProcFailed` with error details.
fn publish_failed(bus: &Bus, name: &str, attempt: u32, code: Option<i32>, err: &ProcError) {
    let mut ev = Event::now(EventKind::ProcFailed)
        .with_proc(name)
        .with_attempt(attempt)
        .with_reason(err.to_string());
    if let Some(code) = code {
        ev = ev.with_exit_code(code);
    }
    bus.publish(ev);
}
