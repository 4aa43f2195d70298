//! SIGHUP translation: terminate children, then a deferred wakeup.
//!
//! This lives in its own test binary: raising SIGHUP is process-wide, and
//! no other monitor instance may be armed in the same process while it
//! fires.
#![cfg(unix)]

use std::time::Duration;

use nix::sys::signal::{raise, Signal};
use procvisor::{Config, Event, EventKind, Monitor, ProcessSpec, RespawnPolicy};
use tokio::sync::broadcast;
use tokio::time;

async fn wait_for_kind(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
    within: Duration,
) -> Event {
    let deadline = time::Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        let ev = time::timeout(remaining, rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
            .expect("bus closed");
        if ev.kind == kind {
            return ev;
        }
    }
}

#[tokio::test]
async fn sighup_terminates_children_and_schedules_wakeup() {
    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(10);
    cfg.kill_escalation = Duration::from_secs(2);
    cfg.signal_arm_delay = Duration::from_millis(50);
    cfg.term_grace = Duration::from_millis(200);

    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    // One long-running child, non-respawning so the run drains after the
    // SIGTERM delivered by the translator.
    let spec = ProcessSpec::with_defaults("/bin/sh", &cfg)
        .with_name("hup-target")
        .with_args(["-c", "sleep 30"])
        .with_respawn(RespawnPolicy::Never);

    let runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run(vec![spec]).await })
    };

    wait_for_kind(&mut rx, EventKind::ProcStarted, Duration::from_secs(10)).await;

    // Wait out the arming delay, then deliver SIGHUP to ourselves.
    time::sleep(Duration::from_millis(150)).await;
    raise(Signal::SIGHUP).unwrap();

    // Termination is requested before the deferred wakeup fires.
    let term = wait_for_kind(&mut rx, EventKind::TermRequested, Duration::from_secs(10)).await;
    assert_eq!(term.reason.as_deref(), Some("children=1"));
    let wakeup =
        wait_for_kind(&mut rx, EventKind::WakeupRequested, Duration::from_secs(10)).await;
    assert!(term.seq < wakeup.seq);

    // SIGTERM killed the shell; Never-respawn makes that terminal, and the
    // wakeup reconciliation drains the run.
    time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("run did not drain after SIGHUP")
        .expect("runner panicked")
        .expect("run failed");
}
