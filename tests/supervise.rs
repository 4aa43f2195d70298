//! Supervision engine scenarios with real `/bin/sh` children.
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use procvisor::{
    BackoffPolicy, Config, Event, EventKind, JitterPolicy, Monitor, ProcessSpec, RespawnPolicy,
    Subscribe,
};
use tokio::sync::broadcast;
use tokio::time;

fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(10);
    cfg.kill_escalation = Duration::from_secs(2);
    cfg.backoff = BackoffPolicy {
        first: Duration::from_millis(10),
        max: Duration::from_millis(50),
        factor: 1.0,
        jitter: JitterPolicy::None,
    };
    cfg
}

fn shell(cfg: &Config, name: &str, script: &str) -> ProcessSpec {
    ProcessSpec::with_defaults("/bin/sh", cfg)
        .with_name(name)
        .with_args(["-c", script])
}

/// Receives events until one of `kind` arrives, within `within`.
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

/// Drains every event still buffered in the receiver.
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

#[tokio::test]
async fn one_shot_child_runs_once_and_drains() {
    let cfg = fast_config();
    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    let spec = shell(&cfg, "oneshot", "exit 0").with_respawn(RespawnPolicy::Never);

    time::timeout(Duration::from_secs(10), monitor.run(vec![spec]))
        .await
        .expect("run did not drain")
        .expect("run failed");

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventKind::ProcStarting), 1);
    assert_eq!(count(&events, EventKind::ProcStopped), 1);
    assert_eq!(count(&events, EventKind::ActorExhausted), 1);
    assert_eq!(count(&events, EventKind::ProcRemoved), 1);
    // A started event carried the pid while the child was alive.
    assert!(events
        .iter()
        .any(|e| e.kind == EventKind::ProcStarted && e.pid.is_some()));
}

#[tokio::test]
async fn failed_one_shot_is_terminal_with_exit_code() {
    let cfg = fast_config();
    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    let spec = shell(&cfg, "failing-oneshot", "exit 3").with_respawn(RespawnPolicy::Never);

    time::timeout(Duration::from_secs(10), monitor.run(vec![spec]))
        .await
        .expect("run did not drain")
        .expect("run failed");

    let events = drain(&mut rx);
    assert_eq!(count(&events, EventKind::ProcStarting), 1);
    assert_eq!(count(&events, EventKind::RespawnScheduled), 0);
    let failed: Vec<&Event> = events
        .iter()
        .filter(|e| e.kind == EventKind::ProcFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].exit_code, Some(3));
}

#[tokio::test]
async fn crash_loop_respawns_unbounded() {
    let cfg = fast_config();
    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    let spec = shell(&cfg, "crasher", "exit 1").with_respawn(RespawnPolicy::Always);

    let runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run(vec![spec]).await })
    };

    // Five launch attempts in a row, each preceded by a respawn decision
    // after the first.
    let mut starts = 0;
    let mut respawns = 0;
    let deadline = time::Instant::now() + Duration::from_secs(10);
    while starts < 5 {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        let ev = time::timeout(remaining, rx.recv())
            .await
            .expect("crash loop stalled")
            .expect("bus closed");
        match ev.kind {
            EventKind::ProcStarting => starts += 1,
            EventKind::RespawnScheduled => respawns += 1,
            EventKind::ActorExhausted => panic!("respawn=always must never exhaust"),
            _ => {}
        }
    }
    assert!(starts >= 5);
    assert!(respawns >= 4);

    monitor.stop();
    time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("shutdown stalled")
        .expect("runner panicked")
        .expect("run failed");
}

#[tokio::test]
async fn launch_failure_is_retried_on_respawn_path() {
    let cfg = fast_config();
    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    let spec = ProcessSpec::with_defaults("/nonexistent/procvisor-test-binary", &cfg)
        .with_name("ghost")
        .with_respawn(RespawnPolicy::OnFailure);

    let runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run(vec![spec]).await })
    };

    let mut starts = 0;
    let deadline = time::Instant::now() + Duration::from_secs(10);
    while starts < 3 {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        let ev = time::timeout(remaining, rx.recv())
            .await
            .expect("retry loop stalled")
            .expect("bus closed");
        if ev.kind == EventKind::ProcStarting {
            starts += 1;
        }
        // The supervisor itself must keep running through launch failures.
        assert!(!runner.is_finished());
    }

    monitor.stop();
    time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("shutdown stalled")
        .expect("runner panicked")
        .expect("run failed");
}

#[tokio::test]
async fn stop_terminates_long_running_child_within_grace() {
    let cfg = fast_config();
    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    let spec = shell(&cfg, "sleeper", "sleep 30").with_respawn(RespawnPolicy::Always);

    let runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run(vec![spec]).await })
    };

    let started = wait_for_kind(&mut rx, EventKind::ProcStarted, Duration::from_secs(10)).await;
    assert!(started.pid.is_some());

    // The tracker applies events on its own listener; give it a moment.
    let deadline = time::Instant::now() + Duration::from_secs(2);
    while monitor.live_pids().is_empty() && time::Instant::now() < deadline {
        time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(monitor.live_pids().len(), 1);

    monitor.stop();
    time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("graceful stop exceeded grace")
        .expect("runner panicked")
        .expect("run failed");

    let events = drain(&mut rx);
    assert!(count(&events, EventKind::AllStoppedWithin) >= 1);
    assert!(count(&events, EventKind::ProcRemoved) >= 1);
}

#[tokio::test]
async fn dequeue_removes_child_and_drains_run() {
    let cfg = fast_config();
    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    // Queued before run(): the pending path.
    monitor.queue(shell(&cfg, "victim", "sleep 30").with_respawn(RespawnPolicy::Always));

    let runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run(Vec::new()).await })
    };

    wait_for_kind(&mut rx, EventKind::ProcStarted, Duration::from_secs(10)).await;

    monitor.dequeue("victim");
    wait_for_kind(&mut rx, EventKind::ProcRemoved, Duration::from_secs(10)).await;

    // With its only handle removed, the supervision loop drains naturally.
    time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("run did not drain after removal")
        .expect("runner panicked")
        .expect("run failed");
}

struct Exploder;

#[async_trait]
impl Subscribe for Exploder {
    fn name(&self) -> &'static str {
        "exploder"
    }

    async fn on_event(&self, ev: &Event) {
        if ev.kind == EventKind::ProcStarted {
            panic!("boom");
        }
    }
}

#[tokio::test]
async fn subscriber_panic_is_published_and_isolated() {
    let cfg = fast_config();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Exploder)];
    let monitor = Monitor::builder(cfg.clone()).with_subscribers(subs).build();
    let mut rx = monitor.bus().subscribe();

    let spec = shell(&cfg, "oneshot", "exit 0").with_respawn(RespawnPolicy::Never);

    let runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run(vec![spec]).await })
    };

    // The panic is reported as an event, not swallowed to stderr.
    let panicked =
        wait_for_kind(&mut rx, EventKind::SubscriberPanicked, Duration::from_secs(10)).await;
    assert_eq!(panicked.proc.as_deref(), Some("exploder"));
    assert_eq!(panicked.reason.as_deref(), Some("boom"));

    // The panic does not disturb supervision: the run still drains.
    time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("run did not drain")
        .expect("runner panicked")
        .expect("run failed");
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let cfg = fast_config();
    let monitor = Monitor::builder(cfg.clone()).build();
    let mut rx = monitor.bus().subscribe();

    let a = shell(&cfg, "dup", "sleep 30").with_respawn(RespawnPolicy::Always);
    let b = shell(&cfg, "dup", "sleep 30").with_respawn(RespawnPolicy::Always);

    let runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run(vec![a, b]).await })
    };

    let deadline = time::Instant::now() + Duration::from_secs(10);
    let mut rejected = false;
    while !rejected {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        let ev = time::timeout(remaining, rx.recv())
            .await
            .expect("no duplicate rejection observed")
            .expect("bus closed");
        if ev.kind == EventKind::ProcFailed
            && ev.reason.as_deref() == Some("proc_already_exists")
        {
            rejected = true;
        }
    }

    monitor.stop();
    time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("shutdown stalled")
        .expect("runner panicked")
        .expect("run failed");
}
