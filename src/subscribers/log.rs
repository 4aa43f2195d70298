//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [starting] proc=apache_exporter attempt=1
//! [started] proc=apache_exporter pid=4242
//! [failed] proc=apache_exporter err="exited with code 1" attempt=1
//! [respawn] proc=apache_exporter delay_ms=200 after_attempt=1
//! [stopped] proc=apache_exporter
//! [term-requested] children=1
//! [wakeup]
//! [shutdown-requested]
//! [all-stopped-within-grace]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
#[derive(Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    fn name(&self) -> &'static str {
        "log-writer"
    }

    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ProcStarting => {
                if let (Some(proc), Some(att)) = (&e.proc, e.attempt) {
                    println!("[starting] proc={proc} attempt={att}");
                }
            }
            EventKind::ProcStarted => {
                if let (Some(proc), Some(pid)) = (&e.proc, e.pid) {
                    println!("[started] proc={proc} pid={pid}");
                }
            }
            EventKind::ProcStopped => {
                println!("[stopped] proc={:?}", e.proc);
            }
            EventKind::ProcFailed => {
                println!(
                    "[failed] proc={:?} err={:?} attempt={:?}",
                    e.proc, e.reason, e.attempt
                );
            }
            EventKind::RespawnScheduled => {
                println!(
                    "[respawn] proc={:?} delay_ms={:?} after_attempt={:?}",
                    e.proc, e.delay_ms, e.attempt
                );
            }
            EventKind::ProcAdded => {
                println!("[added] proc={:?}", e.proc);
            }
            EventKind::ProcRemoved => {
                println!("[removed] proc={:?}", e.proc);
            }
            EventKind::ActorExhausted => {
                println!("[exhausted] proc={:?}", e.proc);
            }
            EventKind::ActorDead => {
                println!("[dead] proc={:?} reason={:?}", e.proc, e.reason);
            }
            EventKind::TermRequested => {
                println!("[term-requested] {:?}", e.reason);
            }
            EventKind::WakeupRequested => {
                println!("[wakeup]");
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
            _ => {}
        }
    }
}
