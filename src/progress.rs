//! Run-scoped context: cancellation flag and progress events.
//!
//! All long-running core calls take a `RunContext` instead of touching any
//! process-wide state, so concurrent runs stay testable in isolation.
//! Cancellation is cooperative: the caller sets the shared flag, the worker
//! polls it between files and between copy chunks.

use crate::diff::FileAction;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Phases of one engine run, in order; `Cancelled` absorbs from any of the
/// three working states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Scanning,
    AwaitingConfirmation,
    Copying,
    Reconciling,
    Completed,
    Cancelled,
}

/// Events emitted towards the front-end while scanning and copying.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    State(EngineState),
    /// A source file is being examined during the diff scan.
    Scanning { path: PathBuf },
    /// A copy for one plan entry has begun.
    FileStarted {
        index: usize,
        total: usize,
        relative_path: PathBuf,
    },
    /// Chunk-level progress: bytes done for the current file and for the
    /// whole run so far.
    FileProgress { bytes_file: u64, bytes_total: u64 },
    /// A plan entry finished (copied or failed).
    FileFinished {
        relative_path: PathBuf,
        action: FileAction,
        size: u64,
    },
    /// Current transfer rate over the recent-file window.
    Speed { bytes_per_sec: f64 },
    /// Mirror mode removed a target file.
    Deleted { relative_path: PathBuf },
}

/// Shared state for one run: a cancel flag plus an optional event channel.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancelled: Arc<AtomicBool>,
    events: Option<Sender<ProgressEvent>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an event channel; sends are best-effort and a disconnected
    /// receiver never fails the run.
    pub fn with_events(events: Sender<ProgressEvent>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            events: Some(events),
        }
    }

    /// Request cancellation; observed at file granularity minimum.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Handle the caller can keep to cancel a run executing on a worker.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_cancel_flag_is_shared() {
        let ctx = RunContext::new();
        let clone = ctx.clone();
        assert!(!ctx.is_cancelled());
        clone.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_cancel_via_handle() {
        let ctx = RunContext::new();
        let handle = ctx.cancel_handle();
        handle.store(true, std::sync::atomic::Ordering::Relaxed);
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_events_are_delivered() {
        let (tx, rx) = mpsc::channel();
        let ctx = RunContext::with_events(tx);
        ctx.emit(ProgressEvent::State(EngineState::Scanning));
        match rx.recv().unwrap() {
            ProgressEvent::State(EngineState::Scanning) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_disconnected_receiver_is_harmless() {
        let (tx, rx) = mpsc::channel();
        let ctx = RunContext::with_events(tx);
        drop(rx);
        ctx.emit(ProgressEvent::Speed { bytes_per_sec: 1.0 });
    }
}
