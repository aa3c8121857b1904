//! Start/stop lifecycle of the repeating poll loop.
//!
//! The polling state lives in a `watch` channel: `start` and `stop` are
//! compare-and-set transitions on it, and the loop task waits on it during
//! the inter-cycle sleep so a stop takes effect without waiting out the
//! interval.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::engine::CycleExecutor;
use crate::models::{PollingState, Snapshot};
use crate::registry::HostRegistry;

pub struct PollingController {
    hosts: Arc<HostRegistry>,
    executor: Arc<CycleExecutor>,
    interval: Duration,
    state: Arc<watch::Sender<PollingState>>,
    active_loops: Arc<AtomicUsize>,
}

impl PollingController {
    pub fn new(hosts: Arc<HostRegistry>, executor: Arc<CycleExecutor>, interval: Duration) -> Self {
        let (state, _) = watch::channel(PollingState::Stopped);
        Self {
            hosts,
            executor,
            interval,
            state: Arc::new(state),
            active_loops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawns the poll loop if polling is stopped. Returns whether a loop was spawned.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == PollingState::Stopped {
                *state = PollingState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            info!(state = ?self.state(), "Start ignored, polling already active");
            return false;
        }

        let guard = LoopGuard::enter(Arc::clone(&self.active_loops), Arc::clone(&self.state));
        let hosts = Arc::clone(&self.hosts);
        let executor = Arc::clone(&self.executor);
        let interval = self.interval;
        let state_rx = self.state.subscribe();

        tokio::spawn(poll_loop(hosts, executor, interval, state_rx, guard));
        info!(hosts = self.hosts.len(), interval_secs = self.interval.as_secs_f64(), "Polling in Progress");
        true
    }

    /// Asks a running loop to exit after its current cycle. Returns whether the request was made.
    pub fn stop(&self) -> bool {
        let stopping = self.state.send_if_modified(|state| {
            if *state == PollingState::Running {
                *state = PollingState::Stopping;
                true
            } else {
                false
            }
        });
        if stopping {
            info!("Stopping Polling...");
        }
        stopping
    }

    pub fn state(&self) -> PollingState {
        *self.state.borrow()
    }

    /// Resolves once no loop is active.
    pub async fn wait_stopped(&self) {
        let mut rx = self.state.subscribe();
        // The sender is owned by `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| *state == PollingState::Stopped).await;
    }

    /// Number of loop tasks currently alive. Never exceeds one.
    pub fn active_loops(&self) -> usize {
        self.active_loops.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.executor.store().snapshot().await
    }

    pub fn subscribe_cycles(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.executor.store().subscribe()
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Counts a live loop task and returns polling to `Stopped` when the task ends, even on unwind.
struct LoopGuard {
    active_loops: Arc<AtomicUsize>,
    state: Arc<watch::Sender<PollingState>>,
}

impl LoopGuard {
    fn enter(active_loops: Arc<AtomicUsize>, state: Arc<watch::Sender<PollingState>>) -> Self {
        let previous = active_loops.fetch_add(1, Ordering::SeqCst);
        debug_assert_eq!(previous, 0, "a second poll loop was spawned");
        Self { active_loops, state }
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.active_loops.fetch_sub(1, Ordering::SeqCst);
        self.state.send_replace(PollingState::Stopped);
        info!("Polling Stopped");
    }
}

async fn poll_loop(
    hosts: Arc<HostRegistry>,
    executor: Arc<CycleExecutor>,
    interval: Duration,
    mut state_rx: watch::Receiver<PollingState>,
    _guard: LoopGuard,
) {
    loop {
        if *state_rx.borrow_and_update() != PollingState::Running {
            break;
        }

        executor.run_cycle(&hosts).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            open = async { state_rx.wait_for(|state| *state != PollingState::Running).await.is_ok() } => {
                if !open {
                    warn!("Polling state channel closed, poll loop exiting");
                    break;
                }
            }
        }
    }
}
