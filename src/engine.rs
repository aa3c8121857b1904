use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::models::{Host, ProbeReport, Status};
use crate::probe::Prober;
use crate::registry::HostRegistry;
use crate::store::StatusStore;

/// Slack the executor grants a prober beyond its own timeout before giving up on it.
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub probed: usize,
    pub online: usize,
    pub offline: usize,
    pub completed_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Runs one bounded fan-out of probes over the registry and records the results.
pub struct CycleExecutor {
    prober: Arc<dyn Prober>,
    store: Arc<StatusStore>,
    concurrency_limiter: Arc<Semaphore>,
    max_concurrency: usize,
    probe_deadline: Duration,
}

impl CycleExecutor {
    pub fn new(
        prober: Arc<dyn Prober>,
        store: Arc<StatusStore>,
        max_concurrency: usize,
        probe_timeout: Duration,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            prober,
            store,
            concurrency_limiter: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            probe_deadline: probe_timeout + DEADLINE_GRACE,
        }
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Probes every host once and returns when all of them have reported.
    ///
    /// A permit is taken before each probe task is spawned, so no more than
    /// `max_concurrency` probes exist at any instant. Results land in the
    /// store as they complete; `mark_cycle_complete` runs once at the end.
    pub async fn run_cycle(&self, hosts: &HostRegistry) -> CycleSummary {
        let start_time = Instant::now();
        let mut tasks = FuturesUnordered::new();

        for host in hosts.iter() {
            let permit = match Arc::clone(&self.concurrency_limiter).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Concurrency limiter closed, cycle aborted early");
                    break;
                }
            };

            let prober = Arc::clone(&self.prober);
            let store = Arc::clone(&self.store);
            let host = host.clone();
            let deadline = self.probe_deadline;

            tasks.push(tokio::spawn(async move {
                let report = probe_guarded(prober.as_ref(), &host, deadline).await;
                drop(permit);
                record(&store, &host, &report).await;
                report.status
            }));
        }

        let mut summary = CycleSummary {
            probed: 0,
            online: 0,
            offline: 0,
            completed_at: Utc::now(),
            elapsed: Duration::ZERO,
        };

        while let Some(join_res) = tasks.next().await {
            summary.probed += 1;
            match join_res {
                Ok(Status::Online) => summary.online += 1,
                Ok(_) => summary.offline += 1,
                Err(e) => {
                    summary.offline += 1;
                    error!(error = %e, "Probe task did not complete");
                }
            }
        }

        summary.completed_at = self.store.mark_cycle_complete(Utc::now()).await;
        summary.elapsed = start_time.elapsed();

        info!(
            probed = summary.probed,
            online = summary.online,
            offline = summary.offline,
            "Cycle completed in {:.2}s",
            summary.elapsed.as_secs_f64()
        );
        summary
    }
}

/// Runs the prober, turning a panic or an overrun into an offline report.
async fn probe_guarded(prober: &dyn Prober, host: &Host, deadline: Duration) -> ProbeReport {
    let probe = AssertUnwindSafe(prober.probe(host.as_str())).catch_unwind();
    match tokio::time::timeout(deadline, probe).await {
        Ok(Ok(report)) => report,
        Ok(Err(_)) => {
            error!(%host, prober = prober.name(), "Prober panicked");
            ProbeReport::offline("Probe Failure")
        }
        Err(_) => {
            warn!(%host, deadline_ms = deadline.as_millis() as u64, "Probe overran its deadline");
            ProbeReport::offline("Probe Deadline Exceeded")
        }
    }
}

async fn record(store: &StatusStore, host: &Host, report: &ProbeReport) {
    let previous = match store.set(host.as_str(), report.status).await {
        Ok(previous) => previous,
        Err(_) => return,
    };

    if previous == report.status || (previous == Status::Unknown && report.status == Status::Online) {
        return;
    }

    let msg = format!("[CHANGE] {} -> {} ({})", host, report.status, report.detail);
    if report.status == Status::Offline { error!("{}", msg); } else { warn!("{}", msg); }
}
