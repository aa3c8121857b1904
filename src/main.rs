use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use netwatch::{
    api, probe, utils, CycleExecutor, HostRegistry, MonitorConfig, PollingController, Status, StatusStore,
};

/// Upper bound on how long shutdown waits for the in-flight cycle.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    utils::init_tracing();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".into());
    let config = MonitorConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;

    let hosts = HostRegistry::load(&config.hosts_file)
        .with_context(|| format!("Failed to read {}", config.hosts_file))?;
    if hosts.is_empty() {
        bail!("No hosts to monitor. Please check the {} file.", config.hosts_file);
    }
    let hosts = Arc::new(hosts);

    let prober = probe::build_prober(config.probe, config.probe_timeout())
        .context("Failed to create prober")?;
    info!(
        prober = prober.name(),
        hosts = hosts.len(),
        max_concurrency = config.max_concurrency,
        interval_secs = config.interval_seconds,
        "Reachability monitor configured"
    );

    let store = Arc::new(StatusStore::new(&hosts));
    let executor = Arc::new(CycleExecutor::new(
        prober,
        Arc::clone(&store),
        config.max_concurrency,
        config.probe_timeout(),
    ));
    let controller = Arc::new(PollingController::new(hosts, executor, config.interval()));

    let api_controller = Arc::clone(&controller);
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::start_server(api_port, api_controller).await {
            error!("API server failed: {:#}", e);
        }
    });

    let mut cycles = store.subscribe();
    let report_store = Arc::clone(&store);
    tokio::spawn(async move {
        while cycles.changed().await.is_ok() {
            let snapshot = report_store.snapshot().await;
            if let Some(checked) = snapshot.last_checked_at {
                info!(
                    online = snapshot.count(Status::Online),
                    offline = snapshot.count(Status::Offline),
                    "Last Checked: {}",
                    checked.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    });

    controller.start();

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping poller...");
    controller.stop();
    if tokio::time::timeout(SHUTDOWN_GRACE, controller.wait_stopped()).await.is_err() {
        warn!("Poll loop still finishing its cycle, exiting anyway");
    }

    Ok(())
}
