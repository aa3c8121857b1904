//! netwatch - concurrent host reachability poller.
//!
//! A fixed, ordered list of hosts is probed in repeating cycles. Each cycle
//! fans out at most `max_concurrency` probes, writes every result into the
//! [`StatusStore`] as it arrives, then stamps the cycle completion time. The
//! [`PollingController`] owns the loop and guarantees a single active loop
//! across any sequence of `start`/`stop` calls.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use netwatch::{CycleExecutor, HostRegistry, PollingController, StatusStore, probe::CommandProber};
//!
//! # async fn run() -> Result<(), netwatch::MonitorError> {
//! let hosts = Arc::new(HostRegistry::load("ips.txt")?);
//! let store = Arc::new(StatusStore::new(&hosts));
//! let prober = Arc::new(CommandProber::new(Duration::from_millis(3500)));
//! let executor = Arc::new(CycleExecutor::new(prober, store, 100, Duration::from_millis(3500)));
//! let controller = PollingController::new(hosts, executor, Duration::from_secs(30));
//!
//! controller.start();
//! let snapshot = controller.snapshot().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod models;
pub mod probe;
pub mod registry;
pub mod store;
pub mod utils;

pub use config::{MonitorConfig, ProbeKind};
pub use controller::PollingController;
pub use engine::{CycleExecutor, CycleSummary};
pub use error::MonitorError;
pub use models::{Host, HostStatus, PollingState, ProbeReport, Snapshot, Status};
pub use probe::Prober;
pub use registry::HostRegistry;
pub use store::StatusStore;
