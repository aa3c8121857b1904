use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{watch, Mutex};
use tracing::warn;

use crate::error::MonitorError;
use crate::models::{Host, HostStatus, Snapshot, Status};
use crate::registry::HostRegistry;

struct StoreState {
    slots: Vec<HostStatus>,
    index: HashMap<Host, usize>,
    last_checked_at: Option<DateTime<Utc>>,
}

/// Latest status per registered host plus the cycle-level check time.
///
/// The key set is fixed at construction. One mutex guards the slots and the
/// timestamp together so a snapshot never observes a half-written entry.
pub struct StatusStore {
    state: Mutex<StoreState>,
    cycles: watch::Sender<Option<DateTime<Utc>>>,
}

impl StatusStore {
    pub fn new(registry: &HostRegistry) -> Self {
        let slots: Vec<HostStatus> = registry
            .iter()
            .map(|host| HostStatus { host: host.clone(), status: Status::Unknown })
            .collect();
        let index = slots
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.host.clone(), i))
            .collect();
        let (cycles, _) = watch::channel(None);

        Self {
            state: Mutex::new(StoreState { slots, index, last_checked_at: None }),
            cycles,
        }
    }

    /// Overwrites the status of a registered host, returning the previous one.
    ///
    /// An unregistered host is a caller bug: debug builds panic, release
    /// builds log it and return `UnknownHost` with the store untouched.
    pub async fn set(&self, host: &str, status: Status) -> Result<Status, MonitorError> {
        let mut state = self.state.lock().await;
        let Some(&slot) = state.index.get(host) else {
            drop(state);
            warn!(host, %status, "Status update for unregistered host ignored");
            if cfg!(debug_assertions) {
                panic!("status update for host {host} which is not registered");
            }
            return Err(MonitorError::UnknownHost(Host::new(host)));
        };
        Ok(std::mem::replace(&mut state.slots[slot].status, status))
    }

    /// Records the end of a cycle. The timestamp never moves backwards.
    pub async fn mark_cycle_complete(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let mut state = self.state.lock().await;
        let checked = match state.last_checked_at {
            Some(previous) if previous > at => previous,
            _ => at,
        };
        state.last_checked_at = Some(checked);
        drop(state);

        self.cycles.send_replace(Some(checked));
        checked
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        Snapshot {
            hosts: state.slots.clone(),
            last_checked_at: state.last_checked_at,
        }
    }

    /// Fires once per completed cycle with the new `last_checked_at`.
    pub fn subscribe(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.cycles.subscribe()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store(hosts: &[&str]) -> StatusStore {
        StatusStore::new(&HostRegistry::from_lines(hosts.iter().copied()))
    }

    #[tokio::test]
    async fn test_initial_state_is_unknown() {
        let store = store(&["a", "b"]);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.pairs(), vec![("a", Status::Unknown), ("b", Status::Unknown)]);
        assert!(snapshot.last_checked_at.is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites_and_returns_previous() {
        let store = store(&["a", "b"]);
        assert_eq!(store.set("b", Status::Online).await.unwrap(), Status::Unknown);
        assert_eq!(store.set("b", Status::Offline).await.unwrap(), Status::Online);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.pairs(), vec![("a", Status::Unknown), ("b", Status::Offline)]);
    }

    #[tokio::test]
    #[cfg_attr(debug_assertions, should_panic(expected = "which is not registered"))]
    async fn test_set_unknown_host_is_rejected() {
        let store = store(&["a"]);
        let err = store.set("ghost", Status::Online).await.unwrap_err();
        assert!(matches!(err, MonitorError::UnknownHost(ref h) if h.as_str() == "ghost"));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.snapshot().await.pairs(), vec![("a", Status::Unknown)]);
    }

    #[tokio::test]
    async fn test_last_checked_never_moves_backwards() {
        let store = store(&["a"]);
        let now = Utc::now();
        assert_eq!(store.mark_cycle_complete(now).await, now);
        assert_eq!(store.mark_cycle_complete(now - Duration::seconds(5)).await, now);

        let later = now + Duration::seconds(30);
        store.mark_cycle_complete(later).await;
        assert_eq!(store.snapshot().await.last_checked_at, Some(later));
    }

    #[tokio::test]
    async fn test_subscribers_see_cycle_completion() {
        let store = store(&["a"]);
        let mut rx = store.subscribe();
        let now = Utc::now();
        store.mark_cycle_complete(now).await;

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(now));
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let hosts: Vec<String> = (0..64).map(|i| format!("10.0.0.{i}")).collect();
        let store = std::sync::Arc::new(StatusStore::new(&HostRegistry::from_lines(&hosts)));

        let mut handles = Vec::new();
        for host in hosts.clone() {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.set(&host, Status::Online).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.hosts.len(), 64);
        assert_eq!(snapshot.count(Status::Online), 64);
    }
}
