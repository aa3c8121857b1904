use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A network endpoint identifier (hostname or address), compared by exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Host {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Host {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Host {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Never probed.
    #[default]
    Unknown,
    Online,
    Offline,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "Unknown"),
            Status::Online => write!(f, "Online"),
            Status::Offline => write!(f, "Offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    pub host: Host,
    pub status: Status,
}

/// Lifecycle of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollingState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for PollingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollingState::Stopped => write!(f, "Polling Stopped"),
            PollingState::Running => write!(f, "Polling in Progress"),
            PollingState::Stopping => write!(f, "Stopping Polling..."),
        }
    }
}

/// Point-in-time copy of the status store, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub hosts: Vec<HostStatus>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn status_of(&self, host: &str) -> Option<Status> {
        self.hosts
            .iter()
            .find(|entry| entry.host.as_str() == host)
            .map(|entry| entry.status)
    }

    pub fn count(&self, status: Status) -> usize {
        self.hosts.iter().filter(|entry| entry.status == status).count()
    }

    /// `(host, status)` pairs, handy for comparisons.
    pub fn pairs(&self) -> Vec<(&str, Status)> {
        self.hosts
            .iter()
            .map(|entry| (entry.host.as_str(), entry.status))
            .collect()
    }
}

/// Outcome of one probe. `detail` is diagnostic text only.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub status: Status,
    pub latency_ms: Option<f64>,
    pub detail: String,
}

impl ProbeReport {
    pub fn online(latency_ms: Option<f64>, detail: impl Into<String>) -> Self {
        Self { status: Status::Online, latency_ms, detail: detail.into() }
    }

    pub fn offline(detail: impl Into<String>) -> Self {
        Self { status: Status::Offline, latency_ms: None, detail: detail.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Online).unwrap(), "\"online\"");
        assert_eq!(serde_json::to_string(&PollingState::Stopping).unwrap(), "\"stopping\"");
        assert_eq!(Status::default(), Status::Unknown);
    }

    #[test]
    fn snapshot_helpers() {
        let snapshot = Snapshot {
            hosts: vec![
                HostStatus { host: Host::from("a"), status: Status::Online },
                HostStatus { host: Host::from("b"), status: Status::Offline },
                HostStatus { host: Host::from("c"), status: Status::Offline },
            ],
            last_checked_at: None,
        };
        assert_eq!(snapshot.status_of("b"), Some(Status::Offline));
        assert_eq!(snapshot.status_of("z"), None);
        assert_eq!(snapshot.count(Status::Offline), 2);
        assert_eq!(snapshot.pairs()[0], ("a", Status::Online));
    }
}
