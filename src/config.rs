use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::MonitorError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_hosts_file")]
    pub hosts_file: String,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default)]
    pub probe: ProbeKind,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

/// Mechanism used for the single ICMP echo.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Icmp,
    /// Spawns the system `ping` binary.
    Command,
}

fn default_hosts_file() -> String { "ips.txt".into() }
fn default_interval_seconds() -> u64 { 30 }
fn default_max_concurrency() -> usize { 100 }
fn default_probe_timeout_ms() -> u64 { 3500 }
fn default_api_port() -> u16 { 3000 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            hosts_file: default_hosts_file(),
            interval_seconds: default_interval_seconds(),
            max_concurrency: default_max_concurrency(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe: ProbeKind::default(),
            api_port: default_api_port(),
        }
    }
}

impl MonitorConfig {
    pub fn from_json(content: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| MonitorError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(MonitorError::Io { path: path.to_path_buf(), source }),
        }
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.interval_seconds == 0 {
            return Err(MonitorError::Config("interval_seconds must be at least 1".into()));
        }
        if self.max_concurrency == 0 {
            return Err(MonitorError::Config("max_concurrency must be at least 1".into()));
        }
        if self.probe_timeout_ms == 0 {
            return Err(MonitorError::Config("probe_timeout_ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = MonitorConfig::from_json("{}").unwrap();
        assert_eq!(config.hosts_file, "ips.txt");
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.max_concurrency, 100);
        assert_eq!(config.probe_timeout(), Duration::from_millis(3500));
        assert_eq!(config.probe, ProbeKind::Icmp);
    }

    #[test]
    fn test_overrides() {
        let config = MonitorConfig::from_json(
            r#"{"interval_seconds": 10, "max_concurrency": 8, "probe": "command", "api_port": 8080}"#,
        )
        .unwrap();
        assert_eq!(config.interval_seconds, 10);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.probe, ProbeKind::Command);
        assert_eq!(config.api_port, 8080);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = MonitorConfig::from_json(r#"{"max_concurrency": 0}"#).unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(MonitorConfig::from_json("{"), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load(dir.path().join("config.json")).unwrap();
        assert_eq!(config.max_concurrency, 100);
    }
}
