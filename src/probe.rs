//! Reachability probes.
//!
//! Every prober answers with a [`ProbeReport`] and never fails: resolution
//! errors, socket or process errors, unreachable replies and timeouts all
//! come back as [`Status::Offline`].

use std::net::IpAddr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ProbeKind;
use crate::error::MonitorError;
use crate::models::{ProbeReport, Status};

const PAYLOAD: [u8; 56] = [0u8; 56];

#[async_trait::async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Sends exactly one reachability probe to `host`.
    async fn probe(&self, host: &str) -> ProbeReport;

    fn name(&self) -> &'static str;
}

/// Builds the prober selected in the config.
pub fn build_prober(kind: ProbeKind, probe_timeout: Duration) -> Result<Arc<dyn Prober>, MonitorError> {
    let prober: Arc<dyn Prober> = match kind {
        ProbeKind::Icmp => Arc::new(IcmpProber::new(probe_timeout)?),
        ProbeKind::Command => Arc::new(CommandProber::new(probe_timeout)),
    };
    Ok(prober)
}

async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    tokio::net::lookup_host(format!("{host}:0"))
        .await?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "No IP Address Found"))
}

/// In-process ICMP echo.
pub struct IcmpProber {
    v4: Client,
    v6: Option<Client>,
    timeout: Duration,
}

impl IcmpProber {
    pub fn new(probe_timeout: Duration) -> Result<Self, MonitorError> {
        let v4 = Client::new(&Config::default())?;
        let v6 = Client::new(&Config::builder().kind(ICMP::V6).build())
            .inspect_err(|e| warn!(error = %e, "ICMPv6 client unavailable, IPv6 hosts will report offline"))
            .ok();

        Ok(Self { v4, v6, timeout: probe_timeout })
    }

    async fn echo(&self, host: &str) -> ProbeReport {
        let ip = match resolve_host(host).await {
            Ok(ip) => ip,
            Err(e) => return ProbeReport::offline(format!("Domain Resolution Error: {e}")),
        };

        let client = match (ip, &self.v6) {
            (IpAddr::V4(_), _) => &self.v4,
            (IpAddr::V6(_), Some(v6)) => v6,
            (IpAddr::V6(_), None) => return ProbeReport::offline("ICMPv6 Unavailable"),
        };

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(0), &PAYLOAD).await {
            Ok((_, rtt)) => {
                let latency = rtt.as_secs_f64() * 1000.0;
                debug!(host, latency_ms = latency, "ICMP reply");
                ProbeReport::online(Some(latency), "ICMP Response OK")
            }
            Err(e) => ProbeReport::offline(format!("ICMP Error: {e}")),
        }
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    /// Resolution and the echo share one `timeout` budget.
    async fn probe(&self, host: &str) -> ProbeReport {
        match timeout(self.timeout, self.echo(host)).await {
            Ok(report) => report,
            Err(_) => ProbeReport::offline("Request Timeout"),
        }
    }

    fn name(&self) -> &'static str {
        "icmp"
    }
}

/// Single-attempt probe through the system `ping` binary.
pub struct CommandProber {
    program: String,
    timeout: Duration,
}

impl CommandProber {
    pub fn new(probe_timeout: Duration) -> Self {
        Self { program: "ping".into(), timeout: probe_timeout }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

/// One echo request, bounded by the platform's reply-wait flag.
fn ping_args(host: &str, wait: Duration) -> Vec<String> {
    let millis = wait.as_millis().max(1);
    if cfg!(windows) {
        vec!["-n".into(), "1".into(), "-w".into(), millis.to_string(), host.into()]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-W".into(), millis.to_string(), host.into()]
    } else {
        let secs = millis.div_ceil(1000);
        vec!["-c".into(), "1".into(), "-W".into(), secs.to_string(), host.into()]
    }
}

/// Windows `ping` exits 0 on "Destination host unreachable", so the output is checked too.
/// The host name is blanked first so a name like `unreachable-gw` cannot match.
fn classify_output(exit_ok: bool, output: &str, host: &str) -> Status {
    let mut output = output.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    if !host.is_empty() {
        output = output.replace(&host, "");
    }
    if !exit_ok || output.contains("unreachable") || output.contains("timed out") {
        Status::Offline
    } else {
        Status::Online
    }
}

#[async_trait::async_trait]
impl Prober for CommandProber {
    async fn probe(&self, host: &str) -> ProbeReport {
        let mut command = Command::new(&self.program);
        command
            .args(ping_args(host, self.timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(0x0800_0000);

        let start = Instant::now();
        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ProbeReport::offline(format!("Failed to launch {}: {e}", self.program)),
            Err(_) => return ProbeReport::offline("Request Timeout"),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        match classify_output(output.status.success(), &text, host) {
            Status::Online => ProbeReport::online(Some(elapsed_ms), "Echo Reply"),
            _ => ProbeReport::offline(match output.status.code() {
                Some(0) | None => "Host Unreachable".to_string(),
                Some(code) => format!("ping exited with {code}"),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_host_literal() {
        assert_eq!(
            resolve_host("127.0.0.1").await.unwrap(),
            IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)
        );
        assert_eq!(resolve_host("::1").await.unwrap(), IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_classify_output() {
        assert_eq!(
            classify_output(true, "64 bytes from 10.0.0.1: icmp_seq=1 ttl=64", "10.0.0.1"),
            Status::Online
        );
        assert_eq!(classify_output(false, "", "10.0.0.1"), Status::Offline);
        assert_eq!(
            classify_output(true, "Reply from 10.0.0.9: Destination host unreachable.", "10.0.0.9"),
            Status::Offline
        );
        assert_eq!(classify_output(true, "Request timed out.", "10.0.0.9"), Status::Offline);
    }

    #[test]
    fn test_classify_output_ignores_host_name() {
        let output = "PING Unreachable-GW.lan (10.0.0.5) 56(84) bytes of data.\n\
                      64 bytes from unreachable-gw.lan (10.0.0.5): icmp_seq=1 ttl=64 time=0.4 ms";
        assert_eq!(classify_output(true, output, "unreachable-gw.lan"), Status::Online);
        assert_eq!(
            classify_output(true, "From 10.0.0.1 icmp_seq=1 Destination Host Unreachable", "unreachable-gw.lan"),
            Status::Offline
        );
    }

    #[test]
    fn test_ping_args_single_attempt() {
        let args = ping_args("10.0.0.1", Duration::from_millis(3500));
        assert_eq!(args.last().map(String::as_str), Some("10.0.0.1"));
        assert!(args.iter().any(|a| a == "1"));
        if cfg!(all(unix, not(target_os = "macos"))) {
            assert_eq!(args, vec!["-c", "1", "-W", "4", "10.0.0.1"]);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_reports_online() {
        let prober = CommandProber::new(Duration::from_secs(2)).with_program("true");
        let report = prober.probe("10.0.0.1").await;
        assert_eq!(report.status, Status::Online);
        assert!(report.latency_ms.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_offline() {
        let prober = CommandProber::new(Duration::from_secs(2)).with_program("false");
        let report = prober.probe("10.0.0.1").await;
        assert_eq!(report.status, Status::Offline);
        assert_eq!(report.detail, "ping exited with 1");
    }

    #[tokio::test]
    async fn test_missing_binary_reports_offline() {
        let prober = CommandProber::new(Duration::from_secs(1)).with_program("netwatch-no-such-ping");
        let report = prober.probe("127.0.0.1").await;
        assert_eq!(report.status, Status::Offline);
        assert!(report.detail.contains("Failed to launch"));
    }
}
