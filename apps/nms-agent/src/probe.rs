//! Probe adapters: system samplers and the external measurement processes.
//!
//! External tools are wrapped behind small adapters that return structured
//! values; the operator-visible result strings are assembled by the engine
//! and stay stable regardless of the tool's exact output.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::process::Command;

use sysinfo::Networks;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("process failed to start: {0}")]
    Spawn(#[from] io::Error),
    #[error("process exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("output missing {0}")]
    Parse(&'static str),
}

/// Round-trip statistics of one ICMP echo probe run.
#[derive(Debug, Clone, PartialEq)]
pub struct PingStats {
    /// Per-packet round-trip times in arrival order (ms).
    pub rtts_ms: Vec<f64>,
    /// Average round trip from the probe summary (ms).
    pub avg_rtt_ms: f64,
    /// Lost packets as a percentage of those transmitted.
    pub loss_pct: f64,
}

impl PingStats {
    /// Largest positive delta between consecutive round-trip times (ms).
    pub fn max_jitter_ms(&self) -> f64 {
        self.rtts_ms
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|delta| *delta > 0.0)
            .fold(0.0, f64::max)
    }
}

/// Runs `ping -c <count> <target>` and parses its summary.
pub fn ping(target: Ipv4Addr, count: u8) -> Result<PingStats, ProbeError> {
    let output = Command::new("ping")
        .arg("-c")
        .arg(count.to_string())
        .arg(target.to_string())
        .output()?;
    if !output.status.success() {
        return Err(ProbeError::Failed(output.status));
    }
    parse_ping_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the line-oriented output of `ping -c N host`.
pub fn parse_ping_output(text: &str) -> Result<PingStats, ProbeError> {
    let mut rtts_ms = Vec::new();
    let mut loss_pct = None;
    let mut avg_rtt_ms = None;

    for line in text.lines() {
        if let Some(avg) = parse_rtt_summary(line) {
            avg_rtt_ms = Some(avg);
        } else if let Some(rtt) = parse_packet_rtt(line) {
            rtts_ms.push(rtt);
        } else if let Some(loss) = parse_loss(line) {
            loss_pct = Some(loss);
        }
    }

    Ok(PingStats {
        rtts_ms,
        avg_rtt_ms: avg_rtt_ms.ok_or(ProbeError::Parse("rtt summary"))?,
        loss_pct: loss_pct.ok_or(ProbeError::Parse("loss summary"))?,
    })
}

/// `64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.045 ms`
fn parse_packet_rtt(line: &str) -> Option<f64> {
    let rest = line.split("time=").nth(1)?;
    rest.split_whitespace().next()?.parse().ok()
}

/// `5 packets transmitted, 5 received, 0% packet loss, time 4005ms`
fn parse_loss(line: &str) -> Option<f64> {
    let field = line.split(',').find(|field| field.contains("packet loss"))?;
    field.trim().split('%').next()?.trim().parse().ok()
}

/// `rtt min/avg/max/mdev = 0.035/0.048/0.062/0.011 ms` (BSD ping says
/// `round-trip` instead of `rtt`).
fn parse_rtt_summary(line: &str) -> Option<f64> {
    if !line.starts_with("rtt") && !line.starts_with("round-trip") {
        return None;
    }
    line.split('=').nth(1)?.trim().split('/').nth(1)?.parse().ok()
}

/// Runs the UDP bandwidth generator against the collector endpoint and
/// returns the reported throughput, e.g. `"95.2 Mbits/sec"`.
pub fn bandwidth(collector: IpAddr, window_secs: u8) -> Result<String, ProbeError> {
    let output = Command::new("iperf")
        .args([
            "-c",
            &collector.to_string(),
            "-u",
            "-b",
            "100M",
            "-t",
            &window_secs.to_string(),
        ])
        .output()?;
    if !output.status.success() {
        return Err(ProbeError::Failed(output.status));
    }
    parse_iperf_output(&String::from_utf8_lossy(&output.stdout))
}

/// Picks the reported throughput out of the iperf client summary, e.g.
/// `[  3]  0.0-10.0 sec  1.25 MBytes  1.05 Mbits/sec  0.004 ms  0/893 (0%)`.
pub fn parse_iperf_output(text: &str) -> Result<String, ProbeError> {
    let line = text
        .lines()
        .rev()
        .find(|line| line.contains("bits/sec"))
        .ok_or(ProbeError::Parse("throughput"))?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    let unit_at = fields
        .iter()
        .position(|field| field.ends_with("bits/sec"))
        .ok_or(ProbeError::Parse("throughput"))?;
    if unit_at == 0 {
        return Err(ProbeError::Parse("throughput"));
    }
    Ok(format!("{} {}", fields[unit_at - 1], fields[unit_at]))
}

/// CPU and memory sampling through the system-information facade.
pub struct SystemSampler {
    sys: sysinfo::System,
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut sys = sysinfo::System::new();
        // The first usage reading needs a baseline refresh.
        sys.refresh_cpu_usage();
        Self { sys }
    }

    /// Global CPU usage, percent across all cores.
    pub fn cpu_percent(&mut self) -> f64 {
        self.sys.refresh_cpu_usage();
        f64::from(self.sys.global_cpu_info().cpu_usage()).clamp(0.0, 100.0)
    }

    /// Used physical memory, percent of total.
    pub fn ram_percent(&mut self) -> f64 {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        (self.sys.used_memory() as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Whether a network interface with this exact name exists on the host.
pub fn interface_present(name: &str) -> bool {
    Networks::new_with_refreshed_list()
        .iter()
        .any(|(ifname, _)| ifname == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_PING: &str = "\
PING 10.0.0.1 (10.0.0.1) 56(84) bytes of data.
64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.045 ms
64 bytes from 10.0.0.1: icmp_seq=2 ttl=64 time=0.062 ms
64 bytes from 10.0.0.1: icmp_seq=3 ttl=64 time=0.041 ms
64 bytes from 10.0.0.1: icmp_seq=4 ttl=64 time=0.059 ms
64 bytes from 10.0.0.1: icmp_seq=5 ttl=64 time=0.048 ms

--- 10.0.0.1 ping statistics ---
5 packets transmitted, 5 received, 0% packet loss, time 4005ms
rtt min/avg/max/mdev = 0.041/0.051/0.062/0.011 ms
";

    #[test]
    fn test_parse_ping_output() {
        let stats = parse_ping_output(LINUX_PING).unwrap();
        assert_eq!(stats.rtts_ms, vec![0.045, 0.062, 0.041, 0.059, 0.048]);
        assert_eq!(stats.avg_rtt_ms, 0.051);
        assert_eq!(stats.loss_pct, 0.0);
    }

    #[test]
    fn test_parse_ping_loss_percentage() {
        let text = "\
4 packets transmitted, 3 received, 25% packet loss, time 3004ms
rtt min/avg/max/mdev = 0.041/0.051/0.062/0.011 ms
";
        let stats = parse_ping_output(text).unwrap();
        assert_eq!(stats.loss_pct, 25.0);
    }

    #[test]
    fn test_max_jitter_is_largest_positive_delta() {
        let stats = PingStats {
            rtts_ms: vec![10.0, 12.5, 11.0, 18.0, 17.0],
            avg_rtt_ms: 13.7,
            loss_pct: 0.0,
        };
        // Deltas: +2.5, -1.5, +7.0, -1.0.
        assert_eq!(stats.max_jitter_ms(), 7.0);
    }

    #[test]
    fn test_max_jitter_of_monotonic_decrease_is_zero() {
        let stats = PingStats {
            rtts_ms: vec![10.0, 9.0, 8.0],
            avg_rtt_ms: 9.0,
            loss_pct: 0.0,
        };
        assert_eq!(stats.max_jitter_ms(), 0.0);
    }

    #[test]
    fn test_parse_ping_missing_summary_fails() {
        let err = parse_ping_output("no ping here").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    #[test]
    fn test_parse_iperf_udp_report() {
        let text = "\
------------------------------------------------------------
Client connecting to 10.0.4.10, UDP port 5001
------------------------------------------------------------
[  3] local 10.0.4.1 port 51784 connected with 10.0.4.10 port 5001
[ ID] Interval       Transfer     Bandwidth
[  3]  0.0-10.0 sec   120 MBytes   100 Mbits/sec
[  3] Sent 85470 datagrams
[  3] Server Report:
[  3]  0.0-10.0 sec   119 MBytes  99.8 Mbits/sec  0.004 ms  412/85470 (0.48%)
";
        assert_eq!(parse_iperf_output(text).unwrap(), "99.8 Mbits/sec");
    }

    #[test]
    fn test_parse_iperf_missing_rate_fails() {
        let err = parse_iperf_output("nothing useful").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }
}
