// NetForensics Daemon - Ping probe
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Latency probe driving the system `ping` binary.

use netforensics::{CollectorError, LatencyReading};
use tokio::process::Command;
use tracing::debug;

const COLLECTOR: &str = "ping";

/// Short ping burst against one host.
#[derive(Debug, Clone)]
pub struct PingProbe {
    pub host: String,
    pub count: u32,
    /// Per-reply wait in seconds.
    pub reply_timeout_secs: u32,
}

impl PingProbe {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            count: 5,
            reply_timeout_secs: 1,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    /// Run one burst.
    pub async fn ping(&self) -> Result<LatencyReading, CollectorError> {
        let output = Command::new("ping")
            .arg("-n")
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-W")
            .arg(self.reply_timeout_secs.to_string())
            .arg(&self.host)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CollectorError::Unavailable {
                collector: COLLECTOR,
                reason: e.to_string(),
            })?;

        // Exit status 1 just means some replies were missing
        let stdout = String::from_utf8_lossy(&output.stdout);
        let reading = parse_ping_output(&stdout)?;
        debug!(
            "ping {}: {} replies, {}% loss",
            self.host,
            reading.latency_samples.len(),
            reading.packet_loss
        );
        Ok(reading)
    }
}

/// Parse `ping` output: one `time=X ms` per reply plus the summary line's
/// `N% packet loss`.
pub fn parse_ping_output(output: &str) -> Result<LatencyReading, CollectorError> {
    let mut samples = Vec::new();
    let mut loss = None;

    for line in output.lines() {
        if let Some(rest) = line.split("time=").nth(1) {
            let value = rest
                .split_whitespace()
                .next()
                .unwrap_or("")
                .trim_end_matches("ms");
            if let Ok(rtt) = value.parse::<f64>() {
                samples.push(rtt);
            }
        }
        if line.contains("packet loss") {
            loss = line
                .split(',')
                .find(|part| part.contains("packet loss"))
                .and_then(|part| part.split_whitespace().next())
                .and_then(|token| token.trim_end_matches('%').parse::<f64>().ok());
        }
    }

    match loss {
        Some(packet_loss) => Ok(LatencyReading {
            latency_samples: samples,
            packet_loss: packet_loss.clamp(0.0, 100.0),
        }),
        None if !samples.is_empty() => Ok(LatencyReading {
            latency_samples: samples,
            packet_loss: 0.0,
        }),
        None => Err(CollectorError::Parse {
            collector: COLLECTOR,
            reason: "no replies and no summary line".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPUTILS: &str = "\
PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=23.4 ms
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=25.1 ms
64 bytes from 8.8.8.8: icmp_seq=4 ttl=117 time=22.0 ms

--- 8.8.8.8 ping statistics ---
4 packets transmitted, 3 received, 25% packet loss, time 3004ms
rtt min/avg/max/mdev = 22.012/23.500/25.100/1.270 ms
";

    const BUSYBOX_DOWN: &str = "\
PING 10.0.0.1 (10.0.0.1): 56 data bytes

--- 10.0.0.1 ping statistics ---
5 packets transmitted, 0 packets received, 100% packet loss
";

    #[test]
    fn test_parse_iputils() {
        let reading = parse_ping_output(IPUTILS).unwrap();
        assert_eq!(reading.latency_samples, vec![23.4, 25.1, 22.0]);
        assert_eq!(reading.packet_loss, 25.0);
    }

    #[test]
    fn test_parse_total_loss() {
        let reading = parse_ping_output(BUSYBOX_DOWN).unwrap();
        assert!(reading.latency_samples.is_empty());
        assert_eq!(reading.packet_loss, 100.0);
        assert_eq!(reading.average(), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_ping_output("ping: unknown host"),
            Err(CollectorError::Parse { .. })
        ));
    }
}
