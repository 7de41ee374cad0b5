// NetForensics Daemon - HTTP throughput probe
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Throughput probe: streams a download for a fixed window and reports the
//! rate over the opening slice, over the whole transfer, and per half-second
//! interval for the curve shape. A ping burst runs alongside to capture
//! latency under load.

use super::ping::PingProbe;
use netforensics::{CollectorError, ThroughputReading};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const COLLECTOR: &str = "http";
/// Bucket width of the per-interval rate curve.
pub const RATE_INTERVAL: Duration = Duration::from_millis(500);

/// HTTP probe settings.
#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    pub download_url: String,
    pub upload_url: Option<String>,
    /// Transfer window; the download is cut off after this.
    pub duration: Duration,
    /// Opening slice used for the initial rate.
    pub initial_window: Duration,
    pub upload_bytes: usize,
}

impl HttpProbeConfig {
    pub fn new(download_url: impl Into<String>) -> Self {
        Self {
            download_url: download_url.into(),
            upload_url: None,
            duration: Duration::from_secs(10),
            initial_window: Duration::from_secs(2),
            upload_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Byte counts of one transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStats {
    pub total_bytes: u64,
    pub elapsed: Duration,
    pub initial_bytes: u64,
    pub initial_window: Duration,
    /// Bytes received in each [`RATE_INTERVAL`] bucket
    pub interval_bytes: Vec<u64>,
}

impl TransferStats {
    /// Count `bytes` received `at` into the transfer.
    pub fn record(&mut self, bytes: u64, at: Duration) {
        self.total_bytes += bytes;
        if at <= self.initial_window {
            self.initial_bytes = self.total_bytes;
        }
        let bucket = (at.as_millis() / RATE_INTERVAL.as_millis()) as usize;
        if self.interval_bytes.len() <= bucket {
            self.interval_bytes.resize(bucket + 1, 0);
        }
        self.interval_bytes[bucket] += bytes;
    }

    /// Rate of each complete interval. A trailing partial bucket is dropped.
    pub fn rate_samples(&self) -> Vec<f64> {
        let complete = (self.elapsed.as_millis() / RATE_INTERVAL.as_millis()) as usize;
        self.interval_bytes
            .iter()
            .take(complete)
            .map(|bytes| *bytes as f64 * 8.0 / (RATE_INTERVAL.as_secs_f64() * 1_000_000.0))
            .collect()
    }

    /// Rate over the whole transfer.
    pub fn sustained_mbps(&self) -> f64 {
        mbps(self.total_bytes, self.elapsed)
    }

    /// Rate over the opening slice.
    pub fn initial_mbps(&self) -> f64 {
        mbps(self.initial_bytes, self.initial_window.min(self.elapsed))
    }
}

fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(0.1);
    (bytes as f64 * 8.0) / (secs * 1_000_000.0)
}

/// Download/upload throughput probe.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    config: HttpProbeConfig,
}

impl HttpProbe {
    pub fn new(config: HttpProbeConfig) -> Result<Self, CollectorError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("netforensics/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(unavailable)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpProbeConfig {
        &self.config
    }

    /// Run the download (and upload, if configured), pinging with `ping`
    /// while the download is in flight.
    pub async fn download(
        &self,
        ping: Option<&PingProbe>,
    ) -> Result<ThroughputReading, CollectorError> {
        let (stats, loaded) = match ping {
            Some(ping) => {
                let (stats, loaded) = tokio::join!(self.transfer(), ping.ping());
                (stats?, loaded.ok())
            }
            None => (self.transfer().await?, None),
        };

        let (up_mbps, up_bytes) = match self.config.upload_url.as_deref() {
            Some(url) => match self.upload(url).await {
                Ok(rate) => (rate, self.config.upload_bytes as u64),
                Err(e) => {
                    warn!("Upload probe failed: {}", e);
                    (0.0, 0)
                }
            },
            None => (0.0, 0),
        };

        debug!(
            "download {} bytes in {:?} ({} bytes in opening slice)",
            stats.total_bytes, stats.elapsed, stats.initial_bytes
        );
        Ok(ThroughputReading {
            down_mbps: stats.sustained_mbps(),
            down_mbps_initial: stats.initial_mbps(),
            up_mbps,
            latency_samples: loaded.map(|l| l.latency_samples).unwrap_or_default(),
            rate_samples: stats.rate_samples(),
            total_bytes: stats.total_bytes + up_bytes,
        })
    }

    async fn transfer(&self) -> Result<TransferStats, CollectorError> {
        let start = Instant::now();
        let deadline = start + self.config.duration;
        let mut response = self
            .client
            .get(&self.config.download_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?;

        let mut stats = TransferStats {
            initial_window: self.config.initial_window,
            ..Default::default()
        };
        loop {
            let chunk = match tokio::time::timeout_at(deadline, response.chunk()).await {
                Ok(chunk) => chunk.map_err(unavailable)?,
                Err(_) => break,
            };
            let Some(bytes) = chunk else { break };
            stats.record(bytes.len() as u64, start.elapsed());
        }
        stats.elapsed = start.elapsed();

        if stats.total_bytes == 0 {
            return Err(CollectorError::Unavailable {
                collector: COLLECTOR,
                reason: "download returned no data".to_string(),
            });
        }
        Ok(stats)
    }

    async fn upload(&self, url: &str) -> Result<f64, CollectorError> {
        let body = vec![0u8; self.config.upload_bytes];
        let start = Instant::now();
        self.client
            .post(url)
            .timeout(self.config.duration)
            .body(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?;
        Ok(mbps(self.config.upload_bytes as u64, start.elapsed()))
    }
}

fn unavailable(e: reqwest::Error) -> CollectorError {
    CollectorError::Unavailable {
        collector: COLLECTOR,
        reason: e.to_string(),
    }
}
