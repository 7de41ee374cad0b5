// NetForensics Daemon - Collectors
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reference collector implementations.
//!
//! [`Modem`] and [`Prober`] dispatch to the concrete collector picked on
//! the command line.

mod http;
mod null;
mod ping;
#[cfg(feature = "sim")]
mod sim;

pub use http::{HttpProbe, HttpProbeConfig};
pub use null::NullModem;
pub use ping::PingProbe;
#[cfg(feature = "sim")]
pub use sim::{SimLink, SimulatedModem, SimulatedProbe};

use netforensics::{
    CollectorError, LatencyReading, NetworkProbe, RadioReading, TelemetrySource,
    ThroughputReading,
};

/// Telemetry source selected at startup.
#[derive(Debug, Clone)]
pub enum Modem {
    Null(NullModem),
    #[cfg(feature = "sim")]
    Sim(SimulatedModem),
}

impl TelemetrySource for Modem {
    fn name(&self) -> &'static str {
        match self {
            Self::Null(m) => m.name(),
            #[cfg(feature = "sim")]
            Self::Sim(m) => m.name(),
        }
    }

    async fn fetch(&self) -> Result<RadioReading, CollectorError> {
        match self {
            Self::Null(m) => m.fetch().await,
            #[cfg(feature = "sim")]
            Self::Sim(m) => m.fetch().await,
        }
    }
}

/// Ping for latency, HTTP download for throughput.
#[derive(Debug, Clone)]
pub struct NetProbe {
    pub ping: PingProbe,
    pub http: Option<HttpProbe>,
}

impl NetworkProbe for NetProbe {
    fn name(&self) -> &'static str {
        "net"
    }

    async fn measure_latency(&self) -> Result<LatencyReading, CollectorError> {
        self.ping.ping().await
    }

    async fn measure_throughput(&self) -> Result<ThroughputReading, CollectorError> {
        match &self.http {
            Some(http) => http.download(Some(&self.ping)).await,
            None => Err(CollectorError::Unavailable {
                collector: "http",
                reason: "no download URL configured".to_string(),
            }),
        }
    }
}

/// Network prober selected at startup.
#[derive(Debug, Clone)]
pub enum Prober {
    Net(NetProbe),
    #[cfg(feature = "sim")]
    Sim(SimulatedProbe),
}

impl NetworkProbe for Prober {
    fn name(&self) -> &'static str {
        match self {
            Self::Net(p) => p.name(),
            #[cfg(feature = "sim")]
            Self::Sim(p) => p.name(),
        }
    }

    async fn measure_latency(&self) -> Result<LatencyReading, CollectorError> {
        match self {
            Self::Net(p) => p.measure_latency().await,
            #[cfg(feature = "sim")]
            Self::Sim(p) => p.measure_latency().await,
        }
    }

    async fn measure_throughput(&self) -> Result<ThroughputReading, CollectorError> {
        match self {
            Self::Net(p) => p.measure_throughput().await,
            #[cfg(feature = "sim")]
            Self::Sim(p) => p.measure_throughput().await,
        }
    }
}
