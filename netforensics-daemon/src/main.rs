// NetForensics Daemon - Collection daemon and HTTP API
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # NetForensics Daemon
//!
//! Polls the modem and the network on a fixed interval, classifies every
//! cycle and serves the results over HTTP/JSON and Prometheus.
//!
//! ## Usage
//!
//! ```bash
//! # Simulated link that turns shaped after a clean start
//! netforensics --source sim --scenario policy --seed 42
//!
//! # Real link: ping for latency, HTTP download for throughput
//! netforensics --source null --ping-host 1.1.1.1 \
//!     --download-url https://speed.example.net/10MB.bin --port 8080
//! ```

mod app;
mod collectors;
mod metrics;
mod persist;
mod producer;
mod routes;

use app::AppState;
use clap::{Parser, ValueEnum};
use collectors::{HttpProbe, HttpProbeConfig, Modem, NetProbe, NullModem, PingProbe, Prober};
use netforensics::{EngineConfig, VERSION};
use persist::{spawn_writer, HistoryLog};
use producer::{Producer, Timeouts};
use routes::router;
use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "sim")]
use collectors::SimLink;
#[cfg(feature = "sim")]
use netforensics_sim::{Scenario, SimConfig, Timeline};

/// Where readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// No modem telemetry; system ping and HTTP download probes
    Null,
    /// Seeded simulated link for both telemetry and probes
    Sim,
}

/// NetForensics cellular link monitor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Directory for the CSV history log
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Keep history in memory only
    #[arg(long)]
    no_persist: bool,

    /// Seconds between collection cycles
    #[arg(short, long, default_value = "10")]
    interval_secs: u64,

    /// Telemetry and probe source
    #[arg(short, long, value_enum, default_value = "sim")]
    source: Source,

    /// Simulated condition (clean, radio, congestion, policy)
    #[arg(long, default_value = "clean")]
    scenario: String,

    /// JSON timeline of simulated phases, looped
    #[arg(long)]
    timeline: Option<PathBuf>,

    /// Random seed for the simulated link
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated handover every N cycles
    #[arg(long)]
    handover_every: Option<usize>,

    /// Host pinged for latency
    #[arg(long, default_value = "8.8.8.8")]
    ping_host: String,

    /// URL streamed by the throughput probe
    #[arg(long)]
    download_url: Option<String>,

    /// URL receiving the upload probe
    #[arg(long)]
    upload_url: Option<String>,

    /// Telemetry fetch timeout in seconds
    #[arg(long, default_value = "5")]
    telemetry_timeout_secs: u64,

    /// Ping burst timeout in seconds
    #[arg(long, default_value = "10")]
    latency_timeout_secs: u64,

    /// Throughput probe timeout in seconds
    #[arg(long, default_value = "30")]
    throughput_timeout_secs: u64,

    /// Engine configuration (JSON); missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write-behind queue length
    #[arg(long, default_value = "1024")]
    queue_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("NetForensics v{}", VERSION);

    let config = load_config(args.config.as_deref())?;
    let state = Arc::new(AppState::new(config));
    let (modem, prober) = build_collectors(&args)?;

    let timeouts = Timeouts {
        telemetry: Duration::from_secs(args.telemetry_timeout_secs.max(1)),
        latency: Duration::from_secs(args.latency_timeout_secs.max(1)),
        throughput: Duration::from_secs(args.throughput_timeout_secs.max(1)),
    };
    let mut producer = Producer::new(modem, prober, Arc::clone(&state)).with_timeouts(timeouts);

    let writer = if args.no_persist {
        info!("Persistence disabled, history is in-memory only");
        None
    } else {
        let log = HistoryLog::open(&args.data_dir)?;
        if let Err(e) = producer.warm_start(&log) {
            warn!("Could not reload history from {}: {}", log.dir().display(), e);
        }
        let (handle, writer) = spawn_writer(log, args.queue_size);
        producer = producer.with_persist(handle);
        Some(writer)
    };

    // Start the producer in background
    let (stop_tx, stop_rx) = watch::channel(false);
    let interval = Duration::from_secs(args.interval_secs.max(1));
    let producer_task = tokio::spawn(producer.run(interval, stop_rx));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The producer owns the persist handle; once it exits the writer drains
    let _ = stop_tx.send(true);
    if let Err(e) = producer_task.await {
        warn!("Producer task ended abnormally: {}", e);
    }
    if let Some(writer) = writer {
        writer.await?;
    }
    info!("Shutdown complete");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let config = EngineConfig::from_json(&json)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn build_collectors(args: &Args) -> Result<(Modem, Prober), Box<dyn Error>> {
    match args.source {
        Source::Null => {
            let http = match args.download_url.as_deref() {
                Some(url) => {
                    let mut config = HttpProbeConfig::new(url);
                    config.upload_url = args.upload_url.clone();
                    Some(HttpProbe::new(config)?)
                }
                None => {
                    warn!("No --download-url given, throughput probes will fail");
                    None
                }
            };
            info!("Source: null modem, pinging {}", args.ping_host);
            Ok((
                Modem::Null(NullModem),
                Prober::Net(NetProbe {
                    ping: PingProbe::new(args.ping_host.as_str()),
                    http,
                }),
            ))
        }
        #[cfg(feature = "sim")]
        Source::Sim => {
            let scenario: Scenario = args.scenario.parse()?;
            let mut sim = SimConfig::new();
            if let Some(seed) = args.seed {
                sim = sim.with_seed(seed);
            }
            if let Some(every) = args.handover_every {
                sim = sim.with_handover_every(every);
            }
            let mut link = SimLink::new(sim, scenario);
            if let Some(path) = args.timeline.as_deref() {
                let timeline = Timeline::from_json_file(path)?;
                info!("Following timeline of {} cycles from {}", timeline.len(), path.display());
                link = link.with_timeline(timeline);
            }
            info!("Source: simulated link ({})", scenario);
            Ok((Modem::Sim(link.modem()), Prober::Sim(link.probe())))
        }
        #[cfg(not(feature = "sim"))]
        Source::Sim => Err("this build has no simulator; rebuild with --features sim".into()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
