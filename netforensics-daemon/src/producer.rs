// NetForensics Daemon - Producer loop
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! The single producer task.
//!
//! Every tick it polls the collectors (each under its own timeout), runs
//! the pipeline, appends the sample to the history, publishes it and hands
//! it to the write-behind log. Collector failures are logged, counted and
//! replaced by neutral inputs; the loop itself never fails.

use crate::app::{AppState, LATENCY, TELEMETRY, THROUGHPUT};
use crate::metrics::{
    record_collector_failure, record_probe, set_history_len, update_sample_metrics,
};
use crate::persist::{HistoryLog, PersistError, PersistHandle, PersistMsg};
use chrono::{DateTime, Utc};
use netforensics::{
    CollectorError, CycleInput, NetworkProbe, Pipeline, ProbeScheduler, Sample, TelemetrySource,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Per-collector time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub telemetry: Duration,
    pub latency: Duration,
    pub throughput: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            telemetry: Duration::from_secs(5),
            latency: Duration::from_secs(10),
            throughput: Duration::from_secs(30),
        }
    }
}

/// Drives one telemetry source and one prober.
pub struct Producer<T, P> {
    source: T,
    probe: P,
    pipeline: Pipeline,
    scheduler: ProbeScheduler,
    state: Arc<AppState>,
    persist: Option<PersistHandle>,
    timeouts: Timeouts,
}

impl<T: TelemetrySource, P: NetworkProbe> Producer<T, P> {
    pub fn new(source: T, probe: P, state: Arc<AppState>) -> Self {
        Self {
            pipeline: Pipeline::new(&state.config),
            scheduler: ProbeScheduler::new(state.config.schedule.clone()),
            source,
            probe,
            state,
            persist: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Queue every sample and closed cell session to the history log.
    pub fn with_persist(mut self, handle: PersistHandle) -> Self {
        self.persist = Some(handle);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Reload the tail of the history log: fills the history store, rebuilds
    /// the pipeline's trend context, restores closed cell sessions and
    /// republishes the newest sample. Returns the number of samples loaded.
    pub fn warm_start(&mut self, log: &HistoryLog) -> Result<usize, PersistError> {
        let samples = log.load_recent(self.state.history.capacity())?;
        let sessions = log.load_sessions()?;

        self.pipeline.warm(&samples);
        self.state.cells_mut().restore(sessions);
        if let Some(last) = samples.last() {
            self.state.publisher.publish(last.clone());
        }
        let loaded = samples.len();
        self.state.history.extend(samples);
        set_history_len(self.state.history.len());

        info!("Warm start: {} samples restored from {}", loaded, log.dir().display());
        Ok(loaded)
    }

    /// Run one collection cycle stamped `now`.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Arc<Sample> {
        let (radio, latency) = tokio::join!(
            bounded(self.source.name(), self.timeouts.telemetry, self.source.fetch()),
            bounded(
                self.probe.name(),
                self.timeouts.latency,
                self.probe.measure_latency()
            ),
        );

        let mut degraded = false;
        let radio = settle(&self.state, TELEMETRY, radio, now, &mut degraded);
        let latency = settle(&self.state, LATENCY, latency, now, &mut degraded);

        let throughput = match self.scheduler.due(now, self.pipeline.last_psi()) {
            Some(reason) => {
                self.scheduler.record(now, reason);
                record_probe(reason);
                info!("Throughput probe ({})", reason);
                let result = bounded(
                    self.probe.name(),
                    self.timeouts.throughput,
                    self.probe.measure_throughput(),
                )
                .await;
                settle(&self.state, THROUGHPUT, result, now, &mut degraded)
            }
            None => None,
        };

        let input = CycleInput {
            radio,
            latency,
            throughput,
            degraded,
        };
        let sample = Arc::new(self.pipeline.process(input, now));

        let evicted = self.state.history.append(Arc::clone(&sample));
        if evicted > 0 {
            debug!("History full, evicted {} samples", evicted);
        }
        self.state.publisher.publish(Arc::clone(&sample));
        let closed = self.state.cells_mut().observe(&sample);

        update_sample_metrics(&sample);
        set_history_len(self.state.history.len());

        if let Some(persist) = &self.persist {
            if let Some(session) = closed {
                persist.send(PersistMsg::Session(session));
            }
            persist.send(PersistMsg::Sample(Arc::clone(&sample)));
        }

        debug!(
            "score={:.1} psi={:.1} ramp={:.2} verdict={}",
            sample.score,
            sample.psi,
            sample.ramp_up_ratio,
            sample.verdict.headline()
        );
        sample
    }

    /// Tick every `interval` until `shutdown` flips or its sender goes away.
    /// A cycle in progress is always completed.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Producer started: source={}, probe={}, every {:?}",
            self.source.name(),
            self.probe.name(),
            interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle(Utc::now()).await;
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("Producer stopped after {} cycles", self.pipeline.cycles());
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn scheduler(&self) -> &ProbeScheduler {
        &self.scheduler
    }
}

async fn bounded<R>(
    collector: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<R, CollectorError>>,
) -> Result<R, CollectorError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollectorError::Timeout {
            collector,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Record the outcome in the health monitor; failures become `None`.
fn settle<R>(
    state: &AppState,
    component: &str,
    result: Result<R, CollectorError>,
    now: DateTime<Utc>,
    degraded: &mut bool,
) -> Option<R> {
    match result {
        Ok(reading) => {
            state.health_mut().record_success(component, now);
            Some(reading)
        }
        Err(e) => {
            warn!("{} collector failed: {}", component, e);
            record_collector_failure(e.collector());
            state.health_mut().record_failure(component, &e, now);
            *degraded = true;
            None
        }
    }
}
