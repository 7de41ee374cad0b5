// NetForensics Daemon - Simulated collectors
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Collectors backed by the seeded link simulator, for demos and tests.

use netforensics::{
    CollectorError, LatencyReading, NetworkProbe, RadioReading, TelemetrySource,
    ThroughputReading,
};
use netforensics_sim::{LinkSimulator, Scenario, SimConfig, Timeline};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct LinkState {
    sim: LinkSimulator,
    timeline: Option<Timeline>,
}

/// Simulator shared by the modem and the probe so both see the same link.
#[derive(Debug, Clone)]
pub struct SimLink {
    state: Arc<Mutex<LinkState>>,
}

impl SimLink {
    pub fn new(config: SimConfig, scenario: Scenario) -> Self {
        Self {
            state: Arc::new(Mutex::new(LinkState {
                sim: LinkSimulator::new(config, scenario),
                timeline: None,
            })),
        }
    }

    /// Follow `timeline`, looping when it runs out.
    pub fn with_timeline(self, timeline: Timeline) -> Self {
        if !timeline.is_empty() {
            self.lock().timeline = Some(timeline);
        }
        self
    }

    pub fn scenario(&self) -> Scenario {
        self.lock().sim.scenario()
    }

    pub fn modem(&self) -> SimulatedModem {
        SimulatedModem { link: self.clone() }
    }

    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe { link: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Simulated modem telemetry. Each fetch is one cycle of the link.
#[derive(Debug, Clone)]
pub struct SimulatedModem {
    link: SimLink,
}

impl TelemetrySource for SimulatedModem {
    fn name(&self) -> &'static str {
        "sim-modem"
    }

    async fn fetch(&self) -> Result<RadioReading, CollectorError> {
        let mut state = self.link.lock();
        let LinkState { sim, timeline } = &mut *state;
        if let Some(timeline) = timeline.as_ref() {
            let next = timeline
                .scenario_at(sim.cycle() % timeline.len())
                .unwrap_or_default();
            if next != sim.scenario() {
                sim.set_scenario(next);
            }
        }
        let reading = sim.radio();
        sim.advance();
        Ok(reading)
    }
}

/// Simulated ping and download probe.
#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    link: SimLink,
}

impl NetworkProbe for SimulatedProbe {
    fn name(&self) -> &'static str {
        "sim-probe"
    }

    async fn measure_latency(&self) -> Result<LatencyReading, CollectorError> {
        Ok(self.link.lock().sim.latency())
    }

    async fn measure_throughput(&self) -> Result<ThroughputReading, CollectorError> {
        Ok(self.link.lock().sim.throughput())
    }
}
