// NetForensics Sim - Link generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Seeded generator of collector readings.
//!
//! [`LinkSimulator`] draws radio, latency and throughput readings from the
//! active [`Scenario`]'s profile. The same seed always yields the same
//! readings.

use crate::scenario::{LinkProfile, Scenario};
use netforensics::{CellIdentity, CycleInput, LatencyReading, RadioReading, ThroughputReading};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Half-second rate intervals per simulated transfer.
pub const RATE_INTERVALS: usize = 20;
/// Opening intervals that run at the initial rate.
const SLOW_START_INTERVALS: usize = 4;
const RATE_INTERVAL_SECS: f64 = 0.5;

/// Simulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Pings per latency burst.
    pub pings_per_burst: usize,
    /// Serving-cell change every N cycles (`None` = never).
    pub handover_every: Option<usize>,
    /// Cells to rotate through on handover.
    pub cells: Vec<CellIdentity>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            pings_per_burst: 5,
            handover_every: None,
            cells: vec![
                CellIdentity::new("B3", "101", "51234"),
                CellIdentity::new("B20", "212", "51234"),
                CellIdentity::new("B7", "37", "60211"),
            ],
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pings_per_burst(mut self, n: usize) -> Self {
        self.pings_per_burst = n.max(1);
        self
    }

    pub fn with_handover_every(mut self, cycles: usize) -> Self {
        self.handover_every = Some(cycles.max(1));
        self
    }
}

/// Seeded source of collector readings.
#[derive(Debug, Clone)]
pub struct LinkSimulator {
    config: SimConfig,
    rng: StdRng,
    scenario: Scenario,
    profile: LinkProfile,
    cycle: usize,
}

impl LinkSimulator {
    pub fn new(config: SimConfig, scenario: Scenario) -> Self {
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            scenario,
            profile: scenario.profile(),
            cycle: 0,
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Switch condition; the random stream continues.
    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
        self.profile = scenario.profile();
    }

    /// Cycles generated so far.
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Serving cell at the current cycle.
    pub fn serving_cell(&self) -> CellIdentity {
        let cells = &self.config.cells;
        if cells.is_empty() {
            return CellIdentity::unknown();
        }
        let idx = match self.config.handover_every {
            Some(every) => (self.cycle / every.max(1)) % cells.len(),
            None => 0,
        };
        cells[idx].clone()
    }

    /// Modem telemetry reading.
    pub fn radio(&mut self) -> RadioReading {
        let cell = self.serving_cell();
        RadioReading {
            sinr: Some(round1(self.draw(self.profile.sinr_db))),
            rsrq: Some(round1(self.draw(self.profile.rsrq_db))),
            rsrp: Some(round1(self.draw(self.profile.rsrp_dbm))),
            band: Some(cell.band),
            pci: Some(cell.pci),
            enodeb: Some(cell.enodeb),
        }
    }

    /// Idle ping burst.
    pub fn latency(&mut self) -> LatencyReading {
        let n = self.config.pings_per_burst.max(1);
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            if self.rng.gen::<f64>() * 100.0 < self.profile.loss_pct {
                continue;
            }
            samples.push(round1(self.draw(self.profile.latency_ms).max(1.0)));
        }
        LatencyReading {
            packet_loss: 100.0 * (n - samples.len()) as f64 / n as f64,
            latency_samples: samples,
        }
    }

    /// Throughput transfer with under-load RTTs and its rate curve.
    pub fn throughput(&mut self) -> ThroughputReading {
        let down = self.draw(self.profile.down_sustained_mbps).max(0.1);
        let initial = self.draw(self.profile.down_initial_mbps).max(0.1);
        let up = self.draw(self.profile.up_mbps).max(0.05);
        let (mean, std) = self.profile.latency_ms;
        let loaded = (0..3)
            .map(|_| round1(self.draw((mean * 1.5, std * 2.0)).max(1.0)))
            .collect();
        let rates = self.rate_curve(initial, down);
        let total_bytes = rates
            .iter()
            .map(|r| (r * 1_000_000.0 / 8.0 * RATE_INTERVAL_SECS) as u64)
            .sum();
        ThroughputReading {
            down_mbps: round2(down),
            down_mbps_initial: round2(initial),
            up_mbps: round2(up),
            latency_samples: loaded,
            rate_samples: rates,
            total_bytes,
        }
    }

    /// Per-interval rates: slow start at `initial`, then flat around `down`,
    /// or a steady climb through `down` on a climbing profile.
    fn rate_curve(&mut self, initial: f64, down: f64) -> Vec<f64> {
        let (_, initial_std) = self.profile.down_initial_mbps;
        let (_, std) = self.profile.down_sustained_mbps;
        let last = (RATE_INTERVALS - 1) as f64;
        (0..RATE_INTERVALS)
            .map(|i| {
                let rate = if self.profile.climb {
                    let level = down * (0.4 + 1.2 * i as f64 / last);
                    self.draw((level, std * 0.5))
                } else if i < SLOW_START_INTERVALS {
                    self.draw((initial, initial_std))
                } else {
                    self.draw((down, std))
                };
                round2(rate.max(0.0))
            })
            .collect()
    }

    /// Everything one cycle would collect; advances the cycle counter.
    pub fn next_cycle(&mut self, with_throughput: bool) -> CycleInput {
        let input = CycleInput {
            radio: Some(self.radio()),
            latency: Some(self.latency()),
            throughput: with_throughput.then(|| self.throughput()),
            degraded: false,
        };
        self.advance();
        input
    }

    /// Move to the next cycle (handover clock).
    pub fn advance(&mut self) {
        self.cycle += 1;
    }

    fn draw(&mut self, (mean, std): (f64, f64)) -> f64 {
        match Normal::new(mean, std.max(0.0)) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
