// NetForensics Sim - Link scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Link scenarios and timelines.
//!
//! A [`Scenario`] names one link condition and maps to a [`LinkProfile`]
//! of distribution parameters. A [`Timeline`] strings scenarios together
//! so a single trace can move from a clean link into an impairment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Simulator errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Scenario name not recognized.
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// Timeline file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeline file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Link condition being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Good signal, throughput matches it, steady latency.
    #[default]
    Clean,
    /// Weak signal; throughput low but in line with the signal.
    RadioImpairment,
    /// Good signal; latency, jitter and loss inflate, throughput sags.
    Congestion,
    /// Good signal; fast start then a hard throughput ceiling.
    PolicyShaping,
}

impl Scenario {
    /// All scenarios.
    pub const ALL: [Scenario; 4] = [
        Scenario::Clean,
        Scenario::RadioImpairment,
        Scenario::Congestion,
        Scenario::PolicyShaping,
    ];

    /// Short name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::RadioImpairment => "radio",
            Self::Congestion => "congestion",
            Self::PolicyShaping => "policy",
        }
    }

    /// Distribution parameters for this scenario.
    pub fn profile(&self) -> LinkProfile {
        let clean = LinkProfile::default();
        match self {
            Self::Clean => clean,
            Self::RadioImpairment => LinkProfile {
                sinr_db: (-4.0, 2.0),
                rsrq_db: (-17.0, 1.0),
                rsrp_dbm: (-114.0, 3.0),
                latency_ms: (70.0, 12.0),
                loss_pct: 1.0,
                down_initial_mbps: (5.2, 0.4),
                down_sustained_mbps: (5.0, 0.4),
                up_mbps: (0.8, 0.2),
                climb: false,
            },
            Self::Congestion => LinkProfile {
                latency_ms: (180.0, 40.0),
                loss_pct: 3.0,
                down_initial_mbps: (14.5, 1.5),
                down_sustained_mbps: (14.0, 1.5),
                up_mbps: (2.0, 0.5),
                climb: true,
                ..clean
            },
            Self::PolicyShaping => LinkProfile {
                down_initial_mbps: (22.0, 1.0),
                down_sustained_mbps: (4.0, 0.3),
                up_mbps: (1.0, 0.1),
                ..clean
            },
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clean" => Ok(Self::Clean),
            "radio" | "radio_impairment" => Ok(Self::RadioImpairment),
            "congestion" => Ok(Self::Congestion),
            "policy" | "policy_shaping" => Ok(Self::PolicyShaping),
            other => Err(SimError::UnknownScenario(other.to_string())),
        }
    }
}

/// Gaussian parameters (mean, std) for each simulated quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkProfile {
    pub sinr_db: (f64, f64),
    pub rsrq_db: (f64, f64),
    pub rsrp_dbm: (f64, f64),
    pub latency_ms: (f64, f64),
    /// Probability (percent) that a single ping is lost.
    pub loss_pct: f64,
    pub down_initial_mbps: (f64, f64),
    pub down_sustained_mbps: (f64, f64),
    pub up_mbps: (f64, f64),
    /// Transfer rate keeps climbing instead of settling.
    #[serde(default)]
    pub climb: bool,
}

impl Default for LinkProfile {
    fn default() -> Self {
        Self {
            sinr_db: (22.0, 2.0),
            rsrq_db: (-7.0, 1.0),
            rsrp_dbm: (-80.0, 3.0),
            latency_ms: (35.0, 3.0),
            loss_pct: 0.0,
            down_initial_mbps: (25.0, 1.5),
            down_sustained_mbps: (24.0, 1.5),
            up_mbps: (6.0, 0.8),
            climb: false,
        }
    }
}

/// One stretch of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub scenario: Scenario,
    pub cycles: usize,
}

/// Sequence of scenarios, each held for a number of cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub phases: Vec<Phase>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single scenario for `cycles` cycles.
    pub fn constant(scenario: Scenario, cycles: usize) -> Self {
        Self::new().then(scenario, cycles)
    }

    /// Append a phase.
    pub fn then(mut self, scenario: Scenario, cycles: usize) -> Self {
        self.phases.push(Phase { scenario, cycles });
        self
    }

    /// Total number of cycles.
    pub fn len(&self) -> usize {
        self.phases.iter().map(|p| p.cycles).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scenario active at `cycle`, `None` past the end.
    pub fn scenario_at(&self, cycle: usize) -> Option<Scenario> {
        let mut start = 0;
        for phase in &self.phases {
            if cycle < start + phase.cycles {
                return Some(phase.scenario);
            }
            start += phase.cycles;
        }
        None
    }

    /// First cycle of the `index`-th phase.
    pub fn phase_start(&self, index: usize) -> usize {
        self.phases.iter().take(index).map(|p| p.cycles).sum()
    }

    /// Load a timeline from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save the timeline to a JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
