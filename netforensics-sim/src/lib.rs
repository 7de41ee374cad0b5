// NetForensics Sim - Seeded cellular link simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # NetForensics Sim
//!
//! Seeded cellular link simulator for NetForensics. Produces modem
//! telemetry, ping bursts and throughput transfers for four link
//! conditions:
//!
//! - **Clean**: good signal, throughput in line with it
//! - **Radio impairment**: weak signal, low but explainable throughput
//! - **Congestion**: good signal, inflated latency, jitter and loss
//! - **Policy shaping**: good signal, fast start, hard ceiling
//!
//! ## Quick Start
//!
//! ```rust
//! use netforensics::{EngineConfig, Pipeline, Verdict};
//! use netforensics_sim::{Scenario, SimConfig, Timeline, Trace, TraceConfig};
//!
//! let config = TraceConfig {
//!     sim: SimConfig::new().with_seed(42),
//!     ..Default::default()
//! };
//! let trace = Trace::generate(&config, &Timeline::constant(Scenario::PolicyShaping, 10));
//!
//! let mut pipeline = Pipeline::new(&EngineConfig::default());
//! let samples = trace.run(&mut pipeline);
//! assert_eq!(samples.last().unwrap().verdict, Verdict::Policy);
//! ```

pub mod generator;
pub mod scenario;
pub mod trace;

// Re-exports for convenience
pub use generator::{LinkSimulator, SimConfig, RATE_INTERVALS};
pub use scenario::{LinkProfile, Phase, Scenario, SimError, Timeline};
pub use trace::{Trace, TraceConfig, TraceStep};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
