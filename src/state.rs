// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Latest-state publication
//!
//! Single-writer, many-reader cell holding the most recent [`Sample`].
//! Publishing swaps an `Arc`, so readers always see a complete sample and
//! never block the producer for longer than a pointer swap.

use crate::sample::Sample;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// What readers get back from [`StatePublisher::get_state`]
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    /// `None` until the first cycle completes
    pub sample: Option<Arc<Sample>>,
    /// Time since the publisher was created
    #[serde(rename = "uptime_secs", serialize_with = "as_secs")]
    pub uptime: Duration,
    /// Number of samples published so far
    pub published: u64,
}

/// Holder of the latest sample
#[derive(Debug)]
pub struct StatePublisher {
    inner: RwLock<Published>,
    started: Instant,
}

#[derive(Debug, Default)]
struct Published {
    latest: Option<Arc<Sample>>,
    count: u64,
}

impl StatePublisher {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Published::default()),
            started: Instant::now(),
        }
    }

    /// Replace the published sample
    pub fn publish(&self, sample: impl Into<Arc<Sample>>) {
        let sample = sample.into();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.latest = Some(sample);
        inner.count += 1;
    }

    pub fn get_state(&self) -> StateSnapshot {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        StateSnapshot {
            sample: inner.latest.clone(),
            uptime: self.started.elapsed(),
            published: inner.count,
        }
    }

    /// Shortcut for the latest sample only
    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .latest
            .clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Verdict;
    use crate::shape::Shape;
    use chrono::Utc;
    use std::thread;

    fn sample(score: f64) -> Sample {
        Sample {
            timestamp: Utc::now(),
            sinr: Some(10.0),
            rsrq: Some(-10.0),
            rsrp: Some(-95.0),
            band: "B1".to_string(),
            pci: "7".to_string(),
            enodeb: "1234".to_string(),
            down_mbps: 0.0,
            down_mbps_initial: 0.0,
            up_mbps: 0.0,
            latency_avg: 0.0,
            jitter: 0.0,
            packet_loss: 0.0,
            score,
            psi: 0.0,
            ramp_up_ratio: 1.0,
            radio_prob: 0.0,
            congestion_prob: 0.0,
            policy_prob: 0.0,
            verdict: Verdict::Inconclusive,
            latency_diff: 0.0,
            data_bytes: 0,
            monthly_bytes: 0,
            consistency: 0.0,
            shape: Shape::Uncertain,
            stable_hour: false,
            confident: true,
            degraded: false,
        }
    }

    #[test]
    fn test_empty_before_first_publish() {
        let publisher = StatePublisher::new();
        let state = publisher.get_state();
        assert!(state.sample.is_none());
        assert_eq!(state.published, 0);
    }

    #[test]
    fn test_publish_replaces_latest() {
        let publisher = StatePublisher::new();
        publisher.publish(sample(10.0));
        publisher.publish(sample(20.0));
        assert_eq!(publisher.latest().unwrap().score, 20.0);
        assert_eq!(publisher.get_state().published, 2);
    }

    #[test]
    fn test_readers_see_whole_samples() {
        let publisher = Arc::new(StatePublisher::new());
        let writer = {
            let publisher = Arc::clone(&publisher);
            thread::spawn(move || {
                for i in 0..500 {
                    let mut s = sample(i as f64);
                    s.psi = i as f64;
                    publisher.publish(s);
                }
            })
        };
        for _ in 0..500 {
            if let Some(s) = publisher.latest() {
                assert_eq!(s.score, s.psi);
            }
        }
        writer.join().unwrap();
        assert_eq!(publisher.latest().unwrap().score, 499.0);
    }

    #[test]
    fn test_snapshot_serializes_uptime_secs() {
        let publisher = StatePublisher::new();
        let json = serde_json::to_value(publisher.get_state()).unwrap();
        assert!(json["uptime_secs"].is_u64());
        assert!(json["sample"].is_null());
    }
}
