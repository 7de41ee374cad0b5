// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bounded trailing windows used for trend context.

use std::collections::VecDeque;

/// Running statistics for a single tracked field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl FieldStats {
    /// Population statistics over an iterator of values
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for v in values {
            count += 1;
            sum += v;
            sum_sq += v * v;
        }
        if count == 0 {
            return Self::default();
        }
        let n = count as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        Self {
            mean,
            std: variance.sqrt(),
            count,
        }
    }
}

/// Per-sample summary retained for classification context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowEntry {
    pub score: f64,
    pub psi: f64,
    /// `None` when no latency was measured for that cycle
    pub latency: Option<f64>,
    pub jitter: Option<f64>,
    /// The cycle was itself classified as congested
    pub congested: bool,
}

/// Last-N window of prior samples.
#[derive(Debug, Clone)]
pub struct TrailingWindow {
    entries: VecDeque<WindowEntry>,
    capacity: usize,
}

impl TrailingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add an entry, evicting the oldest when full
    pub fn push(&mut self, entry: WindowEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    /// Statistics of measured latencies in the window
    pub fn latency_stats(&self) -> FieldStats {
        FieldStats::from_values(self.entries.iter().filter_map(|e| e.latency))
    }

    /// Statistics of measured jitter in the window
    pub fn jitter_stats(&self) -> FieldStats {
        FieldStats::from_values(self.entries.iter().filter_map(|e| e.jitter))
    }

    /// Latency baseline: measured latencies of entries not themselves congested
    pub fn baseline_latency(&self) -> FieldStats {
        FieldStats::from_values(self.calm().filter_map(|e| e.latency))
    }

    /// Jitter baseline: measured jitter of entries not themselves congested
    pub fn baseline_jitter(&self) -> FieldStats {
        FieldStats::from_values(self.calm().filter_map(|e| e.jitter))
    }

    fn calm(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter().filter(|e| !e.congested)
    }

    /// Fraction of entries whose PSI exceeds `threshold`; 0 when empty
    pub fn psi_persistence(&self, threshold: f64) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let elevated = self.entries.iter().filter(|e| e.psi > threshold).count();
        elevated as f64 / self.entries.len() as f64
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Rolling latency observations from which jitter is derived.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    observations: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            observations: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record round-trip times; non-finite and negative values are ignored
    pub fn extend(&mut self, rtts_ms: &[f64]) {
        for &rtt in rtts_ms.iter().filter(|v| v.is_finite() && **v >= 0.0) {
            if self.observations.len() == self.capacity {
                self.observations.pop_front();
            }
            self.observations.push_back(rtt);
        }
    }

    /// Population standard deviation; 0 with fewer than two observations
    pub fn jitter(&self) -> f64 {
        if self.observations.len() < 2 {
            return 0.0;
        }
        FieldStats::from_values(self.observations.iter().copied()).std
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn entry(psi: f64, latency: Option<f64>) -> WindowEntry {
        WindowEntry {
            score: 80.0,
            psi,
            latency,
            jitter: latency.map(|l| l / 10.0),
            congested: false,
        }
    }

    #[test]
    fn test_field_stats() {
        let stats = FieldStats::from_values([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count, 8);
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.std, 2.0, epsilon = 1e-9);
        assert_eq!(FieldStats::from_values(std::iter::empty()).count, 0);
    }

    #[test]
    fn test_trailing_window_evicts_oldest() {
        let mut window = TrailingWindow::new(3);
        for i in 0..5 {
            window.push(entry(i as f64 * 10.0, None));
        }
        assert_eq!(window.len(), 3);
        let psis: Vec<f64> = window.iter().map(|e| e.psi).collect();
        assert_eq!(psis, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_latency_stats_skip_unmeasured() {
        let mut window = TrailingWindow::new(10);
        window.push(entry(0.0, Some(40.0)));
        window.push(entry(0.0, None));
        window.push(entry(0.0, Some(60.0)));
        let stats = window.latency_stats();
        assert_eq!(stats.count, 2);
        assert_relative_eq!(stats.mean, 50.0);
    }

    #[test]
    fn test_baseline_skips_congested_entries() {
        let mut window = TrailingWindow::new(10);
        window.push(entry(0.0, Some(40.0)));
        window.push(entry(0.0, Some(40.0)));
        window.push(WindowEntry {
            congested: true,
            ..entry(0.0, Some(200.0))
        });
        assert_relative_eq!(window.latency_stats().mean, 280.0 / 3.0);
        let baseline = window.baseline_latency();
        assert_eq!(baseline.count, 2);
        assert_relative_eq!(baseline.mean, 40.0);
        assert_relative_eq!(window.baseline_jitter().mean, 4.0);
    }

    #[test]
    fn test_psi_persistence() {
        let mut window = TrailingWindow::new(4);
        assert_relative_eq!(window.psi_persistence(50.0), 0.0);
        window.push(entry(10.0, None));
        window.push(entry(60.0, None));
        window.push(entry(70.0, None));
        window.push(entry(50.0, None));
        assert_relative_eq!(window.psi_persistence(50.0), 0.5);
    }

    #[test]
    fn test_latency_window_jitter() {
        let mut window = LatencyWindow::new(4);
        assert_relative_eq!(window.jitter(), 0.0);
        window.extend(&[10.0]);
        assert_relative_eq!(window.jitter(), 0.0);
        window.extend(&[20.0, f64::NAN, -1.0]);
        assert_eq!(window.len(), 2);
        assert_relative_eq!(window.jitter(), 5.0);
        window.extend(&[30.0, 30.0, 30.0, 30.0]);
        assert_relative_eq!(window.jitter(), 0.0);
    }
}
