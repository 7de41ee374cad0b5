// NetForensics Daemon - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for link monitoring.
//!
//! Every gauge mirrors a field of the latest sample; counters track the
//! producer loop itself.

use lazy_static::lazy_static;
use netforensics::{ProbeReason, Sample};
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};

lazy_static! {
    // ============================================================
    // Link Metrics (from the latest Sample)
    // ============================================================

    /// Composite signal score (0-100).
    pub static ref SIGNAL_SCORE: Gauge = register_gauge!(
        "netforensics_signal_score",
        "Composite radio signal score (0-100)"
    ).unwrap();

    /// Policy Suspicion Index (0-100).
    pub static ref PSI: Gauge = register_gauge!(
        "netforensics_psi",
        "Policy Suspicion Index (0-100)"
    ).unwrap();

    /// Raw radio metrics (labeled by metric).
    pub static ref RADIO: GaugeVec = register_gauge_vec!(
        "netforensics_radio",
        "Raw radio metrics (sinr/rsrq in dB, rsrp in dBm)",
        &["metric"]
    ).unwrap();

    /// Last measured throughput (labeled by direction).
    pub static ref THROUGHPUT_MBPS: GaugeVec = register_gauge_vec!(
        "netforensics_throughput_mbps",
        "Last measured throughput in Mbps",
        &["direction"]
    ).unwrap();

    pub static ref RAMP_UP_RATIO: Gauge = register_gauge!(
        "netforensics_ramp_up_ratio",
        "Initial over sustained download rate"
    ).unwrap();

    pub static ref LATENCY_MS: Gauge = register_gauge!(
        "netforensics_latency_ms",
        "Average idle round-trip time in ms"
    ).unwrap();

    pub static ref JITTER_MS: Gauge = register_gauge!(
        "netforensics_jitter_ms",
        "Round-trip time standard deviation in ms"
    ).unwrap();

    pub static ref PACKET_LOSS_PCT: Gauge = register_gauge!(
        "netforensics_packet_loss_percent",
        "Ping loss in percent"
    ).unwrap();

    pub static ref LATENCY_UNDER_LOAD_MS: Gauge = register_gauge!(
        "netforensics_latency_under_load_ms",
        "Mean RTT during the last transfer minus idle RTT in ms"
    ).unwrap();

    /// Probe data spent over the rolling month.
    pub static ref MONTHLY_USAGE_BYTES: Gauge = register_gauge!(
        "netforensics_monthly_usage_bytes",
        "Bytes moved by throughput probes over the last 30 days"
    ).unwrap();

    /// Root-cause likelihoods (labeled by cause).
    pub static ref CAUSE_PROBABILITY: GaugeVec = register_gauge_vec!(
        "netforensics_cause_probability",
        "Likelihood of each root cause (0-1)",
        &["cause"]
    ).unwrap();

    // ============================================================
    // Producer Metrics
    // ============================================================

    /// Samples produced (labeled by verdict).
    pub static ref SAMPLES_TOTAL: CounterVec = register_counter_vec!(
        "netforensics_samples_total",
        "Samples produced by verdict",
        &["verdict"]
    ).unwrap();

    /// Failed or timed-out collector calls (labeled by collector).
    pub static ref COLLECTOR_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "netforensics_collector_failures_total",
        "Collector calls that failed or timed out",
        &["collector"]
    ).unwrap();

    /// Throughput probes run (labeled by reason).
    pub static ref PROBES_TOTAL: CounterVec = register_counter_vec!(
        "netforensics_throughput_probes_total",
        "Throughput probes run by scheduling reason",
        &["reason"]
    ).unwrap();

    /// Rows dropped because the writer fell behind.
    pub static ref PERSIST_DROPPED_TOTAL: Counter = register_counter!(
        "netforensics_persist_dropped_total",
        "History rows dropped because the write-behind queue was full"
    ).unwrap();

    pub static ref HISTORY_SAMPLES: Gauge = register_gauge!(
        "netforensics_history_samples",
        "Samples held in the in-memory history"
    ).unwrap();
}

/// Update link gauges from a freshly produced sample.
pub fn update_sample_metrics(sample: &Sample) {
    SIGNAL_SCORE.set(sample.score);
    PSI.set(sample.psi);
    for (metric, value) in [
        ("sinr", sample.sinr),
        ("rsrq", sample.rsrq),
        ("rsrp", sample.rsrp),
    ] {
        match value {
            Some(v) => RADIO.with_label_values(&[metric]).set(v),
            None => {
                let _ = RADIO.remove_label_values(&[metric]);
            }
        }
    }
    THROUGHPUT_MBPS
        .with_label_values(&["down"])
        .set(sample.down_mbps);
    THROUGHPUT_MBPS.with_label_values(&["up"]).set(sample.up_mbps);
    RAMP_UP_RATIO.set(sample.ramp_up_ratio);
    LATENCY_MS.set(sample.latency_avg);
    JITTER_MS.set(sample.jitter);
    PACKET_LOSS_PCT.set(sample.packet_loss);
    LATENCY_UNDER_LOAD_MS.set(sample.latency_diff);
    MONTHLY_USAGE_BYTES.set(sample.monthly_bytes as f64);
    CAUSE_PROBABILITY
        .with_label_values(&["radio"])
        .set(sample.radio_prob);
    CAUSE_PROBABILITY
        .with_label_values(&["congestion"])
        .set(sample.congestion_prob);
    CAUSE_PROBABILITY
        .with_label_values(&["policy"])
        .set(sample.policy_prob);
    SAMPLES_TOTAL
        .with_label_values(&[verdict_label(sample)])
        .inc();
}

/// Count a collector failure.
pub fn record_collector_failure(collector: &str) {
    COLLECTOR_FAILURES_TOTAL
        .with_label_values(&[collector])
        .inc();
}

/// Count a scheduled throughput probe.
pub fn record_probe(reason: ProbeReason) {
    let label = match reason {
        ProbeReason::Initial => "initial",
        ProbeReason::Baseline => "baseline",
        ProbeReason::PsiTrigger => "psi_trigger",
    };
    PROBES_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_persist_drop() {
    PERSIST_DROPPED_TOTAL.inc();
}

pub fn set_history_len(len: usize) {
    HISTORY_SAMPLES.set(len as f64);
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

fn verdict_label(sample: &Sample) -> &'static str {
    use netforensics::Verdict;
    match sample.verdict {
        Verdict::Policy => "policy",
        Verdict::Congestion => "congestion",
        Verdict::Radio => "radio",
        Verdict::Inconclusive => "inconclusive",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use netforensics::{CycleInput, EngineConfig, Pipeline};

    #[test]
    fn test_encode_metrics() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let sample = pipeline.process(CycleInput::default(), Utc::now());
        update_sample_metrics(&sample);
        record_probe(ProbeReason::Initial);

        let output = encode_metrics();
        assert!(output.contains("netforensics_signal_score"));
        assert!(output.contains("netforensics_cause_probability"));
        assert!(output.contains("netforensics_throughput_probes_total"));
        assert!(output.contains("netforensics_monthly_usage_bytes"));
    }

    #[test]
    fn test_verdict_label() {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let sample = pipeline.process(CycleInput::default(), Utc::now());
        assert_eq!(verdict_label(&sample), "inconclusive");
    }
}
