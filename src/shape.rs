// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Throughput curve analysis
//!
//! A transfer is sampled as a series of per-interval rates. A shaper caps
//! the rate hard, so the steady part of the curve is flat (a plateau). A
//! congested path makes TCP creep upward instead (a linear climb).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fewer intervals than this carry no shape.
pub const MIN_SHAPE_SAMPLES: usize = 4;

/// Coefficient of variation of the steady state below which the curve is flat.
const PLATEAU_CV: f64 = 0.15;
/// Correlation of rate with time above which the curve is a climb.
const CLIMB_CORRELATION: f64 = 0.8;
/// Steady-state rates below this (Mbps) are too small to classify.
const MIN_RATE_MBPS: f64 = 0.1;

/// Shape of a throughput curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Flat steady state: the rate sits on a ceiling
    Plateau,
    /// Rate keeps rising through the transfer
    LinearClimb,
    /// Fast rise that levels off unevenly
    Logarithmic,
    /// Too few or too small samples
    #[default]
    Uncertain,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plateau => "plateau",
            Self::LinearClimb => "linear_climb",
            Self::Logarithmic => "logarithmic",
            Self::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a curve of per-interval rates (Mbps, oldest first).
///
/// The first quarter of the transfer is slow start and is left out of the
/// plateau test.
pub fn analyze_shape(rates: &[f64]) -> Shape {
    let rates = finite(rates);
    if rates.len() < MIN_SHAPE_SAMPLES {
        return Shape::Uncertain;
    }
    let steady = &rates[rates.len() / 4..];
    let Some(cv) = coefficient_of_variation(steady) else {
        return Shape::Uncertain;
    };
    if cv < PLATEAU_CV {
        return Shape::Plateau;
    }

    let (slope, correlation) = trend(&rates);
    if correlation > CLIMB_CORRELATION && slope > 0.0 {
        Shape::LinearClimb
    } else {
        Shape::Logarithmic
    }
}

/// Steadiness of the steady-state rate: `1 - 2·cv`, clamped to `0..=1`.
///
/// `None` when there are too few samples to judge.
pub fn consistency(rates: &[f64]) -> Option<f64> {
    let rates = finite(rates);
    if rates.len() < MIN_SHAPE_SAMPLES {
        return None;
    }
    let cv = coefficient_of_variation(&rates[rates.len() / 4..])?;
    Some((1.0 - 2.0 * cv).clamp(0.0, 1.0))
}

fn finite(rates: &[f64]) -> Vec<f64> {
    rates
        .iter()
        .copied()
        .filter(|r| r.is_finite() && *r >= 0.0)
        .collect()
}

/// Sample standard deviation over mean; `None` for near-zero means
fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean < MIN_RATE_MBPS {
        return None;
    }
    if values.len() < 2 {
        return Some(0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt() / mean)
}

/// Least-squares slope and Pearson correlation of rate against interval index
fn trend(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return (0.0, 0.0);
    }
    (sxy / sxx, sxy / (sxx * syy).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_transfer_is_plateau() {
        let rates = [22.0, 21.0, 4.1, 3.9, 4.0, 4.2, 3.8, 4.0, 4.1, 3.9];
        assert_eq!(analyze_shape(&rates), Shape::Plateau);
        assert!(consistency(&rates).unwrap() > 0.8);
    }

    #[test]
    fn test_rising_transfer_is_linear_climb() {
        let rates: Vec<f64> = (0..10).map(|i| 5.0 + 2.0 * i as f64).collect();
        assert_eq!(analyze_shape(&rates), Shape::LinearClimb);
    }

    #[test]
    fn test_erratic_transfer_is_logarithmic() {
        let rates = [2.0, 18.0, 25.0, 12.0, 27.0, 9.0, 26.0, 14.0];
        assert_eq!(analyze_shape(&rates), Shape::Logarithmic);
        assert!(consistency(&rates).unwrap() < 0.5);
    }

    #[test]
    fn test_short_or_idle_transfer_is_uncertain() {
        assert_eq!(analyze_shape(&[10.0, 10.0, 10.0]), Shape::Uncertain);
        assert_eq!(analyze_shape(&[0.0; 8]), Shape::Uncertain);
        assert_eq!(consistency(&[10.0, 10.0]), None);
    }

    #[test]
    fn test_shape_serialization() {
        let json = serde_json::to_string(&Shape::LinearClimb).unwrap();
        assert_eq!(json, "\"linear_climb\"");
        assert_eq!(Shape::Plateau.to_string(), "plateau");
    }
}
