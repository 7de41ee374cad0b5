// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Serving-cell sessions
//!
//! A session is a contiguous run of samples on one (band, PCI, eNodeB).
//! Samples without a known identity neither open nor close a session.

use crate::sample::{CellIdentity, Sample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of closed sessions retained
pub const DEFAULT_MAX_SESSIONS: usize = 500;

/// Summary of one serving-cell session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSession {
    pub band: String,
    pub pci: String,
    pub enodeb: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_secs: i64,
    pub samples: u64,
    pub avg_score: f64,
    pub avg_sinr: Option<f64>,
    pub avg_rsrq: Option<f64>,
    pub avg_rsrp: Option<f64>,
}

impl CellSession {
    pub fn cell(&self) -> CellIdentity {
        CellIdentity::new(&self.band, &self.pci, &self.enodeb)
    }
}

#[derive(Debug, Clone, Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone)]
struct OpenSession {
    cell: CellIdentity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    samples: u64,
    score: Mean,
    sinr: Mean,
    rsrq: Mean,
    rsrp: Mean,
}

impl OpenSession {
    fn open(cell: CellIdentity, sample: &Sample) -> Self {
        let mut session = Self {
            cell,
            start: sample.timestamp,
            end: sample.timestamp,
            samples: 0,
            score: Mean::default(),
            sinr: Mean::default(),
            rsrq: Mean::default(),
            rsrp: Mean::default(),
        };
        session.add(sample);
        session
    }

    fn add(&mut self, sample: &Sample) {
        self.end = self.end.max(sample.timestamp);
        self.samples += 1;
        self.score.add(Some(sample.score));
        self.sinr.add(sample.sinr);
        self.rsrq.add(sample.rsrq);
        self.rsrp.add(sample.rsrp);
    }

    fn summary(&self) -> CellSession {
        CellSession {
            band: self.cell.band.clone(),
            pci: self.cell.pci.clone(),
            enodeb: self.cell.enodeb.clone(),
            start: self.start,
            end: self.end,
            duration_secs: (self.end - self.start).num_seconds(),
            samples: self.samples,
            avg_score: self.score.value().unwrap_or(0.0),
            avg_sinr: self.sinr.value(),
            avg_rsrq: self.rsrq.value(),
            avg_rsrp: self.rsrp.value(),
        }
    }
}

/// Tracks the serving cell across samples
#[derive(Debug, Clone)]
pub struct CellTracker {
    current: Option<OpenSession>,
    closed: VecDeque<CellSession>,
    max_sessions: usize,
}

impl CellTracker {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            current: None,
            closed: VecDeque::new(),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Feed one sample. Returns the session that was closed if the serving
    /// cell changed.
    pub fn observe(&mut self, sample: &Sample) -> Option<CellSession> {
        let cell = sample.cell();
        if cell.is_unknown() {
            return None;
        }

        match self.current.as_mut() {
            Some(open) if open.cell == cell => {
                open.add(sample);
                None
            }
            _ => {
                let closed = self
                    .current
                    .replace(OpenSession::open(cell, sample))
                    .map(|open| open.summary());
                if let Some(session) = closed.as_ref() {
                    #[cfg(feature = "logging")]
                    log::info!(
                        "cell change: left {} after {}s ({} samples)",
                        session.cell(),
                        session.duration_secs,
                        session.samples
                    );
                    self.closed.push_back(session.clone());
                    while self.closed.len() > self.max_sessions {
                        self.closed.pop_front();
                    }
                }
                closed
            }
        }
    }

    /// Open session so far, if any
    pub fn current(&self) -> Option<CellSession> {
        self.current.as_ref().map(OpenSession::summary)
    }

    /// Closed sessions, most recent first
    pub fn sessions(&self) -> Vec<CellSession> {
        self.closed.iter().rev().cloned().collect()
    }

    /// Seed closed sessions loaded from disk (oldest first)
    pub fn restore(&mut self, sessions: impl IntoIterator<Item = CellSession>) {
        self.closed.extend(sessions);
        while self.closed.len() > self.max_sessions {
            self.closed.pop_front();
        }
    }
}

impl Default for CellTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}
