// NetForensics Daemon - Flat-file history log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Flat-file history log.
//!
//! One CSV file per UTC day (`history-YYYY-MM-DD.csv`) with one row per
//! sample, plus `cells.csv` for closed serving-cell sessions. Rows are
//! written behind the producer by a blocking writer task fed through a
//! bounded channel.

use crate::metrics::record_persist_drop;
use chrono::NaiveDate;
use netforensics::{CellSession, Sample};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const HISTORY_PREFIX: &str = "history-";
const CELLS_FILE: &str = "cells.csv";

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Message for the writer task.
#[derive(Debug, Clone)]
pub enum PersistMsg {
    Sample(Arc<Sample>),
    Session(CellSession),
}

/// Directory-backed history log.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    dir: PathBuf,
}

impl HistoryLog {
    /// Open (and create if needed) the data directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, PersistError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the samples of `day`.
    pub fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}{}.csv", HISTORY_PREFIX, day.format("%Y-%m-%d")))
    }

    pub fn cells_path(&self) -> PathBuf {
        self.dir.join(CELLS_FILE)
    }

    /// Append one sample to its day file.
    pub fn append(&self, sample: &Sample) -> Result<(), PersistError> {
        append_row(&self.day_path(sample.timestamp.date_naive()), sample)
    }

    /// Append one closed cell session.
    pub fn append_session(&self, session: &CellSession) -> Result<(), PersistError> {
        append_row(&self.cells_path(), session)
    }

    /// Day files in chronological order.
    pub fn day_files(&self) -> Result<Vec<PathBuf>, PersistError> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(HISTORY_PREFIX) && n.ends_with(".csv"))
            })
            .collect();
        // ISO dates sort lexicographically
        files.sort();
        Ok(files)
    }

    /// The most recent `limit` samples, oldest first.
    ///
    /// Reads day files newest-first and stops once enough rows are found.
    /// Rows that fail to parse are skipped.
    pub fn load_recent(&self, limit: usize) -> Result<Vec<Sample>, PersistError> {
        let mut chunks: Vec<Vec<Sample>> = Vec::new();
        let mut total = 0;
        for path in self.day_files()?.iter().rev() {
            if total >= limit {
                break;
            }
            let rows: Vec<Sample> = read_rows(path)?;
            total += rows.len();
            chunks.push(rows);
        }

        let mut samples: Vec<Sample> = chunks.into_iter().rev().flatten().collect();
        samples.sort_by_key(|s| s.timestamp);
        let skip = samples.len().saturating_sub(limit);
        Ok(samples.split_off(skip))
    }

    /// All closed cell sessions, oldest first.
    pub fn load_sessions(&self) -> Result<Vec<CellSession>, PersistError> {
        let path = self.cells_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_rows(&path)
    }
}

fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<(), PersistError> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!("Skipping row {} of {}: {}", line + 1, path.display(), e),
        }
    }
    Ok(rows)
}

/// Serialize samples to an in-memory CSV document.
pub fn to_csv<'a, I>(samples: I) -> Result<Vec<u8>, PersistError>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    for sample in samples {
        writer.serialize(sample)?;
    }
    writer
        .into_inner()
        .map_err(|e| PersistError::Io(e.into_error()))
}

/// Handle for queueing rows to the writer task.
#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: mpsc::Sender<PersistMsg>,
}

impl PersistHandle {
    /// Queue a message; drops it with a warning when the queue is full.
    pub fn send(&self, msg: PersistMsg) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Persistence queue full, dropping row");
                record_persist_drop();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Persistence writer stopped, dropping row");
                record_persist_drop();
            }
        }
    }
}

/// Start the writer task. It exits once every handle is dropped and the
/// queue is drained.
pub fn spawn_writer(log: HistoryLog, capacity: usize) -> (PersistHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<PersistMsg>(capacity.max(1));
    let handle = tokio::task::spawn_blocking(move || {
        info!("History writer started in {}", log.dir().display());
        let mut written: u64 = 0;
        while let Some(msg) = rx.blocking_recv() {
            let result = match &msg {
                PersistMsg::Sample(sample) => log.append(sample),
                PersistMsg::Session(session) => log.append_session(session),
            };
            match result {
                Ok(()) => written += 1,
                Err(e) => warn!("Failed to persist {:?}: {}", kind(&msg), e),
            }
        }
        debug!("History writer stopped after {} rows", written);
    });
    (PersistHandle { tx }, handle)
}

fn kind(msg: &PersistMsg) -> &'static str {
    match msg {
        PersistMsg::Sample(_) => "sample",
        PersistMsg::Session(_) => "cell session",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use netforensics::{CycleInput, EngineConfig, Pipeline, RadioReading};

    fn samples(n: usize, start_day: u32) -> Vec<Sample> {
        let mut pipeline = Pipeline::new(&EngineConfig::default());
        let t0 = Utc.with_ymd_and_hms(2025, 3, start_day, 22, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let input = CycleInput {
                    radio: Some(RadioReading {
                        sinr: Some(12.5),
                        rsrq: None,
                        rsrp: Some(-97.0),
                        band: Some("B3".to_string()),
                        pci: Some("44".to_string()),
                        enodeb: Some("70001".to_string()),
                    }),
                    ..Default::default()
                };
                pipeline.process(input, t0 + Duration::minutes(30 * i as i64))
            })
            .collect()
    }

    #[test]
    fn test_round_trip_across_days() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        let written = samples(10, 1);
        for sample in &written {
            log.append(sample).unwrap();
        }

        assert_eq!(log.day_files().unwrap().len(), 2);
        let loaded = log.load_recent(100).unwrap();
        assert_eq!(loaded, written);
        assert_eq!(loaded[0].rsrq, None);
    }

    #[test]
    fn test_load_recent_keeps_tail() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        let written = samples(10, 1);
        for sample in &written {
            log.append(sample).unwrap();
        }
        let loaded = log.load_recent(3).unwrap();
        assert_eq!(loaded, written[7..].to_vec());
    }

    #[test]
    fn test_bad_rows_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        let written = samples(2, 5);
        log.append(&written[0]).unwrap();
        let path = log.day_path(written[0].timestamp.date_naive());
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("garbage,row\n");
        fs::write(&path, text).unwrap();
        log.append(&written[1]).unwrap();

        assert_eq!(log.load_recent(10).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_dir_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::open(dir.path().join("nested")).unwrap();
        assert!(log.load_recent(10).unwrap().is_empty());
        assert!(log.load_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_to_csv_has_header() {
        let csv = to_csv(samples(2, 1).iter()).unwrap();
        let text = String::from_utf8(csv).unwrap();
        assert!(text.starts_with("timestamp,sinr,rsrq,rsrp,band"));
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_writer_drains_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        let (handle, join) = spawn_writer(log.clone(), 16);
        for sample in samples(4, 1) {
            handle.send(PersistMsg::Sample(Arc::new(sample)));
        }
        drop(handle);
        join.await.unwrap();
        assert_eq!(log.load_recent(10).unwrap().len(), 4);
    }
}
