// NetForensics - Cellular link root-cause engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Rolling history store
//!
//! Append-only, timestamp-ordered sequence of samples with bounded
//! read-back. Retention evicts the oldest entries once the capacity or the
//! maximum age is exceeded; remaining entries are never reordered.
//!
//! Reads copy `Arc<Sample>` handles out under a short read lock, so a
//! reader never observes a partially appended sample and never holds the
//! lock while doing anything else.

use crate::config::HistoryConfig;
use crate::error::{ForensicsError, Result};
use crate::sample::Sample;
use chrono::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared, thread-safe history of samples
#[derive(Debug)]
pub struct HistoryStore {
    entries: RwLock<VecDeque<Arc<Sample>>>,
    capacity: usize,
    max_age: Option<Duration>,
}

impl HistoryStore {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: config.capacity.max(1),
            max_age: config
                .max_age_secs
                .and_then(|secs| Duration::try_seconds(i64::try_from(secs).ok()?)),
        }
    }

    /// Store with a fixed capacity and no age limit
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(&HistoryConfig {
            capacity,
            max_age_secs: None,
            ..Default::default()
        })
    }

    /// Append a sample, evicting the oldest entries if a bound is exceeded.
    /// Returns the number of evicted samples.
    pub fn append(&self, sample: impl Into<Arc<Sample>>) -> usize {
        let sample = sample.into();
        let mut entries = self.write();
        entries.push_back(sample);
        self.evict(&mut entries)
    }

    /// Append many samples (oldest first), e.g. when warming from the log
    pub fn extend<I>(&self, samples: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Arc<Sample>>,
    {
        let mut entries = self.write();
        entries.extend(samples.into_iter().map(Into::into));
        self.evict(&mut entries)
    }

    /// The most recent `limit` samples in ascending timestamp order, or the
    /// whole store if it holds fewer.
    pub fn read(&self, limit: usize) -> Result<Vec<Arc<Sample>>> {
        if limit == 0 {
            return Err(ForensicsError::InvalidArgument(
                "limit must be positive".to_string(),
            ));
        }
        let entries = self.read_guard();
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.iter().skip(skip).cloned().collect())
    }

    /// Every retained sample in ascending order
    pub fn snapshot(&self) -> Vec<Arc<Sample>> {
        self.read_guard().iter().cloned().collect()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.read_guard().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict(&self, entries: &mut VecDeque<Arc<Sample>>) -> usize {
        let mut evicted = 0;
        while entries.len() > self.capacity {
            entries.pop_front();
            evicted += 1;
        }
        if let (Some(max_age), Some(newest)) = (self.max_age, entries.back().map(|s| s.timestamp))
        {
            let cutoff = newest - max_age;
            while entries.front().is_some_and(|s| s.timestamp < cutoff) {
                entries.pop_front();
                evicted += 1;
            }
        }
        if evicted > 0 {
            #[cfg(feature = "logging")]
            log::debug!("history retention evicted {} samples", evicted);
        }
        evicted
    }

    // A poisoned lock only means a writer panicked mid-append; the deque
    // itself is still structurally valid.
    fn read_guard(&self) -> RwLockReadGuard<'_, VecDeque<Arc<Sample>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<Arc<Sample>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}
