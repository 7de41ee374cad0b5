// NetForensics Daemon - Shared application state
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use netforensics::{
    Aggregator, CellTracker, EngineConfig, HealthMonitor, HistoryStore, StatePublisher,
};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Health components, one per collector role.
pub const TELEMETRY: &str = "telemetry";
pub const LATENCY: &str = "latency";
pub const THROUGHPUT: &str = "throughput";

/// State shared between the producer and the HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    pub config: EngineConfig,
    pub history: HistoryStore,
    pub publisher: StatePublisher,
    pub aggregator: Aggregator,
    cells: RwLock<CellTracker>,
    health: RwLock<HealthMonitor>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        let mut health = HealthMonitor::new();
        for component in [TELEMETRY, LATENCY, THROUGHPUT] {
            health.register(component);
        }
        Self {
            history: HistoryStore::new(&config.history),
            publisher: StatePublisher::new(),
            aggregator: Aggregator::new(config.aggregator.clone()),
            cells: RwLock::new(CellTracker::default()),
            health: RwLock::new(health),
            config,
        }
    }

    pub fn cells(&self) -> RwLockReadGuard<'_, CellTracker> {
        self.cells.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cells_mut(&self) -> RwLockWriteGuard<'_, CellTracker> {
        self.cells.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn health(&self) -> RwLockReadGuard<'_, HealthMonitor> {
        self.health.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn health_mut(&self) -> RwLockWriteGuard<'_, HealthMonitor> {
        self.health.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
