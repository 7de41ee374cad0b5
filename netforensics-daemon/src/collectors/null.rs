// NetForensics Daemon - Null modem
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use netforensics::{CollectorError, RadioReading, TelemetrySource};

/// Telemetry source for setups without a readable modem. Always answers,
/// with every metric absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullModem;

impl TelemetrySource for NullModem {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn fetch(&self) -> Result<RadioReading, CollectorError> {
        Ok(RadioReading::default())
    }
}
