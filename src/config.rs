// src/config.rs
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::drivers::{AcquisitionError, ZeroMode};

/// f64 carries about 15 significant decimal digits.
pub const MAX_VALUE_DECIMALS: u32 = 15;

/// Session layout and pacing. Column schema and ring sizes are fixed from this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub channel_count_per_port: usize,
    pub port_count: usize,
    pub ring_capacity: usize,
    pub tick_period_ms: u64,
    /// Display refresh every N ticks.
    pub display_decimation: usize,
    pub test_mode: bool,
    pub baud_rate: u32,
    pub max_lines_per_tick: usize,
    pub read_chunk_bytes: usize,
    pub zero_mode: ZeroMode,
    pub readiness_message: String,
    pub value_decimals: u32,
    pub test_seed: u64,
    /// Column label per slot; missing entries fall back to `COM{n}`.
    pub port_labels: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_count_per_port: 6,
            port_count: 5,
            ring_capacity: 100,
            tick_period_ms: 10,
            display_decimation: 10,
            test_mode: false,
            baud_rate: 115_200,
            max_lines_per_tick: 32,
            read_chunk_bytes: 1024,
            zero_mode: ZeroMode::Replace,
            readiness_message: "ready\n".to_string(),
            value_decimals: 2,
            test_seed: 0x5EED,
            port_labels: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: SessionConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AcquisitionError> {
        let positive = [
            ("channel_count_per_port", self.channel_count_per_port as u64),
            ("port_count", self.port_count as u64),
            ("ring_capacity", self.ring_capacity as u64),
            ("tick_period_ms", self.tick_period_ms),
            ("display_decimation", self.display_decimation as u64),
            ("max_lines_per_tick", self.max_lines_per_tick as u64),
            ("read_chunk_bytes", self.read_chunk_bytes as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AcquisitionError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        if self.value_decimals > MAX_VALUE_DECIMALS {
            return Err(AcquisitionError::InvalidConfig(format!(
                "value_decimals must be at most {MAX_VALUE_DECIMALS}"
            )));
        }
        Ok(())
    }

    pub fn port_label(&self, slot: usize) -> String {
        self.port_labels
            .get(slot)
            .filter(|l| !l.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("COM{}", slot + 1))
    }

    /// `timestamp`, `datetime`, then one column per slot x channel.
    pub fn csv_columns(&self) -> Vec<String> {
        let mut columns = vec!["timestamp".to_string(), "datetime".to_string()];
        for slot in 0..self.port_count {
            let label = self.port_label(slot);
            for channel in 0..self.channel_count_per_port {
                columns.push(format!("{label}_ch{}", channel + 1));
            }
        }
        columns
    }
}
