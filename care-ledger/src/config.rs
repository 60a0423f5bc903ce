//! Configuration for the care-time ledger.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use care_model::{EntryStatus, ShiftFormat, ShiftSet};

use crate::error::{LedgerError, Result};

/// Longest accepted debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Configuration for a [`crate::Ledger`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Save queue settings
    pub sync: SyncConfig,
    /// Values for entries created by a first edit
    pub defaults: EntryDefaults,
    /// Facility fallback when no catalog answers
    pub facility: FacilityConfig,
}

impl LedgerConfig {
    /// Load config from YAML. Missing sections take their defaults.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Reject values the ledger cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sync.event_capacity == 0 {
            return Err(LedgerError::Config("sync.event_capacity must be at least 1".to_string()));
        }
        if self.sync.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(LedgerError::Config(format!(
                "sync.debounce_ms must be at most {MAX_DEBOUNCE_MS}, got {}",
                self.sync.debounce_ms
            )));
        }
        Ok(())
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.sync.debounce_ms = debounce_ms;
        self
    }

    pub fn with_shift_format(mut self, format: ShiftFormat) -> Self {
        self.facility.shift_format = format;
        self
    }

    pub fn with_default_minutes(mut self, minutes: u32) -> Self {
        self.defaults.minutes_per_occurrence = minutes;
        self
    }
}

/// Save queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period before a queued save is sent (ms)
    pub debounce_ms: u64,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            event_capacity: 256,
        }
    }
}

/// Initial field values for a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryDefaults {
    pub minutes_per_occurrence: u32,
    pub status: EntryStatus,
}

impl Default for EntryDefaults {
    fn default() -> Self {
        Self {
            minutes_per_occurrence: 0,
            status: EntryStatus::Incomplete,
        }
    }
}

/// Facility settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityConfig {
    pub shift_format: ShiftFormat,
}

impl FacilityConfig {
    pub fn shift_set(&self) -> ShiftSet {
        ShiftSet::for_format(self.shift_format)
    }
}
