//! In-RAM mission log.
//!
//! The board has no card slot populated yet, so records land in a fixed ring
//! that is only reachable from an attached debugger. Capacity reports the
//! free slots in bytes so the telemetry field keeps its meaning.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt;
use core::mem::size_of;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use mission_core::config::DEFAULT_LOG_RATE_HZ;
use mission_core::mission::MissionState;
use mission_core::platform::StorageSink;
use mission_core::record::MissionRecord;
use mission_core::timing::interval_to_hz;

use crate::log::log_storage_full;

/// Records kept before the oldest is overwritten.
pub const LOG_CAPACITY: usize = 512;

/// Compact image of one mission record.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub time_us: u64,
    pub cycle: u32,
    pub state: MissionState,
    pub position: Option<f64>,
    pub temperature_c: Option<f32>,
    pub pressure_mbar: Option<f32>,
    pub dissolved_solids_ppm: Option<f32>,
    pub voltage: Option<f32>,
    pub warning: bool,
}

impl From<&MissionRecord> for LogEntry {
    fn from(record: &MissionRecord) -> Self {
        Self {
            time_us: record.time_us,
            cycle: record.cycle,
            state: record.state,
            position: record.actuator.map(|actuator| actuator.position),
            temperature_c: record.environment.temperature_c.value(),
            pressure_mbar: record.environment.pressure_mbar.value(),
            dissolved_solids_ppm: record.environment.dissolved_solids_ppm.value(),
            voltage: record.power.voltage.value(),
            warning: record.flags.warning,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageError {
    /// `log_data` was called before `init`.
    NotMounted,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub struct RamLog<const N: usize = LOG_CAPACITY> {
    entries: HistoryBuf<LogEntry, N>,
    mounted: bool,
    rate_hz: u16,
    wrapped: bool,
}

impl<const N: usize> RamLog<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: HistoryBuf::new(),
            mounted: false,
            rate_hz: DEFAULT_LOG_RATE_HZ,
            wrapped: false,
        }
    }

    pub fn oldest_first(&self) -> OldestOrdered<'_, LogEntry> {
        self.entries.oldest_ordered()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Free space in bytes.
    #[must_use]
    pub fn remaining_bytes(&self) -> u64 {
        let free = N - self.entries.len();
        (free * size_of::<LogEntry>()) as u64
    }
}

impl<const N: usize> Default for RamLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> StorageSink for RamLog<N> {
    type Error = StorageError;

    /// Mounts an empty ring; a second call keeps what was already logged.
    fn init(&mut self) -> Result<(), Self::Error> {
        if self.mounted {
            return Ok(());
        }

        self.entries.clear();
        self.mounted = true;
        self.wrapped = false;
        Ok(())
    }

    fn log_data(&mut self, record: &MissionRecord) -> Result<(), Self::Error> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }

        if self.entries.is_full() && !self.wrapped {
            self.wrapped = true;
            log_storage_full(N);
        }

        self.entries.write(LogEntry::from(record));
        Ok(())
    }

    fn logging_interval_hz(&self) -> u16 {
        self.rate_hz
    }

    fn set_logging_interval(&mut self, interval: Duration) {
        self.rate_hz = interval_to_hz(interval);
    }

    fn update_capacity(&mut self, record: &mut MissionRecord) {
        record.storage.capacity_bytes.update(self.remaining_bytes());
    }
}
