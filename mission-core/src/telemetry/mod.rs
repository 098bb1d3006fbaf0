//! Mission events, ground-station frames, and the command line grammar.
//!
//! Events are structured records of what the mission did (state changes,
//! faults, calibration results) kept in a fixed ring so both targets can
//! inspect recent history without allocating. Frames carry the live record
//! to the ground station in two alternating halves, and the command grammar
//! turns operator lines into [`CommandSet`](crate::platform::CommandSet)
//! updates.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::mission::{InitError, MissionState};
use crate::timing::TimestampMicros;

mod command;
mod frame;

pub use command::{CommandParser, CommandUpdate, LineAssembler, LineError, MAX_LINE_LEN};
pub use frame::{FrameHalf, FrameSplitter, PrimaryFrame, SecondaryFrame, TelemetryFrame};

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Number of events retained in memory.
pub const EVENT_RING_CAPACITY: usize = 64;

/// Everything the mission reports about itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MissionEventKind {
    StateEntered(MissionState),
    StateExited(MissionState),
    InitFailed(InitError),
    ActuatorFault,
    ActuatorRecovered,
    StorageWriteFailed,
    TelemetryDropped,
    CalibrationComplete,
    CalibrationTimedOut,
    IdleRequested,
    LoggingEnabled(bool),
    LogRateChanged(u16),
}

impl fmt::Display for MissionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateEntered(state) => write!(f, "enter {state}"),
            Self::StateExited(state) => write!(f, "exit {state}"),
            Self::InitFailed(error) => write!(f, "init-failed {error}"),
            Self::ActuatorFault => f.write_str("actuator-fault"),
            Self::ActuatorRecovered => f.write_str("actuator-recovered"),
            Self::StorageWriteFailed => f.write_str("storage-write-failed"),
            Self::TelemetryDropped => f.write_str("telemetry-dropped"),
            Self::CalibrationComplete => f.write_str("calibration-complete"),
            Self::CalibrationTimedOut => f.write_str("calibration-timed-out"),
            Self::IdleRequested => f.write_str("idle-requested"),
            Self::LoggingEnabled(true) => f.write_str("logging-on"),
            Self::LoggingEnabled(false) => f.write_str("logging-off"),
            Self::LogRateChanged(hz) => write!(f, "log-rate {hz}Hz"),
        }
    }
}

/// Event stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MissionEvent {
    pub id: EventId,
    pub timestamp: TimestampMicros,
    pub kind: MissionEventKind,
}

/// Records mission events into a fixed-size ring buffer.
pub struct EventRecorder<const CAPACITY: usize = EVENT_RING_CAPACITY> {
    ring: HistoryBuf<MissionEvent, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> EventRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Appends an event, evicting the oldest when full.
    pub fn record(&mut self, kind: MissionEventKind, timestamp: TimestampMicros) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(MissionEvent {
            id,
            timestamp,
            kind,
        });
        id
    }

    /// Events in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, MissionEvent> {
        self.ring.oldest_ordered()
    }

    pub fn latest(&self) -> Option<&MissionEvent> {
        self.ring.recent()
    }

    /// Total events recorded since boot, including evicted ones.
    #[must_use]
    pub const fn total(&self) -> EventId {
        self.next_event_id
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for EventRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_most_recent_events_in_order() {
        let mut recorder: EventRecorder<2> = EventRecorder::new();

        recorder.record(MissionEventKind::StateEntered(MissionState::Initialization), 1);
        recorder.record(MissionEventKind::StateExited(MissionState::Initialization), 2);
        let id = recorder.record(MissionEventKind::StateEntered(MissionState::Calibrate), 3);

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.total(), 3);
        assert_eq!(recorder.latest().map(|event| event.id), Some(id));

        let timestamps: heapless::Vec<u64, 2> =
            recorder.oldest_first().map(|event| event.timestamp).collect();
        assert_eq!(timestamps.as_slice(), &[2, 3]);
    }
}
