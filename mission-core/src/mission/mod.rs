//! Mission state machine.
//!
//! Six states drive the vehicle through its dive cycle. Each state is a
//! [`StateHandler`] held in a [`StateTable`] and selected by its
//! [`MissionState`] tag; [`MissionController`] owns the table and the
//! [`MissionContext`](crate::orchestrator::MissionContext) and applies
//! transitions as exit, assign, enter.

use core::fmt;

use crate::orchestrator::MissionContext;
use crate::platform::MissionPlatform;
use crate::timing::TimestampMicros;

mod machine;
mod states;

pub use machine::{MissionController, Transition};
pub use states::{
    CalibrateState, DivingState, ErrorIndicationState, IdleState, InitializationState,
    ResurfacingState, StateTable,
};

/// Mission phase currently in control of the vehicle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MissionState {
    Initialization,
    Calibrate,
    Diving,
    Resurfacing,
    Idle,
    ErrorIndication,
}

impl MissionState {
    pub const ALL: [Self; 6] = [
        Self::Initialization,
        Self::Calibrate,
        Self::Diving,
        Self::Resurfacing,
        Self::Idle,
        Self::ErrorIndication,
    ];

    /// Numeric tag stored in logs and telemetry.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Initialization => 0,
            Self::Calibrate => 1,
            Self::Diving => 2,
            Self::Resurfacing => 3,
            Self::Idle => 4,
            Self::ErrorIndication => 5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Calibrate => "calibrate",
            Self::Diving => "diving",
            Self::Resurfacing => "resurfacing",
            Self::Idle => "idle",
            Self::ErrorIndication => "error",
        }
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bring-up step that failed during Initialization.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InitError {
    LowBattery,
    Sensors,
    Storage,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Behaviour of one mission state.
///
/// `enter` runs once when the state becomes active, `run` once per cycle
/// while it is active, and `exit` once before the next state's `enter`.
pub trait StateHandler<P: MissionPlatform> {
    /// `previous` is `None` only for the boot-time entry into Initialization.
    fn enter(
        &mut self,
        ctx: &mut MissionContext<P>,
        previous: Option<MissionState>,
        now: TimestampMicros,
    );

    /// Returns the state to transition to, if any.
    fn run(&mut self, ctx: &mut MissionContext<P>, now: TimestampMicros) -> Option<MissionState>;

    fn exit(&mut self, ctx: &mut MissionContext<P>, next: MissionState, now: TimestampMicros);
}
