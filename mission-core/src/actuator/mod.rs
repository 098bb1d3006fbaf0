//! Stepper-driven buoyancy actuator.
//!
//! The actuator is modelled in two layers. [`Stepper`] owns the position,
//! speed, and acceleration state of a step/direction driver and advances it in
//! bounded increments. [`BuoyancyActuator`] wraps the stepper with the
//! vehicle-specific notion of sinking, rising, and zeroing against the limit
//! switch. Positions are always reported in full-step units regardless of the
//! microstep resolution currently programmed into the driver.

use core::fmt;

mod buoyancy;
mod stepper;

pub use buoyancy::{BuoyancyActuator, CalibrationError};
pub use stepper::{LIMIT_DEBOUNCE_SAMPLES, LimitSwitch, MAX_PULSES_PER_RUN, Stepper};

/// Microstep resolution selected on the driver's MS1/MS2 pins.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl Resolution {
    /// Pulses per full step.
    #[must_use]
    pub const fn subdivision(self) -> u8 {
        match self {
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
        }
    }

    /// Full steps travelled per pulse.
    #[must_use]
    pub fn multiplier(self) -> f32 {
        1.0 / f32::from(self.subdivision())
    }

    /// Pin levels that select this resolution.
    #[must_use]
    pub const fn pins(self) -> MicrostepPins {
        match self {
            Self::Half => MicrostepPins::new(false, true),
            Self::Quarter => MicrostepPins::new(true, false),
            Self::Eighth => MicrostepPins::new(false, false),
            Self::Sixteenth => MicrostepPins::new(true, true),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1/{}", self.subdivision())
    }
}

/// Logic levels for the MS1/MS2 microstep select lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MicrostepPins {
    pub ms1: bool,
    pub ms2: bool,
}

impl MicrostepPins {
    pub const fn new(ms1: bool, ms2: bool) -> Self {
        Self { ms1, ms2 }
    }
}

/// Direction of carriage travel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Away from the limit switch, taking on ballast.
    Sink,
    /// Towards the limit switch, expelling ballast.
    Rise,
}

/// Abstraction over the step/direction driver and its status lines.
pub trait StepperDriver {
    /// Drives MS1/MS2 to the requested levels.
    fn select_microsteps(&mut self, pins: MicrostepPins);

    /// Sets the DIR line ahead of the next pulse.
    fn set_direction(&mut self, direction: Direction);

    /// Emits one STEP pulse.
    fn pulse(&mut self);

    /// Returns `true` while the driver's error line is asserted.
    fn fault_asserted(&mut self) -> bool;

    /// Returns the raw (undebounced) limit-switch level.
    fn limit_engaged(&mut self) -> bool;
}

/// Stepper driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopStepperDriver;

impl NoopStepperDriver {
    pub const fn new() -> Self {
        Self
    }
}

impl StepperDriver for NoopStepperDriver {
    fn select_microsteps(&mut self, _: MicrostepPins) {}

    fn set_direction(&mut self, _: Direction) {}

    fn pulse(&mut self) {}

    fn fault_asserted(&mut self) -> bool {
        false
    }

    fn limit_engaged(&mut self) -> bool {
        false
    }
}

/// Failure reported by [`Stepper::update`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorFault {
    /// The driver pulled its error line; no motion was issued.
    DriverFault,
}

impl fmt::Display for ActuatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Coarse activity of the buoyancy actuator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorMode {
    Idle,
    Sinking,
    Rising,
    Calibrating,
    Faulted,
}

impl ActuatorMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sinking => "sinking",
            Self::Rising => "rising",
            Self::Calibrating => "calibrating",
            Self::Faulted => "faulted",
        }
    }
}

/// Snapshot of the actuator written into the mission record each cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ActuatorTelemetry {
    pub position: f64,
    pub target: f64,
    pub position_mm: f32,
    pub target_mm: f32,
    pub speed: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub limit_engaged: bool,
    pub calibrated: bool,
    pub resolution: Resolution,
    pub mode: ActuatorMode,
}
