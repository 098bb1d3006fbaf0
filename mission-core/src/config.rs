//! Mission tunables.
//!
//! Defaults reproduce the values the vehicle has been flown with; the
//! emulator and firmware override individual fields where they need to.

use core::time::Duration;

/// Default cruise speed for every motion state (pulses per second).
pub const DEFAULT_ACTUATOR_SPEED: f32 = 1_500.0;
/// Default acceleration for dive and resurface strokes (pulses per second²).
pub const DEFAULT_ACTUATOR_ACCELERATION: f32 = 500.0;
/// Acceleration used while seeking the limit switch.
pub const DEFAULT_CALIBRATION_ACCELERATION: f32 = 1_500.0;
/// Completed resurfaces between limit-switch recalibrations.
pub const DEFAULT_RECALIBRATION_INTERVAL: u8 = 3;
/// Storage write rate at boot.
pub const DEFAULT_LOG_RATE_HZ: u16 = 10;
/// Half-frame telemetry rate towards the ground station.
pub const DEFAULT_TELEMETRY_RATE_HZ: u16 = 20;
/// Storage capacity refresh interval.
pub const DEFAULT_CAPACITY_POLL: Duration = Duration::from_secs(1);
/// Upper bound on one calibration attempt.
pub const DEFAULT_CALIBRATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Mechanical description of the ballast carriage.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepperGeometry {
    /// Full-step count between the limit switch and the far extreme.
    pub travel_steps: u32,
    /// Carriage travel between the two extremes in millimetres.
    pub travel_mm: f32,
    /// Distance backed off the switch before the slow re-approach.
    pub recheck_backoff_steps: u32,
}

impl StepperGeometry {
    pub const fn new(travel_steps: u32, travel_mm: f32, recheck_backoff_steps: u32) -> Self {
        Self {
            travel_steps,
            travel_mm,
            recheck_backoff_steps,
        }
    }

    /// Full steps per millimetre of carriage travel.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn steps_per_mm(&self) -> f32 {
        if self.travel_mm <= 0.0 {
            return 0.0;
        }

        self.travel_steps as f32 / self.travel_mm
    }
}

impl Default for StepperGeometry {
    fn default() -> Self {
        // 27 000 half steps across a 120.08 mm carriage.
        Self::new(13_500, 120.08, 500)
    }
}

/// Speed and acceleration applied when a state takes control of the actuator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MotionProfile {
    pub speed: f32,
    pub acceleration: f32,
}

impl MotionProfile {
    pub const fn new(speed: f32, acceleration: f32) -> Self {
        Self {
            speed,
            acceleration,
        }
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::new(DEFAULT_ACTUATOR_SPEED, DEFAULT_ACTUATOR_ACCELERATION)
    }
}

/// Battery voltages the pre-dive check rejects (inclusive).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatteryWindow {
    pub low_min_volts: f32,
    pub low_max_volts: f32,
}

impl BatteryWindow {
    pub const fn new(low_min_volts: f32, low_max_volts: f32) -> Self {
        Self {
            low_min_volts,
            low_max_volts,
        }
    }

    /// Returns `true` when a pack is present but too depleted to dive.
    ///
    /// Readings below the window are treated as bench power (no pack fitted).
    #[must_use]
    pub fn is_low(&self, volts: f32) -> bool {
        volts >= self.low_min_volts && volts <= self.low_max_volts
    }
}

impl Default for BatteryWindow {
    fn default() -> Self {
        Self::new(6.0, 11.1)
    }
}

/// Complete mission configuration handed to the controller at startup.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MissionConfig {
    pub geometry: StepperGeometry,
    pub motion: MotionProfile,
    pub calibration: MotionProfile,
    pub calibration_timeout: Duration,
    pub recalibration_interval: u8,
    pub log_rate_hz: u16,
    pub telemetry_rate_hz: u16,
    pub capacity_poll: Duration,
    pub battery: BatteryWindow,
}

impl MissionConfig {
    pub const fn new(geometry: StepperGeometry) -> Self {
        Self {
            geometry,
            motion: MotionProfile::new(DEFAULT_ACTUATOR_SPEED, DEFAULT_ACTUATOR_ACCELERATION),
            calibration: MotionProfile::new(
                DEFAULT_ACTUATOR_SPEED,
                DEFAULT_CALIBRATION_ACCELERATION,
            ),
            calibration_timeout: DEFAULT_CALIBRATION_TIMEOUT,
            recalibration_interval: DEFAULT_RECALIBRATION_INTERVAL,
            log_rate_hz: DEFAULT_LOG_RATE_HZ,
            telemetry_rate_hz: DEFAULT_TELEMETRY_RATE_HZ,
            capacity_poll: DEFAULT_CAPACITY_POLL,
            battery: BatteryWindow::new(6.0, 11.1),
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self::new(StepperGeometry::default())
    }
}
