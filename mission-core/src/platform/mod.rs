//! Contracts for the collaborators the mission cycle drives.
//!
//! Sensor drivers, navigation, storage, the ground-station link, and the
//! status indicator are all reached through the traits in this module. The
//! firmware and emulator crates provide concrete implementations; the no-op
//! versions here keep unit tests and bring-up builds free of hardware.

use core::{fmt, time::Duration};

use crate::actuator::{NoopStepperDriver, StepperDriver};
use crate::config::DEFAULT_LOG_RATE_HZ;
use crate::record::MissionRecord;
use crate::telemetry::TelemetryFrame;

/// Sensor drivers sampled at the top of each cycle.
///
/// Every sampler writes into the record and returns immediately; a sensor
/// whose data-ready flag is not set leaves its fields untouched.
pub trait SensorSuite {
    type Error: fmt::Debug;

    /// Probes and configures every sensor.
    ///
    /// # Errors
    ///
    /// Returns the driver error for the first sensor that failed to start.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Raw pack voltage for the pre-dive battery check.
    fn battery_voltage(&mut self) -> Option<f32>;

    /// External temperature, pressure, and dissolved-solids probes.
    fn sample_environment(&mut self, record: &mut MissionRecord);

    /// IMU, magnetometer, and barometer.
    fn sample_inertial(&mut self, record: &mut MissionRecord);

    /// Battery voltage.
    fn sample_power(&mut self, record: &mut MissionRecord);
}

/// Navigation / fusion stage consuming the inertial samples in the record.
pub trait Navigation {
    fn update(&mut self, record: &mut MissionRecord);
}

/// Persistent mission log.
pub trait StorageSink {
    type Error: fmt::Debug;

    /// Mounts the medium and opens the log.
    ///
    /// # Errors
    ///
    /// Returns the storage error when the medium is missing or unwritable.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns the storage error; callers treat it as non-fatal.
    fn log_data(&mut self, record: &MissionRecord) -> Result<(), Self::Error>;

    /// Current write rate.
    fn logging_interval_hz(&self) -> u16;

    /// Adjusts the write rate.
    fn set_logging_interval(&mut self, interval: Duration);

    /// Writes the remaining capacity into the record.
    fn update_capacity(&mut self, record: &mut MissionRecord);
}

/// Whether the ground station wants the mission running or parked.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ModeRequest {
    #[default]
    Run,
    Idle,
}

/// Operator overrides received from the ground station.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CommandSet {
    /// Cruise speed override in half-step pulses per second.
    pub actuator_speed: Option<f32>,
    /// Acceleration override in half-step pulses per second².
    pub actuator_acceleration: Option<f32>,
    pub logging_enabled: bool,
    /// Storage write rate override.
    pub log_rate_hz: Option<u16>,
    pub mode: ModeRequest,
}

impl CommandSet {
    pub const fn new() -> Self {
        Self {
            actuator_speed: None,
            actuator_acceleration: None,
            logging_enabled: true,
            log_rate_hz: None,
            mode: ModeRequest::Run,
        }
    }

    /// Rate the storage task should run at given the mission default.
    #[must_use]
    pub fn effective_log_rate_hz(&self, default_hz: u16) -> u16 {
        self.log_rate_hz.unwrap_or(default_hz)
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Ground-station link.
pub trait TelemetryLink {
    type Error: fmt::Debug;

    fn init(&mut self);

    /// Drains pending inbound traffic.
    ///
    /// Returns `true` exactly once per idle request; the caller is expected
    /// to move the mission into Idle.
    fn handle_transport(&mut self, record: &MissionRecord) -> bool;

    /// Sends one telemetry half-frame.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the frame could not be queued.
    fn send_frame(&mut self, frame: &TelemetryFrame) -> Result<(), Self::Error>;

    /// Latest command set.
    fn commands(&self) -> CommandSet;

    /// Tells the link whether the mission is currently parked in Idle.
    fn set_idle(&mut self, idle: bool);
}

/// Edge-detector shared by link implementations to report idle requests once.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IdleLatch {
    idle: bool,
}

impl IdleLatch {
    pub const fn new() -> Self {
        Self { idle: false }
    }

    /// Returns `true` the first time `commands` asks for Idle.
    pub fn poll(&mut self, commands: &CommandSet) -> bool {
        if commands.mode == ModeRequest::Idle && !self.idle {
            self.idle = true;
            return true;
        }

        false
    }

    pub fn set(&mut self, idle: bool) {
        self.idle = idle;
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.idle
    }
}

/// Visual indication patterns, from least to most severe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum IndicatorPattern {
    Startup,
    Nominal,
    Warning,
    Error,
}

impl IndicatorPattern {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Nominal => "nominal",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// LEDs or buzzer reflecting mission health.
pub trait StatusIndicator {
    fn show(&mut self, pattern: IndicatorPattern);
}

/// Bundles the concrete collaborator types for one target.
pub trait MissionPlatform {
    type Sensors: SensorSuite;
    type Navigation: Navigation;
    type Storage: StorageSink;
    type Link: TelemetryLink;
    type Driver: StepperDriver;
    type Indicator: StatusIndicator;
}

/// Owned collaborator instances handed to the mission context at startup.
pub struct Collaborators<P: MissionPlatform> {
    pub sensors: P::Sensors,
    pub navigation: P::Navigation,
    pub storage: P::Storage,
    pub link: P::Link,
    pub driver: P::Driver,
    pub indicator: P::Indicator,
}

/// Sensors that never produce data.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSensors;

impl SensorSuite for NoopSensors {
    type Error = core::convert::Infallible;

    fn init(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn battery_voltage(&mut self) -> Option<f32> {
        None
    }

    fn sample_environment(&mut self, _: &mut MissionRecord) {}

    fn sample_inertial(&mut self, _: &mut MissionRecord) {}

    fn sample_power(&mut self, _: &mut MissionRecord) {}
}

/// Navigation stage that leaves the solution untouched.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopNavigation;

impl Navigation for NoopNavigation {
    fn update(&mut self, _: &mut MissionRecord) {}
}

/// Storage that accepts and discards every record.
#[derive(Copy, Clone, Debug)]
pub struct NoopStorage {
    rate_hz: u16,
}

impl NoopStorage {
    pub const fn new() -> Self {
        Self {
            rate_hz: DEFAULT_LOG_RATE_HZ,
        }
    }
}

impl Default for NoopStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageSink for NoopStorage {
    type Error = core::convert::Infallible;

    fn init(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn log_data(&mut self, _: &MissionRecord) -> Result<(), Self::Error> {
        Ok(())
    }

    fn logging_interval_hz(&self) -> u16 {
        self.rate_hz
    }

    fn set_logging_interval(&mut self, interval: Duration) {
        self.rate_hz = crate::timing::interval_to_hz(interval);
    }

    fn update_capacity(&mut self, _: &mut MissionRecord) {}
}

/// Link with no ground station attached.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopLink;

impl TelemetryLink for NoopLink {
    type Error = core::convert::Infallible;

    fn init(&mut self) {}

    fn handle_transport(&mut self, _: &MissionRecord) -> bool {
        false
    }

    fn send_frame(&mut self, _: &TelemetryFrame) -> Result<(), Self::Error> {
        Ok(())
    }

    fn commands(&self) -> CommandSet {
        CommandSet::new()
    }

    fn set_idle(&mut self, _: bool) {}
}

/// Indicator with nothing attached.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopIndicator;

impl StatusIndicator for NoopIndicator {
    fn show(&mut self, _: IndicatorPattern) {}
}

/// Platform made entirely of no-op collaborators.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPlatform;

impl MissionPlatform for NoopPlatform {
    type Sensors = NoopSensors;
    type Navigation = NoopNavigation;
    type Storage = NoopStorage;
    type Link = NoopLink;
    type Driver = NoopStepperDriver;
    type Indicator = NoopIndicator;
}

impl Collaborators<NoopPlatform> {
    #[must_use]
    pub const fn noop() -> Self {
        Self {
            sensors: NoopSensors,
            navigation: NoopNavigation,
            storage: NoopStorage::new(),
            link: NoopLink,
            driver: NoopStepperDriver::new(),
            indicator: NoopIndicator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_latch_reports_each_request_once() {
        let mut latch = IdleLatch::new();
        let mut commands = CommandSet::new();

        assert!(!latch.poll(&commands));
        commands.mode = ModeRequest::Idle;
        assert!(latch.poll(&commands));
        assert!(!latch.poll(&commands), "latched until the mission leaves Idle");

        latch.set(false);
        assert!(latch.poll(&commands));
    }

    #[test]
    fn log_rate_override_falls_back_to_default() {
        let mut commands = CommandSet::new();
        assert_eq!(commands.effective_log_rate_hz(10), 10);
        commands.log_rate_hz = Some(30);
        assert_eq!(commands.effective_log_rate_hz(10), 30);
    }
}
