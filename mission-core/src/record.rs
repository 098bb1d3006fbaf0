//! Per-cycle mission record.
//!
//! One [`MissionRecord`] lives inside the mission context and is rewritten in
//! place every cycle. Sensor and navigation fields are wrapped in [`Sample`]
//! so consumers can tell a value produced this cycle from one carried forward
//! because its source was not ready. [`MissionRecord::begin_cycle`] demotes
//! every fresh value to stale and clears the actuator slot, so a field that
//! was not rewritten can never masquerade as current data.

use crate::actuator::ActuatorTelemetry;
use crate::mission::MissionState;
use crate::timing::TimestampMicros;

/// Freshness-tagged sensor value.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Sample<T> {
    /// Never produced since boot.
    #[default]
    Missing,
    /// Carried forward from an earlier cycle.
    Stale(T),
    /// Written during the current cycle.
    Fresh(T),
}

impl<T: Copy> Sample<T> {
    /// Stores a value produced this cycle.
    pub fn update(&mut self, value: T) {
        *self = Self::Fresh(value);
    }

    /// Demotes a fresh value to stale.
    pub fn age(&mut self) {
        if let Self::Fresh(value) = *self {
            *self = Self::Stale(value);
        }
    }

    /// Latest value regardless of freshness.
    #[must_use]
    pub const fn value(&self) -> Option<T> {
        match *self {
            Self::Missing => None,
            Self::Stale(value) | Self::Fresh(value) => Some(value),
        }
    }

    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// Single-character freshness tag used by text encodings.
    #[must_use]
    pub const fn tag(&self) -> char {
        match self {
            Self::Missing => '-',
            Self::Stale(_) => '~',
            Self::Fresh(_) => '+',
        }
    }
}

/// Three-axis reading.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Barometer output.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BaroReading {
    pub pressure_pa: f32,
    pub temperature_c: f32,
}

/// Water-side environmental probes.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EnvironmentSamples {
    pub temperature_c: Sample<f32>,
    pub pressure_mbar: Sample<f32>,
    pub dissolved_solids_ppm: Sample<f32>,
}

/// Inertial and barometric measurements.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct InertialSamples {
    pub accel: Sample<Vector3>,
    pub gyro: Sample<Vector3>,
    pub mag: Sample<Vector3>,
    pub baro: Sample<BaroReading>,
}

/// Battery measurements.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PowerSamples {
    pub voltage: Sample<f32>,
    pub filtered_voltage: Sample<f32>,
}

/// Output of the navigation collaborator.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NavigationSolution {
    pub orientation: Quaternion,
    pub world_accel: Vector3,
    pub velocity: Vector3,
    pub position: Vector3,
}

/// Storage bookkeeping mirrored into the record.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StorageStatus {
    pub capacity_bytes: Sample<u64>,
    pub log_rate_hz: u16,
    pub logging_enabled: bool,
}

/// Warning and fault indicators.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordFlags {
    /// Sticky: once raised it stays raised for the rest of the mission.
    pub warning: bool,
    /// Actuator driver reported a fault this cycle.
    pub actuator_fault: bool,
    /// Storage write failed this cycle.
    pub storage_fault: bool,
}

/// Mutable snapshot shared by every subsystem during one cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MissionRecord {
    pub time_us: TimestampMicros,
    pub delta_time_s: f32,
    pub cycle: u32,
    pub state: MissionState,
    pub environment: EnvironmentSamples,
    pub inertial: InertialSamples,
    pub power: PowerSamples,
    pub navigation: Sample<NavigationSolution>,
    /// `None` until the actuator has been sampled this cycle.
    pub actuator: Option<ActuatorTelemetry>,
    pub storage: StorageStatus,
    pub flags: RecordFlags,
}

impl MissionRecord {
    #[must_use]
    pub fn new() -> Self {
        Self {
            time_us: 0,
            delta_time_s: 0.0,
            cycle: 0,
            state: MissionState::Initialization,
            environment: EnvironmentSamples::default(),
            inertial: InertialSamples::default(),
            power: PowerSamples::default(),
            navigation: Sample::Missing,
            actuator: None,
            storage: StorageStatus::default(),
            flags: RecordFlags::default(),
        }
    }

    /// Opens a new cycle: stamps the header, ages every sample, and clears the
    /// per-cycle slots. The sticky warning survives.
    pub fn begin_cycle(
        &mut self,
        now: TimestampMicros,
        delta_time_s: f32,
        state: MissionState,
    ) {
        self.time_us = now;
        self.delta_time_s = delta_time_s;
        self.cycle = self.cycle.wrapping_add(1);
        self.state = state;

        self.environment.temperature_c.age();
        self.environment.pressure_mbar.age();
        self.environment.dissolved_solids_ppm.age();
        self.inertial.accel.age();
        self.inertial.gyro.age();
        self.inertial.mag.age();
        self.inertial.baro.age();
        self.power.voltage.age();
        self.power.filtered_voltage.age();
        self.navigation.age();
        self.storage.capacity_bytes.age();

        self.actuator = None;
        self.flags.actuator_fault = false;
        self.flags.storage_fault = false;
    }

    /// Returns `true` once every mandatory per-cycle slot has been written.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.actuator.is_some()
    }

    /// Raises the sticky warning flag.
    pub fn raise_warning(&mut self) {
        self.flags.warning = true;
    }
}

impl Default for MissionRecord {
    fn default() -> Self {
        Self::new()
    }
}
