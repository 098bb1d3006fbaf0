#![allow(dead_code)]

use core::time::Duration;

use mission_core::actuator::{Direction, MicrostepPins, StepperDriver};
use mission_core::config::{MissionConfig, StepperGeometry};
use mission_core::mission::{MissionController, MissionState, Transition};
use mission_core::orchestrator::MissionContext;
use mission_core::platform::{
    Collaborators, CommandSet, IdleLatch, IndicatorPattern, MissionPlatform, Navigation,
    SensorSuite, StatusIndicator, StorageSink, TelemetryLink,
};
use mission_core::record::{MissionRecord, NavigationSolution, Vector3};
use mission_core::telemetry::{FrameHalf, TelemetryFrame};
use mission_core::timing::{TimestampMicros, interval_to_hz};

/// Main-loop spacing used by every scenario.
pub const CYCLE_US: TimestampMicros = 10_000;

/// Carriage model counting sixteenth microsteps; the switch closes at or
/// below zero.
#[derive(Debug)]
pub struct SimDriver {
    pub microsteps: i64,
    pub subdivision: i64,
    pub direction: Direction,
    pub fault: bool,
    pub pulses: u64,
}

impl SimDriver {
    pub fn at_full_steps(steps: i64) -> Self {
        Self {
            microsteps: steps * 16,
            subdivision: 2,
            direction: Direction::Sink,
            fault: false,
            pulses: 0,
        }
    }
}

impl StepperDriver for SimDriver {
    fn select_microsteps(&mut self, pins: MicrostepPins) {
        self.subdivision = match (pins.ms1, pins.ms2) {
            (false, true) => 2,
            (true, false) => 4,
            (false, false) => 8,
            (true, true) => 16,
        };
    }

    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    fn pulse(&mut self) {
        let delta = 16 / self.subdivision;
        match self.direction {
            Direction::Sink => self.microsteps += delta,
            Direction::Rise => self.microsteps -= delta,
        }
        self.pulses += 1;
    }

    fn fault_asserted(&mut self) -> bool {
        self.fault
    }

    fn limit_engaged(&mut self) -> bool {
        self.microsteps <= 0
    }
}

#[derive(Debug, Default)]
pub struct SimSensors {
    pub battery: Option<f32>,
    pub fail_init: bool,
    pub samples: u32,
}

impl SensorSuite for SimSensors {
    type Error = &'static str;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.fail_init {
            return Err("imu did not respond");
        }
        Ok(())
    }

    fn battery_voltage(&mut self) -> Option<f32> {
        self.battery
    }

    fn sample_environment(&mut self, record: &mut MissionRecord) {
        self.samples += 1;
        record.environment.temperature_c.update(14.0);
        // The pressure probe only converts every other cycle.
        if self.samples % 2 == 0 {
            record.environment.pressure_mbar.update(1_020.0);
        }
    }

    fn sample_inertial(&mut self, record: &mut MissionRecord) {
        record.inertial.accel.update(Vector3::new(0.0, 0.0, -9.81));
    }

    fn sample_power(&mut self, record: &mut MissionRecord) {
        if let Some(volts) = self.battery {
            record.power.voltage.update(volts);
        }
    }
}

#[derive(Debug, Default)]
pub struct SimNavigation;

impl Navigation for SimNavigation {
    fn update(&mut self, record: &mut MissionRecord) {
        if let Some(accel) = record.inertial.accel.value() {
            record.navigation.update(NavigationSolution {
                world_accel: accel,
                ..NavigationSolution::default()
            });
        }
    }
}

#[derive(Debug)]
pub struct SimStorage {
    pub fail_init: bool,
    /// Number of upcoming writes that fail.
    pub fail_writes: u32,
    pub written: Vec<MissionRecord>,
    pub rate_hz: u16,
    pub capacity_polls: u32,
}

impl Default for SimStorage {
    fn default() -> Self {
        Self {
            fail_init: false,
            fail_writes: 0,
            written: Vec::new(),
            rate_hz: 0,
            capacity_polls: 0,
        }
    }
}

impl StorageSink for SimStorage {
    type Error = &'static str;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.fail_init {
            return Err("no card");
        }
        Ok(())
    }

    fn log_data(&mut self, record: &MissionRecord) -> Result<(), Self::Error> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err("write failed");
        }
        self.written.push(*record);
        Ok(())
    }

    fn logging_interval_hz(&self) -> u16 {
        self.rate_hz
    }

    fn set_logging_interval(&mut self, interval: Duration) {
        self.rate_hz = interval_to_hz(interval);
    }

    fn update_capacity(&mut self, record: &mut MissionRecord) {
        self.capacity_polls += 1;
        record
            .storage
            .capacity_bytes
            .update(1_000_000 - 64 * self.written.len() as u64);
    }
}

/// Returned by [`SimLink`] while `link_down` is set.
#[derive(Debug, Eq, PartialEq)]
pub struct LinkDown;

#[derive(Debug, Default)]
pub struct SimLink {
    pub commands: CommandSet,
    pub latch: IdleLatch,
    pub frames: Vec<FrameHalf>,
    pub idle: bool,
    pub initialized: bool,
    pub link_down: bool,
}

impl TelemetryLink for SimLink {
    type Error = LinkDown;

    fn init(&mut self) {
        self.initialized = true;
    }

    fn handle_transport(&mut self, _: &MissionRecord) -> bool {
        self.latch.poll(&self.commands)
    }

    fn send_frame(&mut self, frame: &TelemetryFrame) -> Result<(), Self::Error> {
        if self.link_down {
            return Err(LinkDown);
        }
        self.frames.push(frame.half());
        Ok(())
    }

    fn commands(&self) -> CommandSet {
        self.commands
    }

    fn set_idle(&mut self, idle: bool) {
        self.idle = idle;
        self.latch.set(idle);
    }
}

#[derive(Debug, Default)]
pub struct SimIndicator {
    pub last: Option<IndicatorPattern>,
}

impl StatusIndicator for SimIndicator {
    fn show(&mut self, pattern: IndicatorPattern) {
        self.last = Some(pattern);
    }
}

pub struct SimPlatform;

impl MissionPlatform for SimPlatform {
    type Sensors = SimSensors;
    type Navigation = SimNavigation;
    type Storage = SimStorage;
    type Link = SimLink;
    type Driver = SimDriver;
    type Indicator = SimIndicator;
}

pub fn geometry() -> StepperGeometry {
    StepperGeometry::new(200, 2.0, 20)
}

pub fn collaborators(start_steps: i64) -> Collaborators<SimPlatform> {
    Collaborators {
        sensors: SimSensors {
            battery: Some(12.4),
            ..SimSensors::default()
        },
        navigation: SimNavigation,
        storage: SimStorage::default(),
        link: SimLink::default(),
        driver: SimDriver::at_full_steps(start_steps),
        indicator: SimIndicator::default(),
    }
}

pub fn context(parts: Collaborators<SimPlatform>) -> MissionContext<SimPlatform> {
    MissionContext::new(MissionConfig::new(geometry()), parts)
}

pub fn controller(parts: Collaborators<SimPlatform>) -> MissionController<SimPlatform> {
    MissionController::new(context(parts))
}

/// Steps the controller until it enters `target`, returning every transition
/// taken on the way and the time of the final step.
pub fn run_until_state(
    controller: &mut MissionController<SimPlatform>,
    start: TimestampMicros,
    target: MissionState,
) -> (Vec<Transition>, TimestampMicros) {
    let mut transitions = Vec::new();
    let mut now = start;

    for _ in 0..200_000 {
        if let Some(transition) = controller.step(now) {
            transitions.push(transition);
            if transition.to == target {
                return (transitions, now);
            }
        }
        now += CYCLE_US;
    }

    panic!("never reached {target}; transitions: {transitions:?}");
}
