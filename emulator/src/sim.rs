use std::cell::Cell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use mission_core::actuator::{Direction, MicrostepPins, StepperDriver};
use mission_core::config::{DEFAULT_LOG_RATE_HZ, StepperGeometry};
use mission_core::platform::{
    Collaborators, CommandSet, IdleLatch, IndicatorPattern, MissionPlatform, Navigation,
    SensorSuite, StatusIndicator, StorageSink, TelemetryLink,
};
use mission_core::record::{BaroReading, MissionRecord, NavigationSolution, Vector3};
use mission_core::telemetry::{LineAssembler, LineError, TelemetryFrame};
use mission_core::timing::interval_to_hz;

const GRAVITY: f32 = 9.81;
const SURFACE_PRESSURE_MBAR: f32 = 1_013.25;
const MBAR_PER_METRE: f32 = 98.1;
const SURFACE_TEMPERATURE_C: f32 = 18.0;
const MAX_DEPTH_M: f32 = 40.0;
/// Vertical acceleration at full ballast offset from neutral.
const BUOYANCY_GAIN: f32 = 0.6;
const DRAG: f32 = 0.8;
const PACK_FULL_VOLTS: f32 = 12.6;
const DEFAULT_CARD_BYTES: u64 = 32 * 1024 * 1024;

/// Carriage position shared between the driver model and the sensors.
pub type Ballast = Rc<Cell<i64>>;

/// Step/direction driver model counting sixteenth microsteps from the limit
/// switch.
#[derive(Debug)]
pub struct SimDriver {
    microsteps: Ballast,
    subdivision: i64,
    direction: Direction,
    pub fault: bool,
}

impl SimDriver {
    pub fn new(microsteps: Ballast) -> Self {
        Self {
            microsteps,
            subdivision: 2,
            direction: Direction::Sink,
            fault: false,
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
        let current = self.microsteps.get();
        match self.direction {
            Direction::Sink => self.microsteps.set(current + delta),
            Direction::Rise => self.microsteps.set(current - delta),
        }
    }

    fn fault_asserted(&mut self) -> bool {
        self.fault
    }

    fn limit_engaged(&mut self) -> bool {
        self.microsteps.get() <= 0
    }
}

/// Water column and battery model sampled like the real sensor stack.
///
/// Each probe has its own conversion cadence, so some cycles leave fields
/// untouched and the record carries them forward as stale.
#[derive(Debug)]
pub struct HostSensors {
    ballast: Ballast,
    travel_microsteps: f32,
    dt: f32,
    depth_m: f32,
    vertical_speed: f32,
    vertical_accel: f32,
    cycle: u32,
    volts: f32,
    pub fail_init: bool,
}

impl HostSensors {
    pub fn new(ballast: Ballast, geometry: &StepperGeometry, cycle: Duration) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let travel_microsteps = (u64::from(geometry.travel_steps) * 16) as f32;

        Self {
            ballast,
            travel_microsteps: travel_microsteps.max(1.0),
            dt: cycle.as_secs_f32(),
            depth_m: 0.0,
            vertical_speed: 0.0,
            vertical_accel: 0.0,
            cycle: 0,
            volts: PACK_FULL_VOLTS,
            fail_init: false,
        }
    }

    #[must_use]
    pub fn depth_m(&self) -> f32 {
        self.depth_m
    }

    #[allow(clippy::cast_precision_loss)]
    fn ballast_fraction(&self) -> f32 {
        (self.ballast.get() as f32 / self.travel_microsteps).clamp(0.0, 1.0)
    }

    fn advance_water_column(&mut self) {
        let offset = self.ballast_fraction() - 0.5;
        self.vertical_accel = offset * BUOYANCY_GAIN - DRAG * self.vertical_speed;
        self.vertical_speed += self.vertical_accel * self.dt;
        self.depth_m += self.vertical_speed * self.dt;

        if self.depth_m <= 0.0 {
            self.depth_m = 0.0;
            self.vertical_speed = self.vertical_speed.max(0.0);
        } else if self.depth_m >= MAX_DEPTH_M {
            self.depth_m = MAX_DEPTH_M;
            self.vertical_speed = self.vertical_speed.min(0.0);
        }
    }
}

impl SensorSuite for HostSensors {
    type Error = io::Error;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.fail_init {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "pressure probe did not answer",
            ));
        }
        Ok(())
    }

    fn battery_voltage(&mut self) -> Option<f32> {
        Some(self.volts)
    }

    fn sample_environment(&mut self, record: &mut MissionRecord) {
        self.cycle = self.cycle.wrapping_add(1);
        self.advance_water_column();

        record
            .environment
            .temperature_c
            .update(SURFACE_TEMPERATURE_C - 0.2 * self.depth_m);
        if self.cycle % 2 == 0 {
            record
                .environment
                .pressure_mbar
                .update(SURFACE_PRESSURE_MBAR + MBAR_PER_METRE * self.depth_m);
        }
        if self.cycle % 10 == 0 {
            record.environment.dissolved_solids_ppm.update(210.0);
        }
    }

    fn sample_inertial(&mut self, record: &mut MissionRecord) {
        record
            .inertial
            .accel
            .update(Vector3::new(0.0, 0.0, -GRAVITY - self.vertical_accel));
        record.inertial.gyro.update(Vector3::default());
        record.inertial.mag.update(Vector3::new(0.21, 0.0, -0.43));
        if self.cycle % 4 == 0 {
            record.inertial.baro.update(BaroReading {
                pressure_pa: 101_325.0,
                temperature_c: 24.0,
            });
        }
    }

    fn sample_power(&mut self, record: &mut MissionRecord) {
        self.volts = (self.volts - 1.0e-6).max(0.0);
        record.power.voltage.update(self.volts);

        let filtered = record
            .power
            .filtered_voltage
            .value()
            .map_or(self.volts, |previous| previous * 0.9 + self.volts * 0.1);
        record.power.filtered_voltage.update(filtered);
    }
}

/// Dead-reckons vertical motion from the fresh accelerometer sample.
#[derive(Debug, Default)]
pub struct HostNavigation {
    velocity: Vector3,
    position: Vector3,
}

impl Navigation for HostNavigation {
    fn update(&mut self, record: &mut MissionRecord) {
        if !record.inertial.accel.is_fresh() {
            return;
        }
        let Some(accel) = record.inertial.accel.value() else {
            return;
        };

        let dt = record.delta_time_s;
        let world = Vector3::new(accel.x, accel.y, accel.z + GRAVITY);
        self.velocity.z += world.z * dt;
        self.position.z += self.velocity.z * dt;

        record.navigation.update(NavigationSolution {
            world_accel: world,
            velocity: self.velocity,
            position: self.position,
            ..NavigationSolution::default()
        });
    }
}

/// CSV mission log with a simulated card capacity.
pub struct CsvStorage {
    writer: Box<dyn Write>,
    rate_hz: u16,
    capacity_bytes: u64,
    written_bytes: u64,
    pub fail_writes: u32,
    pub fail_init: bool,
}

impl CsvStorage {
    /// Logs to `path`, or discards records when no path is given.
    pub fn open(path: Option<&Path>) -> io::Result<Self> {
        let writer: Box<dyn Write> = match path {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(io::sink()),
        };

        Ok(Self {
            writer,
            rate_hz: DEFAULT_LOG_RATE_HZ,
            capacity_bytes: DEFAULT_CARD_BYTES,
            written_bytes: 0,
            fail_writes: 0,
            fail_init: false,
        })
    }

    fn write_counted(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.written_bytes += line.len() as u64;
        Ok(())
    }
}

impl StorageSink for CsvStorage {
    type Error = io::Error;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.fail_init {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no card"));
        }
        self.write_counted(
            "time_us,cycle,state,position,target,temp_c,pressure_mbar,tds_ppm,volts,warning\n",
        )?;
        self.writer.flush()
    }

    fn log_data(&mut self, record: &MissionRecord) -> Result<(), Self::Error> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(io::Error::other("injected write failure"));
        }
        if self.written_bytes >= self.capacity_bytes {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "card full"));
        }

        let (position, target) = record
            .actuator
            .map_or((f64::NAN, f64::NAN), |actuator| {
                (actuator.position, actuator.target)
            });
        let line = format!(
            "{},{},{},{:.2},{:.2},{},{},{},{},{}\n",
            record.time_us,
            record.cycle,
            record.state,
            position,
            target,
            csv_field(record.environment.temperature_c.value()),
            csv_field(record.environment.pressure_mbar.value()),
            csv_field(record.environment.dissolved_solids_ppm.value()),
            csv_field(record.power.voltage.value()),
            u8::from(record.flags.warning),
        );
        self.write_counted(&line)?;
        self.writer.flush()
    }

    fn logging_interval_hz(&self) -> u16 {
        self.rate_hz
    }

    fn set_logging_interval(&mut self, interval: Duration) {
        self.rate_hz = interval_to_hz(interval);
    }

    fn update_capacity(&mut self, record: &mut MissionRecord) {
        record
            .storage
            .capacity_bytes
            .update(self.capacity_bytes.saturating_sub(self.written_bytes));
    }
}

fn csv_field(value: Option<f32>) -> String {
    value.map_or_else(String::new, |value| format!("{value:.2}"))
}

/// Ground-station link fed from the emulator prompt.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    inbound: VecDeque<u8>,
    assembler: LineAssembler,
    commands: CommandSet,
    latch: IdleLatch,
    frames: Vec<String>,
    rejected: Vec<LineError>,
    idle: bool,
}

impl ScriptedLink {
    /// Queues one operator line for the next transport pass.
    pub fn push_line(&mut self, line: &str) {
        self.inbound.extend(line.bytes());
        self.inbound.push_back(b'\n');
    }

    pub fn drain_frames(&mut self) -> Vec<String> {
        std::mem::take(&mut self.frames)
    }

    pub fn drain_rejected(&mut self) -> Vec<LineError> {
        std::mem::take(&mut self.rejected)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.idle
    }
}

impl TelemetryLink for ScriptedLink {
    type Error = core::convert::Infallible;

    fn init(&mut self) {
        self.inbound.clear();
        self.frames.clear();
    }

    fn handle_transport(&mut self, _: &MissionRecord) -> bool {
        while let Some(byte) = self.inbound.pop_front() {
            if let Err(error) = self.assembler.ingest(byte, &mut self.commands) {
                self.rejected.push(error);
            }
        }

        self.latch.poll(&self.commands)
    }

    fn send_frame(&mut self, frame: &TelemetryFrame) -> Result<(), Self::Error> {
        self.frames.push(frame.to_line());
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

/// Remembers pattern changes so the prompt can print them.
#[derive(Debug, Default)]
pub struct ConsoleIndicator {
    current: Option<IndicatorPattern>,
    changes: Vec<IndicatorPattern>,
}

impl ConsoleIndicator {
    pub fn drain_changes(&mut self) -> Vec<IndicatorPattern> {
        std::mem::take(&mut self.changes)
    }

    #[must_use]
    pub fn current(&self) -> Option<IndicatorPattern> {
        self.current
    }
}

impl StatusIndicator for ConsoleIndicator {
    fn show(&mut self, pattern: IndicatorPattern) {
        if self.current != Some(pattern) {
            self.current = Some(pattern);
            self.changes.push(pattern);
        }
    }
}

pub struct HostPlatform;

impl MissionPlatform for HostPlatform {
    type Sensors = HostSensors;
    type Navigation = HostNavigation;
    type Storage = CsvStorage;
    type Link = ScriptedLink;
    type Driver = SimDriver;
    type Indicator = ConsoleIndicator;
}

/// Builds the host collaborators with the carriage parked `start_steps` from
/// the switch.
pub fn host_collaborators(
    geometry: &StepperGeometry,
    cycle: Duration,
    start_steps: i64,
    log_path: Option<&Path>,
) -> io::Result<Collaborators<HostPlatform>> {
    let ballast: Ballast = Rc::new(Cell::new(start_steps * 16));

    Ok(Collaborators {
        sensors: HostSensors::new(Rc::clone(&ballast), geometry, cycle),
        navigation: HostNavigation::default(),
        storage: CsvStorage::open(log_path)?,
        link: ScriptedLink::default(),
        driver: SimDriver::new(ballast),
        indicator: ConsoleIndicator::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballast_past_neutral_sinks_the_vehicle() {
        let geometry = StepperGeometry::default();
        let ballast: Ballast = Rc::new(Cell::new(i64::from(geometry.travel_steps) * 16));
        let mut sensors = HostSensors::new(ballast, &geometry, Duration::from_millis(10));
        let mut record = MissionRecord::new();

        for _ in 0..1_000 {
            sensors.sample_environment(&mut record);
        }

        assert!(sensors.depth_m() > 1.0);
        let pressure = record.environment.pressure_mbar.value().expect("sampled");
        assert!(pressure > SURFACE_PRESSURE_MBAR);
    }

    #[test]
    fn scripted_link_applies_queued_lines() {
        let mut link = ScriptedLink::default();
        let record = MissionRecord::new();

        link.push_line("rate 20");
        link.push_line("bogus");
        link.push_line("idle");

        assert!(link.handle_transport(&record));
        assert_eq!(link.commands().log_rate_hz, Some(20));
        assert_eq!(link.drain_rejected(), vec![LineError::Syntax]);
        assert!(!link.handle_transport(&record), "idle is latched");
    }

    #[test]
    fn csv_storage_counts_capacity() {
        let mut storage = CsvStorage::open(None).expect("sink");
        let mut record = MissionRecord::new();
        storage.init().expect("init");

        storage.log_data(&record).expect("write");
        storage.update_capacity(&mut record);

        let remaining = record.storage.capacity_bytes.value().expect("polled");
        assert!(remaining < DEFAULT_CARD_BYTES);

        storage.fail_writes = 1;
        assert!(storage.log_data(&record).is_err());
        assert!(storage.log_data(&record).is_ok());
    }
}
