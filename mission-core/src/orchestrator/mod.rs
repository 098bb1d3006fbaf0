//! Per-cycle orchestration shared by every mission state.
//!
//! [`MissionContext`] owns the mission record, the actuator, every
//! collaborator, and the periodic tasks that throttle storage writes, capacity
//! polling, and telemetry. [`MissionContext::run_cycle`] performs one full
//! pass in a fixed order: sample, fuse, actuate, account, persist, exchange.
//! Later steps read what earlier steps wrote into the record, so the order is
//! part of the contract.

use core::time::Duration;

use crate::actuator::BuoyancyActuator;
use crate::config::{MissionConfig, MotionProfile};
use crate::mission::{InitError, MissionState};
use crate::platform::{
    CommandSet, Collaborators, IndicatorPattern, MissionPlatform, Navigation, SensorSuite,
    StatusIndicator, StorageSink, TelemetryLink,
};
use crate::record::MissionRecord;
use crate::telemetry::{EventRecorder, FrameHalf, FrameSplitter, MissionEventKind, TelemetryFrame};
use crate::timing::{PeriodicTask, TimestampMicros, hz_to_interval};

type LogOperation<S> = fn((&mut S, &MissionRecord)) -> Result<(), <S as StorageSink>::Error>;
type CapacityOperation<S> = fn((&mut S, &mut MissionRecord));
type SendOperation<L> = fn((&mut L, &TelemetryFrame)) -> Result<(), <L as TelemetryLink>::Error>;

fn persist_record<S: StorageSink>((storage, record): (&mut S, &MissionRecord)) -> Result<(), S::Error> {
    storage.log_data(record)
}

fn refresh_capacity<S: StorageSink>((storage, record): (&mut S, &mut MissionRecord)) {
    storage.update_capacity(record);
}

fn send_frame<L: TelemetryLink>((link, frame): (&mut L, &TelemetryFrame)) -> Result<(), L::Error> {
    link.send_frame(frame)
}

/// Interval-gated work hanging off the cycle.
struct CycleSchedule<P: MissionPlatform> {
    log: PeriodicTask<LogOperation<P::Storage>>,
    capacity: PeriodicTask<CapacityOperation<P::Storage>>,
    telemetry: PeriodicTask<SendOperation<P::Link>>,
}

impl<P: MissionPlatform> CycleSchedule<P> {
    fn new(config: &MissionConfig) -> Self {
        let mut log = PeriodicTask::new(
            hz_to_interval(config.log_rate_hz).unwrap_or(Duration::ZERO),
            persist_record::<P::Storage> as LogOperation<P::Storage>,
        );
        if config.log_rate_hz == 0 {
            log.stop();
        }

        let mut telemetry = PeriodicTask::new(
            hz_to_interval(config.telemetry_rate_hz).unwrap_or(Duration::ZERO),
            send_frame::<P::Link> as SendOperation<P::Link>,
        );
        if config.telemetry_rate_hz == 0 {
            telemetry.stop();
        }

        Self {
            log,
            capacity: PeriodicTask::new(
                config.capacity_poll,
                refresh_capacity::<P::Storage> as CapacityOperation<P::Storage>,
            ),
            telemetry,
        }
    }

    fn reset(&mut self, now: TimestampMicros) {
        self.log.reset(now);
        self.capacity.reset(now);
        self.telemetry.reset(now);
        // Capacity is reported on the first cycle rather than a second later.
        self.capacity.force_due();
    }
}

/// Outcome of one [`MissionContext::run_cycle`] pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub delta_time_s: f32,
    /// `false` when the actuator faulted; target checks must be skipped.
    pub actuator_healthy: bool,
    /// Whether the storage task fired this cycle.
    pub logged: bool,
    /// `false` when a storage write was attempted and failed.
    pub storage_ok: bool,
    pub frame_sent: Option<FrameHalf>,
    /// The ground station asked for Idle; the active state should transition.
    pub idle_requested: bool,
    pub pattern: IndicatorPattern,
}

/// Everything the mission states operate on.
pub struct MissionContext<P: MissionPlatform> {
    pub config: MissionConfig,
    pub record: MissionRecord,
    pub actuator: BuoyancyActuator<P::Driver>,
    pub sensors: P::Sensors,
    pub navigation: P::Navigation,
    pub storage: P::Storage,
    pub link: P::Link,
    pub indicator: P::Indicator,
    pub events: EventRecorder,
    schedule: CycleSchedule<P>,
    splitter: FrameSplitter,
    state: MissionState,
    last_cycle: Option<TimestampMicros>,
    actuator_faulted: bool,
    log_rate_hz: u16,
}

impl<P: MissionPlatform> MissionContext<P> {
    pub fn new(config: MissionConfig, parts: Collaborators<P>) -> Self {
        let Collaborators {
            sensors,
            navigation,
            storage,
            link,
            driver,
            indicator,
        } = parts;

        Self {
            actuator: BuoyancyActuator::new(driver, config.geometry, config.calibration_timeout),
            record: MissionRecord::new(),
            sensors,
            navigation,
            storage,
            link,
            indicator,
            events: EventRecorder::new(),
            schedule: CycleSchedule::new(&config),
            splitter: FrameSplitter::new(),
            state: MissionState::Initialization,
            last_cycle: None,
            actuator_faulted: false,
            log_rate_hz: config.log_rate_hz,
            config,
        }
    }

    /// State tag stamped into each record.
    #[must_use]
    pub const fn state(&self) -> MissionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: MissionState) {
        self.state = state;
        self.record.state = state;
    }

    /// Latest operator commands.
    pub fn commands(&self) -> CommandSet {
        self.link.commands()
    }

    /// Cruise profile: operator overrides layered over the configured default.
    pub fn motion_profile(&self) -> MotionProfile {
        let commands = self.link.commands();
        MotionProfile::new(
            commands.actuator_speed.unwrap_or(self.config.motion.speed),
            commands
                .actuator_acceleration
                .unwrap_or(self.config.motion.acceleration),
        )
    }

    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.schedule.log.is_enabled()
    }

    #[must_use]
    pub const fn log_rate_hz(&self) -> u16 {
        self.log_rate_hz
    }

    /// Power-on bring-up: link, battery check, sensors, storage.
    ///
    /// # Errors
    ///
    /// Returns the first failing step; the caller moves to error indication.
    pub fn initialize(&mut self, now: TimestampMicros) -> Result<(), InitError> {
        self.indicator.show(IndicatorPattern::Startup);
        self.link.init();

        let battery = self.config.battery;
        if self
            .sensors
            .battery_voltage()
            .is_some_and(|volts| battery.is_low(volts))
        {
            return Err(InitError::LowBattery);
        }

        self.sensors.init().map_err(|_| InitError::Sensors)?;
        self.storage.init().map_err(|_| InitError::Storage)?;

        if let Some(interval) = hz_to_interval(self.log_rate_hz) {
            self.storage.set_logging_interval(interval);
        }
        self.schedule.reset(now);
        self.actuator.apply_profile(self.motion_profile());

        Ok(())
    }

    /// Runs one full cycle against the shared record.
    pub fn run_cycle(&mut self, now: TimestampMicros) -> CycleReport {
        let delta_time_s = self
            .last_cycle
            .map_or(0.0, |previous| micros_to_secs(now.saturating_sub(previous)));
        self.last_cycle = Some(now);
        self.record.begin_cycle(now, delta_time_s, self.state);

        self.sensors.sample_environment(&mut self.record);
        self.sensors.sample_inertial(&mut self.record);
        self.sensors.sample_power(&mut self.record);

        self.navigation.update(&mut self.record);

        let actuator_healthy = self.advance_actuator(now);
        self.record.actuator = Some(self.actuator.telemetry());

        self.schedule
            .capacity
            .tick(now, (&mut self.storage, &mut self.record));
        self.record.storage.log_rate_hz = self.storage.logging_interval_hz();
        self.record.storage.logging_enabled = self.schedule.log.is_enabled();

        let (logged, storage_ok) = self.persist(now);

        let idle_requested = self.link.handle_transport(&self.record);
        let frame_sent = self.transmit(now);
        let commands = self.link.commands();
        self.apply_commands(&commands, now);

        let pattern = self.indicator_pattern();
        self.indicator.show(pattern);

        if idle_requested {
            self.events.record(MissionEventKind::IdleRequested, now);
        }

        CycleReport {
            delta_time_s,
            actuator_healthy,
            logged,
            storage_ok,
            frame_sent,
            idle_requested,
            pattern,
        }
    }

    fn advance_actuator(&mut self, now: TimestampMicros) -> bool {
        match self.actuator.update(now) {
            Ok(()) => {
                if self.actuator_faulted {
                    self.actuator_faulted = false;
                    self.events.record(MissionEventKind::ActuatorRecovered, now);
                }
                true
            }
            Err(_) => {
                self.record.flags.actuator_fault = true;
                self.record.raise_warning();
                if !self.actuator_faulted {
                    self.actuator_faulted = true;
                    self.events.record(MissionEventKind::ActuatorFault, now);
                }
                false
            }
        }
    }

    fn persist(&mut self, now: TimestampMicros) -> (bool, bool) {
        debug_assert!(self.record.is_complete(), "record persisted before actuator sample");

        match self.schedule.log.tick(now, (&mut self.storage, &self.record)) {
            None => (false, true),
            Some(Ok(())) => (true, true),
            Some(Err(_)) => {
                self.record.flags.storage_fault = true;
                self.record.raise_warning();
                self.schedule.log.force_due();
                self.events.record(MissionEventKind::StorageWriteFailed, now);
                (true, false)
            }
        }
    }

    fn transmit(&mut self, now: TimestampMicros) -> Option<FrameHalf> {
        if !self.schedule.telemetry.is_due(now) {
            return None;
        }

        let frame = self.splitter.pending_frame(&self.record);
        match self.schedule.telemetry.tick(now, (&mut self.link, &frame))? {
            Ok(()) => {
                self.splitter.advance();
                Some(frame.half())
            }
            Err(_) => {
                // The same half goes out again on the next interval.
                self.events.record(MissionEventKind::TelemetryDropped, now);
                None
            }
        }
    }

    fn apply_commands(&mut self, commands: &CommandSet, now: TimestampMicros) {
        let wanted_hz = commands.effective_log_rate_hz(self.config.log_rate_hz);
        if wanted_hz != self.log_rate_hz {
            self.log_rate_hz = wanted_hz;
            if let Some(interval) = hz_to_interval(wanted_hz) {
                self.schedule.log.set_interval(interval);
                self.storage.set_logging_interval(interval);
            }
            self.events
                .record(MissionEventKind::LogRateChanged(wanted_hz), now);
        }

        let enabled = commands.logging_enabled && self.log_rate_hz > 0;
        if enabled != self.schedule.log.is_enabled() {
            if enabled {
                self.schedule.log.resume();
            } else {
                self.schedule.log.stop();
            }
            self.events
                .record(MissionEventKind::LoggingEnabled(enabled), now);
        }
    }

    fn indicator_pattern(&self) -> IndicatorPattern {
        match self.state {
            MissionState::ErrorIndication => IndicatorPattern::Error,
            MissionState::Initialization => IndicatorPattern::Startup,
            _ if self.record.flags.warning => IndicatorPattern::Warning,
            _ => IndicatorPattern::Nominal,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn micros_to_secs(micros: TimestampMicros) -> f32 {
    micros as f32 / 1_000_000.0
}
