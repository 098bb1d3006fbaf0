use core::{fmt, time::Duration};

use super::{
    ActuatorFault, ActuatorMode, ActuatorTelemetry, Resolution, Stepper, StepperDriver,
};
use crate::config::{MotionProfile, StepperGeometry};
use crate::timing::{TimestampMicros, duration_to_micros};

/// Creep speed divisor applied on the final approach to the limit switch.
const CREEP_SPEED_DIVISOR: f32 = 4.0;

/// Reason a calibration attempt was abandoned.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CalibrationError {
    /// The limit switch was not reached before the timeout elapsed.
    LimitNotReached,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CalibrationPhase {
    Inactive,
    Seek,
    BackOff,
    Creep,
}

/// Ballast actuator built on a [`Stepper`].
///
/// Position zero is the limit switch at the fully-risen extreme; the sink
/// extreme sits at [`StepperGeometry::travel_steps`].
#[derive(Debug)]
pub struct BuoyancyActuator<D> {
    stepper: Stepper<D>,
    geometry: StepperGeometry,
    mode: ActuatorMode,
    sinking: bool,
    rising: bool,
    calibrated: bool,
    calibration: CalibrationPhase,
    calibration_started: TimestampMicros,
    calibration_timeout: Duration,
}

impl<D> BuoyancyActuator<D>
where
    D: StepperDriver,
{
    pub fn new(driver: D, geometry: StepperGeometry, calibration_timeout: Duration) -> Self {
        Self {
            stepper: Stepper::new(driver, Resolution::Half),
            geometry,
            mode: ActuatorMode::Idle,
            sinking: false,
            rising: false,
            calibrated: false,
            calibration: CalibrationPhase::Inactive,
            calibration_started: 0,
            calibration_timeout,
        }
    }

    /// Switches to half stepping and applies a speed/acceleration profile
    /// expressed in half-step pulses.
    pub fn apply_profile(&mut self, profile: MotionProfile) {
        self.stepper.set_resolution(Resolution::Half);
        self.stepper.set_max_speed(profile.speed);
        self.stepper.set_acceleration(profile.acceleration);
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.stepper.set_resolution(resolution);
    }

    /// Targets the fully-flooded extreme.
    pub fn sink(&mut self) {
        self.stepper.move_to(f64::from(self.geometry.travel_steps));
        self.sinking = true;
        self.rising = false;
        self.mode = ActuatorMode::Sinking;
    }

    /// Targets the fully-risen extreme at the limit switch.
    pub fn rise(&mut self) {
        self.stepper.move_to(0.0);
        self.sinking = false;
        self.rising = true;
        self.mode = ActuatorMode::Rising;
    }

    /// Stops the carriage where it is and abandons any calibration in flight.
    pub fn hold(&mut self) {
        self.stepper.hold();
        self.sinking = false;
        self.rising = false;
        self.calibration = CalibrationPhase::Inactive;
        self.mode = ActuatorMode::Idle;
    }

    /// Targets an absolute carriage offset in millimetres from the switch.
    pub fn move_mm(&mut self, mm: f32) {
        self.stepper
            .move_to(f64::from(mm * self.geometry.steps_per_mm()));
    }

    pub fn set_current_position(&mut self, position: f64) {
        self.stepper.set_current_position(position);
    }

    /// Polls the driver and advances motion by one increment.
    ///
    /// # Errors
    ///
    /// Propagates [`ActuatorFault`] from the stepper; the mode reads
    /// [`ActuatorMode::Faulted`] until a later update succeeds.
    pub fn update(&mut self, now: TimestampMicros) -> Result<(), ActuatorFault> {
        match self.stepper.update(now) {
            Ok(()) => {
                if self.mode == ActuatorMode::Faulted {
                    self.mode = self.motion_mode();
                }
                Ok(())
            }
            Err(fault) => {
                self.mode = ActuatorMode::Faulted;
                Err(fault)
            }
        }
    }

    /// Starts a new zeroing run towards the limit switch.
    pub fn begin_calibration(&mut self, now: TimestampMicros) {
        let overshoot = f64::from(self.geometry.travel_steps)
            + f64::from(self.geometry.recheck_backoff_steps);

        self.stepper.set_resolution(Resolution::Half);
        self.stepper.move_by(-overshoot);
        self.calibration = CalibrationPhase::Seek;
        self.calibration_started = now;
        self.calibrated = false;
        self.sinking = false;
        self.rising = true;
        self.mode = ActuatorMode::Calibrating;
    }

    /// Drives one step of the zeroing sequence; poll once per cycle after
    /// [`update`](Self::update).
    ///
    /// On first contact the carriage backs off the switch, drops to eighth
    /// stepping, and creeps back in. Returns `Ok(true)` once the switch is
    /// engaged and the position has been zeroed, `Ok(false)` while still
    /// travelling.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::LimitNotReached`] when the attempt outlives
    /// the configured timeout; the carriage is held in place.
    pub fn calibrate(&mut self, now: TimestampMicros) -> Result<bool, CalibrationError> {
        if self.calibration == CalibrationPhase::Inactive {
            self.begin_calibration(now);
        }

        let elapsed = now.saturating_sub(self.calibration_started);
        if elapsed > duration_to_micros(self.calibration_timeout) {
            self.hold();
            self.stepper.set_resolution(Resolution::Half);
            return Err(CalibrationError::LimitNotReached);
        }

        let engaged = self.stepper.limit_engaged();
        match self.calibration {
            CalibrationPhase::Seek if engaged => {
                if self.geometry.recheck_backoff_steps == 0 {
                    self.finish_calibration();
                    return Ok(true);
                }

                self.stepper.set_current_position(0.0);
                self.stepper
                    .move_to(f64::from(self.geometry.recheck_backoff_steps));
                self.calibration = CalibrationPhase::BackOff;
            }
            CalibrationPhase::BackOff if self.stepper.is_at_target() && !engaged => {
                self.stepper.set_resolution(Resolution::Eighth);
                let creep = self.stepper.max_speed() / CREEP_SPEED_DIVISOR;
                self.stepper.set_max_speed(creep);
                self.stepper
                    .move_to(-2.0 * f64::from(self.geometry.recheck_backoff_steps));
                self.calibration = CalibrationPhase::Creep;
            }
            CalibrationPhase::Creep if engaged => {
                self.finish_calibration();
                return Ok(true);
            }
            _ => {}
        }

        Ok(false)
    }

    fn finish_calibration(&mut self) {
        self.stepper.set_current_position(0.0);
        if self.stepper.resolution() != Resolution::Half {
            let restored = self.stepper.max_speed() * CREEP_SPEED_DIVISOR;
            self.stepper.set_max_speed(restored);
            self.stepper.set_resolution(Resolution::Half);
        }
        self.calibration = CalibrationPhase::Inactive;
        self.calibrated = true;
        self.sinking = false;
        self.rising = false;
        self.mode = ActuatorMode::Idle;
    }

    fn motion_mode(&self) -> ActuatorMode {
        if self.calibration != CalibrationPhase::Inactive {
            ActuatorMode::Calibrating
        } else if self.sinking {
            ActuatorMode::Sinking
        } else if self.rising {
            ActuatorMode::Rising
        } else {
            ActuatorMode::Idle
        }
    }

    #[must_use]
    pub fn is_at_target(&self) -> bool {
        self.stepper.is_at_target()
    }

    #[must_use]
    pub const fn position(&self) -> f64 {
        self.stepper.current_position()
    }

    #[must_use]
    pub const fn target(&self) -> f64 {
        self.stepper.target_position()
    }

    #[must_use]
    pub fn position_mm(&self) -> f32 {
        self.to_mm(self.stepper.current_position())
    }

    #[must_use]
    pub fn target_mm(&self) -> f32 {
        self.to_mm(self.stepper.target_position())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_mm(&self, steps: f64) -> f32 {
        let per_mm = self.geometry.steps_per_mm();
        if per_mm <= 0.0 {
            return 0.0;
        }

        (steps / f64::from(per_mm)) as f32
    }

    #[must_use]
    pub const fn limit_engaged(&self) -> bool {
        self.stepper.limit_engaged()
    }

    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    #[must_use]
    pub const fn is_sinking(&self) -> bool {
        self.sinking
    }

    #[must_use]
    pub const fn is_rising(&self) -> bool {
        self.rising
    }

    #[must_use]
    pub const fn mode(&self) -> ActuatorMode {
        self.mode
    }

    #[must_use]
    pub const fn geometry(&self) -> &StepperGeometry {
        &self.geometry
    }

    pub fn stepper(&self) -> &Stepper<D> {
        &self.stepper
    }

    pub fn stepper_mut(&mut self) -> &mut Stepper<D> {
        &mut self.stepper
    }

    /// Snapshot for the mission record.
    #[must_use]
    pub fn telemetry(&self) -> ActuatorTelemetry {
        ActuatorTelemetry {
            position: self.position(),
            target: self.target(),
            position_mm: self.position_mm(),
            target_mm: self.target_mm(),
            speed: self.stepper.speed(),
            max_speed: self.stepper.max_speed(),
            acceleration: self.stepper.acceleration(),
            limit_engaged: self.limit_engaged(),
            calibrated: self.calibrated,
            resolution: self.stepper.resolution(),
            mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]

    use super::*;
    use crate::actuator::{Direction, MicrostepPins};

    /// Carriage simulation with the switch closed at or below zero.
    struct CarriageDriver {
        microsteps: i64,
        subdivision: i64,
        direction: Direction,
        fault: bool,
    }

    impl CarriageDriver {
        fn at_full_steps(steps: i64) -> Self {
            Self {
                microsteps: steps * 16,
                subdivision: 2,
                direction: Direction::Sink,
                fault: false,
            }
        }
    }

    impl StepperDriver for CarriageDriver {
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
        }

        fn fault_asserted(&mut self) -> bool {
            self.fault
        }

        fn limit_engaged(&mut self) -> bool {
            self.microsteps <= 0
        }
    }

    fn actuator(start: i64) -> BuoyancyActuator<CarriageDriver> {
        let mut actuator = BuoyancyActuator::new(
            CarriageDriver::at_full_steps(start),
            StepperGeometry::new(2_000, 20.0, 100),
            Duration::from_secs(30),
        );
        actuator.apply_profile(MotionProfile::new(1_500.0, 1_500.0));
        actuator
    }

    fn calibrate_to_completion(actuator: &mut BuoyancyActuator<CarriageDriver>) -> u64 {
        let mut now = 0;
        loop {
            actuator.update(now).expect("driver healthy");
            if actuator.calibrate(now).expect("calibration within timeout") {
                return now;
            }
            now += 1_000;
        }
    }

    #[test]
    fn move_mm_settles_on_the_nearest_pulse() {
        let mut actuator = actuator(1_200);
        let mut now = calibrate_to_completion(&mut actuator);

        actuator.move_mm(2.502_5);
        assert!((actuator.target_mm() - 2.502_5).abs() < 1e-4);

        let deadline = now + 30_000_000;
        while !actuator.is_at_target() {
            now += 1_000;
            actuator.update(now).expect("driver healthy");
            assert!(now < deadline, "carriage kept hunting");
        }

        assert_eq!(actuator.position(), 250.0);
        assert!((actuator.position_mm() - 2.5).abs() < 1e-4);
        for _ in 0..100 {
            now += 1_000;
            actuator.update(now).expect("driver healthy");
        }
        assert_eq!(actuator.position(), 250.0);
    }

    #[test]
    fn calibration_zeroes_against_the_switch() {
        let mut actuator = actuator(1_200);

        calibrate_to_completion(&mut actuator);

        assert_eq!(actuator.position(), 0.0);
        assert!(actuator.limit_engaged());
        assert!(actuator.is_calibrated());
        assert_eq!(actuator.stepper().resolution(), Resolution::Half);
        assert_eq!(actuator.stepper().max_speed(), 1_500.0);
        assert_eq!(actuator.mode(), ActuatorMode::Idle);
    }

    #[test]
    fn calibration_corrects_accumulated_offset() {
        let mut actuator = actuator(0);
        actuator.set_current_position(37.5);

        calibrate_to_completion(&mut actuator);

        assert_eq!(actuator.position(), 0.0);
        assert!(actuator.stepper().driver().microsteps <= 0);
    }

    #[test]
    fn calibration_times_out_when_switch_never_closes() {
        let mut actuator = BuoyancyActuator::new(
            crate::actuator::NoopStepperDriver::new(),
            StepperGeometry::default(),
            Duration::from_millis(10),
        );

        assert_eq!(actuator.calibrate(0), Ok(false));
        assert_eq!(
            actuator.calibrate(10_001),
            Err(CalibrationError::LimitNotReached)
        );
        assert!(!actuator.is_calibrated());
        assert_eq!(actuator.mode(), ActuatorMode::Idle);
    }

    #[test]
    fn sink_and_rise_target_the_extremes() {
        let mut actuator = actuator(0);

        actuator.sink();
        assert_eq!(actuator.target(), 2_000.0);
        assert!(actuator.is_sinking() && !actuator.is_rising());
        assert_eq!(actuator.target_mm(), 20.0);

        actuator.rise();
        assert_eq!(actuator.target(), 0.0);
        assert!(actuator.is_rising() && !actuator.is_sinking());
    }

    #[test]
    fn fault_marks_mode_until_cleared() {
        let mut actuator = actuator(100);
        actuator.set_current_position(100.0);
        actuator.sink();

        actuator.stepper_mut().driver_mut().fault = true;
        assert_eq!(actuator.update(0), Err(ActuatorFault::DriverFault));
        assert_eq!(actuator.mode(), ActuatorMode::Faulted);
        assert_eq!(actuator.position(), 100.0);

        actuator.stepper_mut().driver_mut().fault = false;
        assert_eq!(actuator.update(1_000), Ok(()));
        assert_eq!(actuator.mode(), ActuatorMode::Sinking);
    }
}
