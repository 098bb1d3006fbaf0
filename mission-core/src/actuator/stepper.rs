use num_traits::float::Float;

use super::{ActuatorFault, Direction, Resolution, StepperDriver};
use crate::timing::TimestampMicros;

/// Upper bound on STEP pulses issued by a single [`Stepper::run`] call.
pub const MAX_PULSES_PER_RUN: u32 = 64;

/// Consecutive agreeing samples required before the limit switch changes state.
pub const LIMIT_DEBOUNCE_SAMPLES: u8 = 2;

/// Longest gap credited to the motion model between two runs.
const MAX_RUN_GAP_US: TimestampMicros = 50_000;

/// Sub-pulse distance treated as "on target".
const ARRIVAL_TOLERANCE_PULSES: f64 = 0.5;

/// Debounced view of the carriage limit switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LimitSwitch {
    state: bool,
    candidate: bool,
    streak: u8,
    threshold: u8,
}

impl LimitSwitch {
    #[must_use]
    pub const fn new(threshold: u8) -> Self {
        Self {
            state: false,
            candidate: false,
            streak: 0,
            threshold: if threshold == 0 { 1 } else { threshold },
        }
    }

    /// Feeds one raw reading and returns the debounced state.
    pub fn sample(&mut self, raw: bool) -> bool {
        if raw == self.candidate {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.candidate = raw;
            self.streak = 1;
        }

        if self.streak >= self.threshold {
            self.state = self.candidate;
        }

        self.state
    }

    #[must_use]
    pub const fn state(&self) -> bool {
        self.state
    }
}

impl Default for LimitSwitch {
    fn default() -> Self {
        Self::new(LIMIT_DEBOUNCE_SAMPLES)
    }
}

/// Position, speed, and acceleration model for a step/direction driver.
///
/// Speed, maximum speed, and acceleration are held in pulses at the current
/// [`Resolution`]; position and target are held in full steps.
#[derive(Debug)]
pub struct Stepper<D> {
    driver: D,
    resolution: Resolution,
    position: f64,
    target: f64,
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    pending: f32,
    last_run: Option<TimestampMicros>,
    limit: LimitSwitch,
    faulted: bool,
}

impl<D> Stepper<D>
where
    D: StepperDriver,
{
    /// Creates a stopped stepper at position zero and programs `resolution`.
    pub fn new(mut driver: D, resolution: Resolution) -> Self {
        driver.select_microsteps(resolution.pins());

        Self {
            driver,
            resolution,
            position: 0.0,
            target: 0.0,
            speed: 0.0,
            max_speed: 0.0,
            acceleration: 0.0,
            pending: 0.0,
            last_run: None,
            limit: LimitSwitch::default(),
            faulted: false,
        }
    }

    /// Reprograms the microstep resolution.
    ///
    /// Speed, maximum speed, and acceleration are rescaled so the carriage
    /// keeps its physical velocity; position is never touched.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        if resolution == self.resolution {
            return;
        }

        let ratio = self.resolution.multiplier() / resolution.multiplier();
        self.speed *= ratio;
        self.max_speed *= ratio;
        self.acceleration *= ratio;
        self.pending *= ratio;

        self.driver.select_microsteps(resolution.pins());
        self.resolution = resolution;
    }

    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn set_max_speed(&mut self, pulses_per_sec: f32) {
        self.max_speed = pulses_per_sec.abs();
        self.speed = self.speed.clamp(-self.max_speed, self.max_speed);
    }

    /// Overrides the instantaneous signed speed, clamped to the maximum.
    pub fn set_speed(&mut self, pulses_per_sec: f32) {
        self.speed = pulses_per_sec.clamp(-self.max_speed, self.max_speed);
    }

    pub fn set_acceleration(&mut self, pulses_per_sec2: f32) {
        self.acceleration = pulses_per_sec2.abs();
    }

    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    #[must_use]
    pub const fn max_speed(&self) -> f32 {
        self.max_speed
    }

    #[must_use]
    pub const fn acceleration(&self) -> f32 {
        self.acceleration
    }

    /// Sets an absolute target in full steps.
    pub fn move_to(&mut self, target: f64) {
        self.target = target;
    }

    /// Offsets the target relative to the current position.
    pub fn move_by(&mut self, delta: f64) {
        self.target = self.position + delta;
    }

    /// Redefines the current position without moving, stopping any motion.
    pub fn set_current_position(&mut self, position: f64) {
        self.position = position;
        self.target = position;
        self.speed = 0.0;
        self.pending = 0.0;
    }

    /// Stops in place: target collapses onto the position and speed drops to 0.
    pub fn hold(&mut self) {
        self.target = self.position;
        self.speed = 0.0;
        self.pending = 0.0;
    }

    #[must_use]
    pub const fn current_position(&self) -> f64 {
        self.position
    }

    #[must_use]
    pub const fn target_position(&self) -> f64 {
        self.target
    }

    #[must_use]
    pub fn distance_to_go(&self) -> f64 {
        self.target - self.position
    }

    #[must_use]
    pub fn is_at_target(&self) -> bool {
        let step = f64::from(self.resolution.multiplier());
        (self.distance_to_go() / step).abs() <= ARRIVAL_TOLERANCE_PULSES
    }

    #[must_use]
    pub const fn limit(&self) -> &LimitSwitch {
        &self.limit
    }

    #[must_use]
    pub const fn limit_engaged(&self) -> bool {
        self.limit.state()
    }

    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Checks the driver and advances motion by one bounded increment.
    ///
    /// An asserted error line fails the update without issuing pulses, so the
    /// tracked position stays where it was. Travel towards the limit switch is
    /// cut short once the debounced switch reports contact.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorFault::DriverFault`] while the driver reports an error.
    pub fn update(&mut self, now: TimestampMicros) -> Result<(), ActuatorFault> {
        let raw_limit = self.driver.limit_engaged();
        let engaged = self.limit.sample(raw_limit);

        if self.driver.fault_asserted() {
            self.faulted = true;
            self.speed = 0.0;
            self.pending = 0.0;
            self.last_run = Some(now);
            return Err(ActuatorFault::DriverFault);
        }
        self.faulted = false;

        if engaged && self.target < self.position {
            self.hold();
        }

        self.run(now);
        Ok(())
    }

    /// Advances towards the target using a trapezoidal speed profile.
    ///
    /// Issues at most [`MAX_PULSES_PER_RUN`] pulses and returns how many were
    /// sent. Never blocks.
    pub fn run(&mut self, now: TimestampMicros) -> u32 {
        let elapsed = match self.last_run.replace(now) {
            Some(previous) => now.saturating_sub(previous).min(MAX_RUN_GAP_US),
            None => 0,
        };
        let dt = micros_to_secs(elapsed);

        let step = f64::from(self.resolution.multiplier());
        let remaining = self.distance_to_go() / step;
        if remaining.abs() <= ARRIVAL_TOLERANCE_PULSES {
            self.speed = 0.0;
            self.pending = 0.0;
            return 0;
        }

        let heading = if remaining > 0.0 { 1.0 } else { -1.0 };
        self.speed = self.next_speed(remaining, heading, dt);
        if self.speed == 0.0 {
            return 0;
        }

        self.pending += self.speed.abs() * dt;
        let toward_target = (self.speed > 0.0) == (remaining > 0.0);

        let mut pulses = self.pending.floor();
        if toward_target {
            pulses = pulses.min(pulses_f32(remaining.abs().trunc()));
        }
        pulses = pulses.min(pulses_f32(f64::from(MAX_PULSES_PER_RUN)));
        self.pending = (self.pending - pulses).min(1.0);

        let count = whole_pulses(pulses);
        if count == 0 {
            return 0;
        }

        let direction = if self.speed > 0.0 {
            Direction::Sink
        } else {
            Direction::Rise
        };
        self.driver.set_direction(direction);
        for _ in 0..count {
            self.driver.pulse();
        }

        let travelled = f64::from(count) * step;
        match direction {
            Direction::Sink => self.position += travelled,
            Direction::Rise => self.position -= travelled,
        }

        count
    }

    fn next_speed(&self, remaining: f64, heading: f32, dt: f32) -> f32 {
        let max = self.max_speed;
        if max <= 0.0 {
            return 0.0;
        }

        let accel = self.acceleration;
        if accel <= 0.0 {
            return heading * max;
        }

        let floor = accel.sqrt().min(max);
        let speed = self.speed;

        if speed != 0.0 && speed.signum() != heading {
            let braked = speed.abs() - accel * dt;
            return if braked > 0.0 {
                speed.signum() * braked
            } else {
                heading * floor
            };
        }

        let current = speed.abs();
        let stopping = current * current / (2.0 * accel);
        let next = if f64::from(stopping) >= remaining.abs() {
            (current - accel * dt).max(floor)
        } else {
            (current + accel * dt).max(floor)
        };

        heading * next.min(max)
    }
}

#[allow(clippy::cast_precision_loss)]
fn micros_to_secs(micros: TimestampMicros) -> f32 {
    micros as f32 / 1_000_000.0
}

#[allow(clippy::cast_possible_truncation)]
fn pulses_f32(value: f64) -> f32 {
    value as f32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_pulses(value: f32) -> u32 {
    if value <= 0.0 { 0 } else { value as u32 }
}
