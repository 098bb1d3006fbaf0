//! Cooperative periodic work for the mission cycle.
//!
//! [`PeriodicTask`] throttles an operation to a fixed interval without
//! blocking or spawning anything: the cycle calls [`PeriodicTask::tick`] every
//! iteration and the task decides whether enough time has passed to invoke the
//! bound operation. The task never retries on its own; callers that want an
//! immediate retry after a failed operation use [`PeriodicTask::force_due`].

use core::time::Duration;

/// Monotonic timestamps used throughout the mission core (microseconds).
pub type TimestampMicros = u64;

/// Converts a monotonic duration into the core timestamp unit, saturating.
#[must_use]
pub fn duration_to_micros(duration: Duration) -> TimestampMicros {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Interval that fires `hz` times per second, or `None` for 0 Hz.
#[must_use]
pub fn hz_to_interval(hz: u16) -> Option<Duration> {
    if hz == 0 {
        return None;
    }

    Some(Duration::from_micros(1_000_000 / u64::from(hz)))
}

/// Rate in whole hertz for a given interval, saturating at `u16::MAX`.
#[must_use]
pub fn interval_to_hz(interval: Duration) -> u16 {
    let micros = duration_to_micros(interval);
    if micros == 0 {
        return u16::MAX;
    }

    u16::try_from(1_000_000 / micros).unwrap_or(u16::MAX)
}

/// Interval-gated operation polled from the mission cycle.
///
/// `F` is usually a plain `fn` pointer taking a tuple of borrowed arguments so
/// the owner can store the task inline without boxing.
#[derive(Clone, Debug)]
pub struct PeriodicTask<F> {
    operation: F,
    interval: Duration,
    last_fire: TimestampMicros,
    enabled: bool,
    forced: bool,
}

impl<F> PeriodicTask<F> {
    /// Creates an enabled task whose first fire happens once `interval` has
    /// elapsed since timestamp zero.
    #[must_use]
    pub const fn new(interval: Duration, operation: F) -> Self {
        Self {
            operation,
            interval,
            last_fire: 0,
            enabled: true,
            forced: false,
        }
    }

    /// Invokes the bound operation when the task is due.
    ///
    /// Returns `Some` with the operation result when it ran (void operations
    /// yield `Some(())`) and `None` when the task was skipped.
    pub fn tick<A, R>(&mut self, now: TimestampMicros, args: A) -> Option<R>
    where
        F: FnMut(A) -> R,
    {
        if !self.is_due(now) {
            return None;
        }

        let result = (self.operation)(args);
        self.last_fire = now;
        self.forced = false;
        Some(result)
    }

    /// Returns `true` when the next [`tick`](Self::tick) at `now` would fire.
    #[must_use]
    pub fn is_due(&self, now: TimestampMicros) -> bool {
        if !self.enabled {
            return false;
        }

        self.forced || now.saturating_sub(self.last_fire) >= duration_to_micros(self.interval)
    }

    /// Replaces the interval; takes effect on the next check.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Replaces the bound operation; takes effect on the next fire.
    pub fn set_operation(&mut self, operation: F) {
        self.operation = operation;
    }

    /// Disables the task until [`resume`](Self::resume) is called.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.forced = false;
    }

    /// Re-enables a stopped task without touching its schedule.
    pub fn resume(&mut self) {
        self.enabled = true;
    }

    /// Restarts the interval from `now`.
    pub fn reset(&mut self, now: TimestampMicros) {
        self.last_fire = now;
        self.forced = false;
    }

    /// Makes the next tick fire regardless of the elapsed interval.
    pub fn force_due(&mut self) {
        self.forced = true;
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub const fn last_fire(&self) -> TimestampMicros {
        self.last_fire
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}
