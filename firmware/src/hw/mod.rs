//! Board bindings for the mission collaborators.
//!
//! GPIO and ADC peripherals are wrapped here so the shared `mission-core`
//! traits can drive the ballast stepper, the probes, and the status LED.

use cortex_m::asm;
use embassy_stm32::gpio::{Input, Output};
use portable_atomic::{AtomicU8, Ordering};

use mission_core::actuator::{Direction, MicrostepPins, StepperDriver};
use mission_core::platform::{IndicatorPattern, StatusIndicator};

pub mod power;
pub mod sensors;

pub use sensors::{BoardSensors, PROBES_READY};

/// STEP high time; the driver needs at least 1 µs at 64 MHz.
const STEP_PULSE_CYCLES: u32 = 128;

/// Step/direction driver with MS1/MS2 microstep selects.
///
/// The fault and limit inputs are active low with pull-ups.
pub struct HardwareStepperDriver<'d> {
    step: Output<'d>,
    dir: Output<'d>,
    ms1: Output<'d>,
    ms2: Output<'d>,
    fault: Input<'d>,
    limit: Input<'d>,
}

impl<'d> HardwareStepperDriver<'d> {
    pub fn new(
        step: Output<'d>,
        dir: Output<'d>,
        ms1: Output<'d>,
        ms2: Output<'d>,
        fault: Input<'d>,
        limit: Input<'d>,
    ) -> Self {
        Self {
            step,
            dir,
            ms1,
            ms2,
            fault,
            limit,
        }
    }
}

impl StepperDriver for HardwareStepperDriver<'_> {
    fn select_microsteps(&mut self, pins: MicrostepPins) {
        self.ms1.set_level(pins.ms1.into());
        self.ms2.set_level(pins.ms2.into());
    }

    fn set_direction(&mut self, direction: Direction) {
        match direction {
            Direction::Sink => self.dir.set_high(),
            Direction::Rise => self.dir.set_low(),
        }
    }

    fn pulse(&mut self) {
        self.step.set_high();
        asm::delay(STEP_PULSE_CYCLES);
        self.step.set_low();
    }

    fn fault_asserted(&mut self) -> bool {
        self.fault.is_low()
    }

    fn limit_engaged(&mut self) -> bool {
        self.limit.is_low()
    }
}

static INDICATOR_PATTERN: AtomicU8 = AtomicU8::new(encode(IndicatorPattern::Startup));

const fn encode(pattern: IndicatorPattern) -> u8 {
    match pattern {
        IndicatorPattern::Startup => 0,
        IndicatorPattern::Nominal => 1,
        IndicatorPattern::Warning => 2,
        IndicatorPattern::Error => 3,
    }
}

const fn decode(raw: u8) -> IndicatorPattern {
    match raw {
        0 => IndicatorPattern::Startup,
        1 => IndicatorPattern::Nominal,
        2 => IndicatorPattern::Warning,
        _ => IndicatorPattern::Error,
    }
}

/// Pattern most recently requested by the mission task.
pub fn indicator_pattern() -> IndicatorPattern {
    decode(INDICATOR_PATTERN.load(Ordering::Acquire))
}

/// LED on/off times in milliseconds for each pattern.
pub const fn blink_timing(pattern: IndicatorPattern) -> (u64, u64) {
    match pattern {
        IndicatorPattern::Startup => (100, 100),
        IndicatorPattern::Nominal => (50, 1_950),
        IndicatorPattern::Warning => (250, 250),
        IndicatorPattern::Error => (1_000, 0),
    }
}

/// Publishes the pattern for the LED task; the mission task never touches
/// the pin directly.
#[derive(Copy, Clone, Debug, Default)]
pub struct LedIndicator;

impl StatusIndicator for LedIndicator {
    fn show(&mut self, pattern: IndicatorPattern) {
        INDICATOR_PATTERN.store(encode(pattern), Ordering::Release);
    }
}
