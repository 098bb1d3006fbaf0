//! Conversions for the analog probes and the battery divider.
//!
//! Raw ADC counts come from the 12-bit converter referenced to VDDA; VDDA
//! itself is recovered from the factory VREFINT calibration.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::f32::consts::PI;

use num_traits::float::Float;

/// Full-scale count of the 12-bit converter.
pub const ADC_FULL_SCALE: f32 = 4_095.0;
/// Supply voltage at which `VREFINT_CAL` was measured.
pub const VREFINT_CAL_VOLTS: f32 = 3.0;

/// Battery divider: 9.95 kΩ over 1.992 kΩ.
const BATTERY_DIVIDER: f32 = (9.95 + 1.992) / 1.992;
/// Below this the divider is floating rather than reading a pack.
const BATTERY_FLOOR_VOLTS: f32 = 0.1;

const THERMISTOR_NOMINAL_OHMS: f32 = 10_000.0;
const THERMISTOR_SERIES_OHMS: f32 = 10_000.0;
const THERMISTOR_BETA: f32 = 4_100.0;
const THERMISTOR_NOMINAL_C: f32 = 25.0;
const KELVIN_OFFSET: f32 = 273.15;

const SURFACE_PRESSURE_MBAR: f32 = 1_013.25;
/// 0.5 V to 4.5 V spans 0 to 30 psi gauge; the divider halves the output.
const PRESSURE_SPAN_MBAR: f32 = 2_068.43;
const PRESSURE_ZERO_VOLTS: f32 = 0.25;
const PRESSURE_SPAN_VOLTS: f32 = 2.0;

/// Supply voltage implied by a VREFINT conversion.
#[must_use]
pub fn vdda_from_vrefint(calibration: u16, raw: u16) -> Option<f32> {
    if raw == 0 {
        return None;
    }

    Some(VREFINT_CAL_VOLTS * f32::from(calibration) / f32::from(raw))
}

#[must_use]
pub fn adc_volts(raw: u16, vdda: f32) -> f32 {
    f32::from(raw) * vdda / ADC_FULL_SCALE
}

/// Pack voltage behind the divider; readings under 0.1 V clamp to zero.
#[must_use]
pub fn battery_volts(raw: u16, vdda: f32) -> f32 {
    let volts = adc_volts(raw, vdda) * BATTERY_DIVIDER;
    if volts <= BATTERY_FLOOR_VOLTS {
        0.0
    } else {
        volts
    }
}

/// Water temperature from the NTC thermistor on the low side of a divider.
#[must_use]
pub fn thermistor_celsius(raw: u16) -> Option<f32> {
    if raw == 0 || f32::from(raw) >= ADC_FULL_SCALE {
        return None;
    }

    let ratio = f32::from(raw) / ADC_FULL_SCALE;
    let resistance = THERMISTOR_SERIES_OHMS * ratio / (1.0 - ratio);
    let inverse_kelvin = 1.0 / (THERMISTOR_NOMINAL_C + KELVIN_OFFSET)
        + Float::ln(resistance / THERMISTOR_NOMINAL_OHMS) / THERMISTOR_BETA;

    Some(1.0 / inverse_kelvin - KELVIN_OFFSET)
}

/// Absolute water pressure from the ratiometric transducer.
#[must_use]
pub fn pressure_mbar(volts: f32) -> f32 {
    let gauge = (volts - PRESSURE_ZERO_VOLTS) / PRESSURE_SPAN_VOLTS * PRESSURE_SPAN_MBAR;
    SURFACE_PRESSURE_MBAR + gauge.max(0.0)
}

/// Dissolved solids from the conductivity probe, temperature compensated to
/// 25 °C.
#[must_use]
pub fn tds_ppm(volts: f32, temperature_c: f32) -> f32 {
    let compensation = 1.0 + 0.02 * (temperature_c - 25.0);
    let v = volts / compensation;
    (133.42 * v * v * v - 255.86 * v * v + 857.39 * v) * 0.5
}

/// First-order low-pass used for the filtered pack voltage.
#[derive(Copy, Clone, Debug)]
pub struct LowPass {
    time_constant: f32,
    state: Option<f32>,
}

impl LowPass {
    #[must_use]
    pub fn new(cutoff_hz: f32) -> Self {
        Self {
            time_constant: 1.0 / (2.0 * PI * cutoff_hz),
            state: None,
        }
    }

    /// Feeds one sample taken `dt` seconds after the previous one.
    pub fn update(&mut self, input: f32, dt: f32) -> f32 {
        let next = match self.state {
            None => input,
            Some(previous) => {
                let alpha = dt / (self.time_constant + dt);
                previous + alpha * (input - previous)
            }
        };
        self.state = Some(next);
        next
    }
}
