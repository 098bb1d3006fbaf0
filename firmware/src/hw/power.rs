//! VREFINT sampling for the STM32G0 analog supply.
//!
//! Every probe is read ratiometrically against VDDA, which is recovered from
//! the factory VREFINT calibration rather than assumed to be 3.3 V.

use core::ptr;

use embassy_stm32::adc::{Adc, VrefInt};
use embassy_stm32::peripherals::ADC1;

use crate::probes::vdda_from_vrefint;

/// Factory-programmed calibration constant sampled at 3.0 V.
const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;

/// Plausible VDDA window; anything outside means the reference read failed.
const VDDA_MIN: f32 = 2.7;
const VDDA_MAX: f32 = 3.6;

/// Reads the factory-trimmed VREFINT calibration constant.
pub fn read_vrefint_calibration() -> u16 {
    unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) }
}

/// Internal reference channel plus its calibration word.
pub struct SupplyReference {
    channel: VrefInt,
    calibration: u16,
    discard_next: bool,
}

impl SupplyReference {
    /// Enables the internal reference on `adc`.
    pub fn new(adc: &mut Adc<'_, ADC1>) -> Self {
        Self {
            channel: adc.enable_vrefint(),
            calibration: read_vrefint_calibration(),
            discard_next: true,
        }
    }

    /// Measures VDDA, or `None` when the reading is implausible.
    pub fn vdda(&mut self, adc: &mut Adc<'_, ADC1>) -> Option<f32> {
        // The first conversion after enabling the reference is unsettled.
        if self.discard_next {
            let _ = adc.blocking_read(&mut self.channel);
            self.discard_next = false;
        }

        let raw = adc.blocking_read(&mut self.channel);
        vdda_from_vrefint(self.calibration, raw).filter(|vdda| (VDDA_MIN..=VDDA_MAX).contains(vdda))
    }
}
