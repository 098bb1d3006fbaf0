//! Analog probe and battery sampling.
//!
//! The probe channels are converted only when the probe task has flagged a
//! new sampling slot; the pack voltage is read on every cycle. The IMU
//! socket is not populated on this board, so inertial samples stay missing.

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::ADC1;

use mission_core::flags::ReadyFlag;
use mission_core::platform::SensorSuite;
use mission_core::record::MissionRecord;

use super::power::SupplyReference;
use crate::probes::{
    LowPass, adc_volts, battery_volts, pressure_mbar, tds_ppm, thermistor_celsius,
};

/// Signalled by the probe task at the probe sampling rate.
pub static PROBES_READY: ReadyFlag = ReadyFlag::new();

/// Cut-off of the filtered pack voltage.
const BATTERY_FILTER_HZ: f32 = 0.5;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorError {
    /// VREFINT gave an implausible supply.
    Supply,
    /// Thermistor reads open or shorted.
    Thermistor,
}

/// Analog channels wired to the probe harness.
pub struct ProbeChannels {
    pub battery: AnyAdcChannel<ADC1>,
    pub thermistor: AnyAdcChannel<ADC1>,
    pub pressure: AnyAdcChannel<ADC1>,
    pub tds: AnyAdcChannel<ADC1>,
}

pub struct BoardSensors<'d> {
    adc: Adc<'d, ADC1>,
    supply: SupplyReference,
    channels: ProbeChannels,
    vdda: f32,
    battery_filter: LowPass,
    last_temperature: Option<f32>,
}

impl<'d> BoardSensors<'d> {
    pub fn new(mut adc: Adc<'d, ADC1>, channels: ProbeChannels) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        let supply = SupplyReference::new(&mut adc);

        Self {
            adc,
            supply,
            channels,
            vdda: 3.3,
            battery_filter: LowPass::new(BATTERY_FILTER_HZ),
            last_temperature: None,
        }
    }

    fn refresh_supply(&mut self) {
        if let Some(vdda) = self.supply.vdda(&mut self.adc) {
            self.vdda = vdda;
        }
    }

    fn read_battery(&mut self) -> f32 {
        self.refresh_supply();
        let raw = self.adc.blocking_read(&mut self.channels.battery);
        battery_volts(raw, self.vdda)
    }
}

impl SensorSuite for BoardSensors<'_> {
    type Error = SensorError;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.vdda = self.supply.vdda(&mut self.adc).ok_or(SensorError::Supply)?;

        let raw = self.adc.blocking_read(&mut self.channels.thermistor);
        self.last_temperature = Some(thermistor_celsius(raw).ok_or(SensorError::Thermistor)?);
        Ok(())
    }

    fn battery_voltage(&mut self) -> Option<f32> {
        let volts = self.read_battery();
        (volts > 0.0).then_some(volts)
    }

    fn sample_environment(&mut self, record: &mut MissionRecord) {
        if !PROBES_READY.take() {
            return;
        }

        let raw = self.adc.blocking_read(&mut self.channels.thermistor);
        if let Some(celsius) = thermistor_celsius(raw) {
            self.last_temperature = Some(celsius);
            record.environment.temperature_c.update(celsius);
        }

        let raw = self.adc.blocking_read(&mut self.channels.pressure);
        record
            .environment
            .pressure_mbar
            .update(pressure_mbar(adc_volts(raw, self.vdda)));

        let raw = self.adc.blocking_read(&mut self.channels.tds);
        let reference = self.last_temperature.unwrap_or(25.0);
        record
            .environment
            .dissolved_solids_ppm
            .update(tds_ppm(adc_volts(raw, self.vdda), reference));
    }

    fn sample_inertial(&mut self, _: &mut MissionRecord) {}

    fn sample_power(&mut self, record: &mut MissionRecord) {
        let volts = self.read_battery();
        record.power.voltage.update(volts);
        let filtered = self.battery_filter.update(volts, record.delta_time_s);
        record.power.filtered_voltage.update(filtered);
    }
}
