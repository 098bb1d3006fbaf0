//! Split telemetry frames.
//!
//! A full record does not fit a single transfer to the ground station, so the
//! link sends it as two halves on alternating sends. Each half carries its own
//! timestamp so the receiver can stitch them back together.

use core::fmt::{self, Write};

use crate::actuator::ActuatorTelemetry;
use crate::mission::MissionState;
use crate::record::{
    EnvironmentSamples, InertialSamples, MissionRecord, NavigationSolution, RecordFlags, Sample,
    Vector3,
};
use crate::timing::TimestampMicros;

/// Which half of the record a frame carries.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameHalf {
    Primary,
    Secondary,
}

impl FrameHalf {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }
}

/// Mission status, actuator, power, and storage.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PrimaryFrame {
    pub time_us: TimestampMicros,
    pub cycle: u32,
    pub state: MissionState,
    pub flags: RecordFlags,
    pub actuator: Option<ActuatorTelemetry>,
    pub voltage: Sample<f32>,
    pub capacity_bytes: Sample<u64>,
    pub log_rate_hz: u16,
    pub logging_enabled: bool,
}

/// Environmental, inertial, and navigation data.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SecondaryFrame {
    pub time_us: TimestampMicros,
    pub environment: EnvironmentSamples,
    pub inertial: InertialSamples,
    pub navigation: Sample<NavigationSolution>,
}

/// One half of the live record.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TelemetryFrame {
    Primary(PrimaryFrame),
    Secondary(SecondaryFrame),
}

impl TelemetryFrame {
    /// Extracts the requested half from the record.
    #[must_use]
    pub fn from_record(record: &MissionRecord, half: FrameHalf) -> Self {
        match half {
            FrameHalf::Primary => Self::Primary(PrimaryFrame {
                time_us: record.time_us,
                cycle: record.cycle,
                state: record.state,
                flags: record.flags,
                actuator: record.actuator,
                voltage: record.power.voltage,
                capacity_bytes: record.storage.capacity_bytes,
                log_rate_hz: record.storage.log_rate_hz,
                logging_enabled: record.storage.logging_enabled,
            }),
            FrameHalf::Secondary => Self::Secondary(SecondaryFrame {
                time_us: record.time_us,
                environment: record.environment,
                inertial: record.inertial,
                navigation: record.navigation,
            }),
        }
    }

    #[must_use]
    pub const fn half(&self) -> FrameHalf {
        match self {
            Self::Primary(_) => FrameHalf::Primary,
            Self::Secondary(_) => FrameHalf::Secondary,
        }
    }

    /// Writes the frame as one `key=value` text line without a terminator.
    ///
    /// Stale samples are prefixed with `~`; missing ones read `-`.
    ///
    /// # Errors
    ///
    /// Propagates the writer's error, e.g. a full fixed-capacity buffer.
    pub fn write_line<W: Write>(&self, out: &mut W) -> fmt::Result {
        match self {
            Self::Primary(frame) => write_primary(frame, out),
            Self::Secondary(frame) => write_secondary(frame, out),
        }
    }

    /// Renders the frame into an owned string.
    #[cfg(feature = "alloc")]
    #[must_use]
    pub fn to_line(&self) -> alloc::string::String {
        let mut line = alloc::string::String::new();
        // Writing into a `String` cannot fail.
        let _ = self.write_line(&mut line);
        line
    }
}

fn write_primary<W: Write>(frame: &PrimaryFrame, out: &mut W) -> fmt::Result {
    write!(
        out,
        "P t={} c={} s={} warn={} afault={} sfault={}",
        frame.time_us,
        frame.cycle,
        frame.state,
        u8::from(frame.flags.warning),
        u8::from(frame.flags.actuator_fault),
        u8::from(frame.flags.storage_fault),
    )?;

    match &frame.actuator {
        Some(actuator) => write!(
            out,
            " pos={:.1} tgt={:.1} mm={:.2} spd={:.1} acc={:.1} lim={} cal={} res={} mode={}",
            actuator.position,
            actuator.target,
            actuator.position_mm,
            actuator.speed,
            actuator.acceleration,
            u8::from(actuator.limit_engaged),
            u8::from(actuator.calibrated),
            actuator.resolution,
            actuator.mode.as_str(),
        )?,
        None => out.write_str(" pos=-")?,
    }

    write_sample(out, "v", &frame.voltage, |out, volts| write!(out, "{volts:.2}"))?;
    write_sample(out, "cap", &frame.capacity_bytes, |out, bytes| {
        write!(out, "{bytes}")
    })?;
    write!(
        out,
        " log={} rate={}",
        u8::from(frame.logging_enabled),
        frame.log_rate_hz
    )
}

fn write_secondary<W: Write>(frame: &SecondaryFrame, out: &mut W) -> fmt::Result {
    write!(out, "S t={}", frame.time_us)?;

    let environment = &frame.environment;
    write_sample(out, "temp", &environment.temperature_c, write_f32)?;
    write_sample(out, "pres", &environment.pressure_mbar, write_f32)?;
    write_sample(out, "tds", &environment.dissolved_solids_ppm, write_f32)?;

    let inertial = &frame.inertial;
    write_sample(out, "acc", &inertial.accel, write_vector)?;
    write_sample(out, "gyr", &inertial.gyro, write_vector)?;
    write_sample(out, "mag", &inertial.mag, write_vector)?;
    write_sample(out, "baro", &inertial.baro, |out, baro| {
        write!(out, "{:.1},{:.2}", baro.pressure_pa, baro.temperature_c)
    })?;

    write_sample(out, "nav", &frame.navigation, |out, nav| {
        let q = nav.orientation;
        write!(out, "{:.3},{:.3},{:.3},{:.3};", q.w, q.x, q.y, q.z)?;
        write_vector(out, nav.velocity)?;
        out.write_char(';')?;
        write_vector(out, nav.position)
    })
}

fn write_sample<W, T, F>(out: &mut W, key: &str, sample: &Sample<T>, value: F) -> fmt::Result
where
    W: Write,
    T: Copy,
    F: FnOnce(&mut W, T) -> fmt::Result,
{
    write!(out, " {key}=")?;
    match *sample {
        Sample::Missing => out.write_char('-'),
        Sample::Stale(inner) => {
            out.write_char('~')?;
            value(out, inner)
        }
        Sample::Fresh(inner) => value(out, inner),
    }
}

fn write_f32<W: Write>(out: &mut W, value: f32) -> fmt::Result {
    write!(out, "{value:.2}")
}

fn write_vector<W: Write>(out: &mut W, value: Vector3) -> fmt::Result {
    write!(out, "{:.3},{:.3},{:.3}", value.x, value.y, value.z)
}

/// Alternates between the two frame halves on successive sends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameSplitter {
    next: FrameHalf,
}

impl FrameSplitter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: FrameHalf::Primary,
        }
    }

    /// Builds the next half and advances the rotation.
    pub fn next_frame(&mut self, record: &MissionRecord) -> TelemetryFrame {
        let frame = self.pending_frame(record);
        self.advance();
        frame
    }

    /// Builds the upcoming half without moving the rotation on.
    #[must_use]
    pub fn pending_frame(&self, record: &MissionRecord) -> TelemetryFrame {
        TelemetryFrame::from_record(record, self.next)
    }

    pub fn advance(&mut self) {
        self.next = self.next.other();
    }

    #[must_use]
    pub const fn upcoming(&self) -> FrameHalf {
        self.next
    }
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use heapless::String;

    use super::*;

    #[test]
    fn splitter_alternates_halves() {
        let record = MissionRecord::new();
        let mut splitter = FrameSplitter::new();

        assert_eq!(splitter.next_frame(&record).half(), FrameHalf::Primary);
        assert_eq!(splitter.next_frame(&record).half(), FrameHalf::Secondary);
        assert_eq!(splitter.next_frame(&record).half(), FrameHalf::Primary);
    }

    #[test]
    fn line_marks_sample_freshness() {
        let mut record = MissionRecord::new();
        record.environment.temperature_c.update(11.0);
        record.environment.pressure_mbar.update(1_013.25);
        record.begin_cycle(42, 0.01, MissionState::Diving);
        record.environment.temperature_c.update(12.5);

        let frame = TelemetryFrame::from_record(&record, FrameHalf::Secondary);
        let mut line: String<256> = String::new();
        frame.write_line(&mut line).expect("line fits");

        assert!(line.starts_with("S t=42"), "{line}");
        assert!(line.contains(" temp=12.50"), "{line}");
        assert!(line.contains(" pres=~1013.25"), "{line}");
        assert!(line.contains(" tds=-"), "{line}");
    }

    #[test]
    fn primary_line_reports_state_and_flags() {
        let mut record = MissionRecord::new();
        record.begin_cycle(7, 0.0, MissionState::Resurfacing);
        record.raise_warning();

        let frame = TelemetryFrame::from_record(&record, FrameHalf::Primary);
        let mut line: String<256> = String::new();
        frame.write_line(&mut line).expect("line fits");

        assert!(
            line.starts_with("P t=7 c=1 s=resurfacing warn=1 afault=0"),
            "{line}"
        );
        assert!(line.contains(" pos=-"), "{line}");
    }
}
