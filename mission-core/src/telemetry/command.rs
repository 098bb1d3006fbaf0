//! Operator command lines received from the ground station.
//!
//! Grammar (one command per line, case-sensitive):
//!
//! ```text
//! idle | run | resume
//! speed <pulses/s> | speed default
//! accel <pulses/s^2> | accel default
//! log on | log off
//! rate <hz> | rate default
//! ```

use core::fmt;
use core::str;

use heapless::Vec;
use winnow::ascii::{dec_uint, space1};
use winnow::combinator::{alt, preceded};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::platform::{CommandSet, ModeRequest};

/// Maximum number of bytes accepted on a single command line.
pub const MAX_LINE_LEN: usize = 64;

/// Errors raised while assembling or parsing a command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineError {
    InvalidUtf8,
    LineOverflow,
    Syntax,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single change to the operator command set.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CommandUpdate {
    Mode(ModeRequest),
    ActuatorSpeed(Option<f32>),
    ActuatorAcceleration(Option<f32>),
    Logging(bool),
    LogRate(Option<u16>),
}

impl CommandUpdate {
    /// Folds the update into `commands`.
    pub fn apply(self, commands: &mut CommandSet) {
        match self {
            Self::Mode(mode) => commands.mode = mode,
            Self::ActuatorSpeed(speed) => commands.actuator_speed = speed,
            Self::ActuatorAcceleration(accel) => commands.actuator_acceleration = accel,
            Self::Logging(enabled) => commands.logging_enabled = enabled,
            Self::LogRate(hz) => commands.log_rate_hz = hz,
        }
    }
}

/// Command parser built on top of `winnow`.
pub struct CommandParser;

impl CommandParser {
    /// Parses one trimmed command line.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Syntax`] when the line does not match the grammar.
    pub fn parse(input: &str) -> Result<CommandUpdate, LineError> {
        Self::update()
            .parse(input.trim())
            .map_err(|_| LineError::Syntax)
    }

    fn update<'a>() -> impl Parser<&'a str, CommandUpdate, ContextError> {
        move |input: &mut &'a str| {
            alt((
                "idle".value(CommandUpdate::Mode(ModeRequest::Idle)),
                alt(("resume", "run")).value(CommandUpdate::Mode(ModeRequest::Run)),
                preceded(("speed", space1), optional_f32).map(CommandUpdate::ActuatorSpeed),
                preceded(("accel", space1), optional_f32)
                    .map(CommandUpdate::ActuatorAcceleration),
                preceded(("log", space1), alt(("on".value(true), "off".value(false))))
                    .map(CommandUpdate::Logging),
                preceded(("rate", space1), optional_u16).map(CommandUpdate::LogRate),
            ))
            .parse_next(input)
        }
    }
}

fn optional_f32(input: &mut &str) -> Result<Option<f32>, ContextError> {
    alt((
        "default".value(None),
        take_while(1.., |c: char| c.is_ascii_digit() || c == '.')
            .parse_to::<f32>()
            .map(Some),
    ))
    .parse_next(input)
}

fn optional_u16(input: &mut &str) -> Result<Option<u16>, ContextError> {
    alt(("default".value(None), dec_uint::<_, u16, _>.map(Some))).parse_next(input)
}

/// Accumulates link bytes into lines and applies each parsed command.
#[derive(Clone, Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    /// Set after an overflow; bytes are dropped until the next terminator.
    discarding: bool,
}

impl LineAssembler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds one byte; a line terminator parses the buffered line and applies
    /// it to `commands`.
    ///
    /// # Errors
    ///
    /// Returns [`LineError`] for overlong, non-UTF-8, or malformed lines. The
    /// buffer is cleared either way so the next line starts fresh. The rest
    /// of an overlong line, up to its terminator, is dropped unparsed.
    pub fn ingest(
        &mut self,
        byte: u8,
        commands: &mut CommandSet,
    ) -> Result<Option<CommandUpdate>, LineError> {
        if self.discarding {
            if matches!(byte, b'\r' | b'\n') {
                self.discarding = false;
            }
            return Ok(None);
        }

        match byte {
            b'\r' | b'\n' => {
                let result = self.process_line(commands);
                self.buffer.clear();
                result
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(None)
            }
            value => {
                if self.buffer.push(value).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(LineError::LineOverflow);
                }
                Ok(None)
            }
        }
    }

    fn process_line(&self, commands: &mut CommandSet) -> Result<Option<CommandUpdate>, LineError> {
        let line = str::from_utf8(&self.buffer).map_err(|_| LineError::InvalidUtf8)?;
        if line.trim().is_empty() {
            return Ok(None);
        }

        let update = CommandParser::parse(line)?;
        update.apply(commands);
        Ok(Some(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_commands() {
        assert_eq!(
            CommandParser::parse("idle"),
            Ok(CommandUpdate::Mode(ModeRequest::Idle))
        );
        assert_eq!(
            CommandParser::parse("  resume "),
            Ok(CommandUpdate::Mode(ModeRequest::Run))
        );
    }

    #[test]
    fn parses_actuator_overrides() {
        assert_eq!(
            CommandParser::parse("speed 1200.5"),
            Ok(CommandUpdate::ActuatorSpeed(Some(1_200.5)))
        );
        assert_eq!(
            CommandParser::parse("accel default"),
            Ok(CommandUpdate::ActuatorAcceleration(None))
        );
    }

    #[test]
    fn parses_logging_controls() {
        assert_eq!(
            CommandParser::parse("log off"),
            Ok(CommandUpdate::Logging(false))
        );
        assert_eq!(
            CommandParser::parse("rate 30"),
            Ok(CommandUpdate::LogRate(Some(30)))
        );
    }

    #[test]
    fn rejects_unknown_or_trailing_input() {
        assert_eq!(CommandParser::parse("dive"), Err(LineError::Syntax));
        assert_eq!(CommandParser::parse("rate 30 now"), Err(LineError::Syntax));
        assert_eq!(CommandParser::parse("rate 70000"), Err(LineError::Syntax));
    }

    #[test]
    fn assembler_applies_complete_lines() {
        let mut assembler = LineAssembler::new();
        let mut commands = CommandSet::new();

        for byte in b"rate 25" {
            assert_eq!(assembler.ingest(*byte, &mut commands), Ok(None));
        }
        assert_eq!(
            assembler.ingest(b'\n', &mut commands),
            Ok(Some(CommandUpdate::LogRate(Some(25))))
        );
        assert_eq!(commands.log_rate_hz, Some(25));

        for byte in b"idlx\x08e\r" {
            let _ = assembler.ingest(*byte, &mut commands);
        }
        assert_eq!(commands.mode, ModeRequest::Idle);
    }

    #[test]
    fn overlong_line_ending_in_a_command_is_dropped() {
        let mut assembler = LineAssembler::new();
        let mut commands = CommandSet::new();

        let mut errors = 0;
        for _ in 0..=MAX_LINE_LEN {
            if assembler.ingest(b'x', &mut commands).is_err() {
                errors += 1;
            }
        }
        for byte in b"idle\n" {
            if assembler.ingest(*byte, &mut commands).is_err() {
                errors += 1;
            }
        }

        assert_eq!(errors, 1);
        assert_eq!(commands.mode, ModeRequest::Run);

        for byte in b"idle\r" {
            let _ = assembler.ingest(*byte, &mut commands);
        }
        assert_eq!(commands.mode, ModeRequest::Idle);
    }

    #[test]
    fn assembler_recovers_after_overflow() {
        let mut assembler = LineAssembler::new();
        let mut commands = CommandSet::new();

        let mut overflowed = false;
        for _ in 0..=MAX_LINE_LEN {
            overflowed |= assembler.ingest(b'x', &mut commands) == Err(LineError::LineOverflow);
        }
        assert!(overflowed);

        for byte in b"log off\n" {
            assert_eq!(assembler.ingest(*byte, &mut commands), Ok(None));
        }
        assert!(commands.logging_enabled, "tail of an overlong line must not apply");

        for byte in b"log off\n" {
            let _ = assembler.ingest(*byte, &mut commands);
        }
        assert!(!commands.logging_enabled);
    }
}
