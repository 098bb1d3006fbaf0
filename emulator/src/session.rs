use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::time::Duration;

use crossterm::style::Stylize;
use mission_core::config::MissionConfig;
use mission_core::mission::{MissionController, Transition};
use mission_core::orchestrator::MissionContext;
use mission_core::platform::IndicatorPattern;
use mission_core::telemetry::CommandParser;
use mission_core::timing::{TimestampMicros, duration_to_micros};

use crate::sim::{HostPlatform, host_collaborators};

/// Longest stretch a single `wait` may simulate.
const MAX_RUN: Duration = Duration::from_secs(3_600);

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("step", "step [cycles]                 - advance the mission by N cycles"),
    ("wait", "wait <seconds>                - advance the mission by simulated time"),
    ("status", "status                        - show state, actuator, and record flags"),
    ("events", "events [count]                - list the most recent mission events"),
    ("frames", "frames on|off                 - echo telemetry frames as they are sent"),
    ("fault", "fault on|off                  - drive the stepper error line"),
    ("storage", "storage fail <writes>         - fail the next N log writes"),
    (
        "uplink",
        "idle | run | resume | speed | accel | log | rate - operator commands",
    ),
    ("help", "help [topic]                  - show help for a command"),
];

/// Emulator options taken from the command line.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub cycle: Duration,
    pub start_steps: i64,
    pub show_frames: bool,
    pub color: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cycle: Duration::from_millis(10),
            start_steps: 2_000,
            show_frames: false,
            color: true,
        }
    }
}

pub struct Session {
    controller: MissionController<HostPlatform>,
    now: TimestampMicros,
    cycle_us: TimestampMicros,
    show_frames: bool,
    color: bool,
}

impl Session {
    pub fn new(options: &SessionOptions, log_path: Option<&Path>) -> io::Result<Self> {
        let config = MissionConfig::default();
        let parts = host_collaborators(
            &config.geometry,
            options.cycle,
            options.start_steps,
            log_path,
        )?;

        Ok(Self {
            controller: MissionController::new(MissionContext::new(config, parts)),
            now: 0,
            cycle_us: duration_to_micros(options.cycle).max(1),
            show_frames: options.show_frames,
            color: options.color,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        let mut words = trimmed.split_whitespace();
        let Some(verb) = words.next() else {
            return Vec::new();
        };
        let argument = words.next();

        match verb {
            "help" => handle_help(argument),
            "step" => match argument.map_or(Ok(1), str::parse::<u32>) {
                Ok(cycles) => self.advance(cycles),
                Err(_) => vec!["ERR step expects a cycle count".to_string()],
            },
            "wait" => match argument.map(str::parse::<f64>) {
                Some(Ok(seconds)) if seconds > 0.0 => {
                    let span = Duration::from_secs_f64(seconds).min(MAX_RUN);
                    let cycles = duration_to_micros(span).div_ceil(self.cycle_us);
                    self.advance(u32::try_from(cycles).unwrap_or(u32::MAX))
                }
                _ => vec!["ERR wait expects a positive number of seconds".to_string()],
            },
            "status" => self.status(),
            "events" => match argument.map_or(Ok(10), str::parse::<usize>) {
                Ok(count) => self.events(count),
                Err(_) => vec!["ERR events expects a count".to_string()],
            },
            "frames" => match parse_switch(argument) {
                Some(enabled) => {
                    self.show_frames = enabled;
                    vec![format!("OK frames {}", on_off(enabled))]
                }
                None => vec!["ERR frames expects on|off".to_string()],
            },
            "fault" => match parse_switch(argument) {
                Some(asserted) => {
                    self.context_mut()
                        .actuator
                        .stepper_mut()
                        .driver_mut()
                        .fault = asserted;
                    vec![format!("OK fault {}", on_off(asserted))]
                }
                None => vec!["ERR fault expects on|off".to_string()],
            },
            "storage" => match (argument, words.next().map(str::parse::<u32>)) {
                (Some("fail"), Some(Ok(writes))) => {
                    self.context_mut().storage.fail_writes = writes;
                    vec![format!("OK storage will fail {writes} write(s)")]
                }
                _ => vec!["ERR storage expects `fail <writes>`".to_string()],
            },
            _ => self.uplink(trimmed),
        }
    }

    #[must_use]
    pub fn now(&self) -> TimestampMicros {
        self.now
    }

    pub fn controller(&self) -> &MissionController<HostPlatform> {
        &self.controller
    }

    fn context_mut(&mut self) -> &mut MissionContext<HostPlatform> {
        self.controller.context_mut()
    }

    fn uplink(&mut self, line: &str) -> Vec<String> {
        match CommandParser::parse(line) {
            Ok(update) => {
                self.context_mut().link.push_line(line);
                vec![format!("OK queued {update:?}")]
            }
            Err(error) => vec![format!("ERR {error} `{line}`; type `help`")],
        }
    }

    fn advance(&mut self, cycles: u32) -> Vec<String> {
        let mut lines = Vec::new();

        for _ in 0..cycles {
            self.now += self.cycle_us;
            let transition = self.controller.step(self.now);
            self.collect_output(transition, &mut lines);
        }

        lines.push(format!(
            "{} {} after {cycles} cycle(s)",
            format_time(self.now),
            self.controller.state()
        ));
        lines
    }

    fn collect_output(&mut self, transition: Option<Transition>, lines: &mut Vec<String>) {
        let now = self.now;
        let show_frames = self.show_frames;
        let color = self.color;
        let context = self.controller.context_mut();

        if let Some(transition) = transition {
            lines.push(format!(
                "{} {} -> {}",
                format_time(transition.at),
                transition.from,
                transition.to
            ));
        }

        for pattern in context.indicator.drain_changes() {
            lines.push(format!(
                "{} indicator {}",
                format_time(now),
                paint(pattern, color)
            ));
        }

        for error in context.link.drain_rejected() {
            lines.push(format!("{} uplink rejected: {error}", format_time(now)));
        }

        let frames = context.link.drain_frames();
        if show_frames {
            lines.extend(frames);
        }
    }

    fn status(&self) -> Vec<String> {
        let context = self.controller.context();
        let telemetry = context.actuator.telemetry();
        let record = &context.record;

        let mut actuator = String::new();
        let _ = write!(
            actuator,
            "actuator {} pos={:.1} tgt={:.1} ({:.2} mm) spd={:.1} res={} cal={} lim={}",
            telemetry.mode.as_str(),
            telemetry.position,
            telemetry.target,
            telemetry.position_mm,
            telemetry.speed,
            telemetry.resolution,
            telemetry.calibrated,
            telemetry.limit_engaged,
        );

        vec![
            format!(
                "{} state={} cycle={} resurfaces={}",
                format_time(self.now),
                self.controller.state(),
                record.cycle,
                self.controller.states().resurfacing.iterations(),
            ),
            actuator,
            format!(
                "depth={:.2} m volts={} capacity={} log={} @ {} Hz",
                context.sensors.depth_m(),
                record
                    .power
                    .voltage
                    .value()
                    .map_or_else(|| "-".to_string(), |volts| format!("{volts:.2}")),
                record
                    .storage
                    .capacity_bytes
                    .value()
                    .map_or_else(|| "-".to_string(), |bytes| bytes.to_string()),
                on_off(context.logging_enabled()),
                context.log_rate_hz(),
            ),
            format!(
                "flags warn={} afault={} sfault={} indicator={} link-idle={}",
                u8::from(record.flags.warning),
                u8::from(record.flags.actuator_fault),
                u8::from(record.flags.storage_fault),
                context
                    .indicator
                    .current()
                    .map_or("-", IndicatorPattern::as_str),
                context.link.is_idle(),
            ),
        ]
    }

    fn events(&self, count: usize) -> Vec<String> {
        let events = &self.controller.context().events;
        let skip = events.len().saturating_sub(count);

        let mut lines: Vec<String> = events
            .oldest_first()
            .skip(skip)
            .map(|event| {
                format!(
                    "#{:<4} {} {}",
                    event.id,
                    format_time(event.timestamp),
                    event.kind
                )
            })
            .collect();
        if lines.is_empty() {
            lines.push("no events recorded".to_string());
        }
        lines
    }
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_switch(argument: Option<&str>) -> Option<bool> {
    match argument {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn paint(pattern: IndicatorPattern, color: bool) -> String {
    let label = pattern.as_str();
    if !color {
        return label.to_string();
    }

    match pattern {
        IndicatorPattern::Startup => label.cyan().to_string(),
        IndicatorPattern::Nominal => label.green().to_string(),
        IndicatorPattern::Warning => label.yellow().to_string(),
        IndicatorPattern::Error => label.red().bold().to_string(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_time(micros: TimestampMicros) -> String {
    format!("+{:.3}s", micros as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use mission_core::mission::MissionState;

    use super::*;

    fn session() -> Session {
        let options = SessionOptions {
            start_steps: 100,
            color: false,
            ..SessionOptions::default()
        };
        Session::new(&options, None).expect("session")
    }

    #[test]
    fn first_cycle_leaves_initialization() {
        let mut session = session();

        let lines = session.handle_command("step");

        assert!(lines.iter().any(|line| line.contains("initialization -> calibrate")));
        assert_eq!(session.controller().state(), MissionState::Calibrate);
    }

    #[test]
    fn uplink_commands_are_validated_before_queueing() {
        let mut session = session();

        let rejected = session.handle_command("dive deeper");
        assert!(rejected[0].starts_with("ERR"), "{rejected:?}");

        let accepted = session.handle_command("rate 20");
        assert!(accepted[0].starts_with("OK queued"), "{accepted:?}");
        session.handle_command("step 2");
        assert_eq!(session.controller().context().log_rate_hz(), 20);
    }

    #[test]
    fn idle_and_resume_through_the_prompt() {
        let mut session = session();
        session.handle_command("wait 1");

        let before = session.controller().state();
        session.handle_command("idle");
        session.handle_command("step");
        assert_eq!(session.controller().state(), MissionState::Idle);

        session.handle_command("resume");
        session.handle_command("step");
        assert_eq!(session.controller().state(), before);
    }

    #[test]
    fn run_advances_simulated_time() {
        let mut session = session();

        session.handle_command("wait 0.5");

        assert_eq!(session.now(), 500_000);
    }
}
