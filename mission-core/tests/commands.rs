#![allow(clippy::float_cmp)]

mod common;

use common::{CYCLE_US, collaborators, context, controller, run_until_state};
use mission_core::mission::MissionState;
use mission_core::platform::CommandSet;
use mission_core::telemetry::{LineAssembler, MissionEventKind};

fn feed(line: &[u8], commands: &mut CommandSet) {
    let mut assembler = LineAssembler::new();
    for byte in line {
        assembler.ingest(*byte, commands).expect("valid command");
    }
}

#[test]
fn log_rate_override_reaches_storage() {
    let mut ctx = context(collaborators(0));
    ctx.initialize(0).expect("bring-up");
    assert_eq!(ctx.storage.rate_hz, 10);

    feed(b"rate 25\n", &mut ctx.link.commands);
    ctx.run_cycle(CYCLE_US);

    assert_eq!(ctx.log_rate_hz(), 25);
    assert_eq!(ctx.storage.rate_hz, 25);
    assert_eq!(
        ctx.events.latest().map(|event| event.kind),
        Some(MissionEventKind::LogRateChanged(25))
    );

    ctx.run_cycle(2 * CYCLE_US);
    assert_eq!(ctx.record.storage.log_rate_hz, 25);
}

#[test]
fn logging_can_be_paused_and_resumed() {
    let mut ctx = context(collaborators(0));
    ctx.initialize(0).expect("bring-up");

    feed(b"log off\n", &mut ctx.link.commands);
    ctx.run_cycle(CYCLE_US);
    assert!(!ctx.logging_enabled());

    let mut now = CYCLE_US;
    for _ in 0..30 {
        now += CYCLE_US;
        assert!(!ctx.run_cycle(now).logged);
    }
    assert!(ctx.storage.written.is_empty());
    assert!(!ctx.record.storage.logging_enabled);

    feed(b"log on\n", &mut ctx.link.commands);
    now += CYCLE_US;
    ctx.run_cycle(now);
    now += CYCLE_US;
    assert!(ctx.run_cycle(now).logged, "overdue write fires on resume");
    assert_eq!(ctx.storage.written.len(), 1);
}

#[test]
fn speed_override_applies_on_next_dive() {
    let mut parts = collaborators(0);
    feed(b"speed 800\n", &mut parts.link.commands);
    feed(b"accel 400\n", &mut parts.link.commands);
    let mut controller = controller(parts);

    run_until_state(&mut controller, 0, MissionState::Diving);

    let stepper = controller.context().actuator.stepper();
    assert_eq!(stepper.max_speed(), 800.0);
    assert_eq!(stepper.acceleration(), 400.0);
}

#[test]
fn capacity_is_polled_on_the_first_cycle() {
    let mut ctx = context(collaborators(0));
    ctx.initialize(0).expect("bring-up");

    ctx.run_cycle(CYCLE_US);

    assert_eq!(ctx.storage.capacity_polls, 1);
    assert!(ctx.record.storage.capacity_bytes.is_fresh());

    ctx.run_cycle(2 * CYCLE_US);
    assert_eq!(ctx.storage.capacity_polls, 1);
    assert!(!ctx.record.storage.capacity_bytes.is_fresh());
}
