#![allow(clippy::float_cmp)]

mod common;

use common::{CYCLE_US, SimPlatform, collaborators, controller, run_until_state};
use mission_core::mission::{MissionController, MissionState};
use mission_core::platform::ModeRequest;
use mission_core::timing::TimestampMicros;

fn request_mode(controller: &mut MissionController<SimPlatform>, mode: ModeRequest) {
    controller.context_mut().link.commands.mode = mode;
}

/// Requests Idle, checks the saved state, then resumes and expects to land
/// back where the mission was.
fn idle_round_trip(
    controller: &mut MissionController<SimPlatform>,
    now: TimestampMicros,
) -> TimestampMicros {
    let active = controller.state();

    request_mode(controller, ModeRequest::Idle);
    let parked = controller.step(now).expect("idle request transitions");
    assert_eq!((parked.from, parked.to), (active, MissionState::Idle));
    assert_eq!(controller.states().idle.resume_to(), Some(active));
    assert!(controller.context().link.idle);

    let now = now + CYCLE_US;
    assert_eq!(controller.step(now), None, "stays idle until resumed");

    request_mode(controller, ModeRequest::Run);
    let now = now + CYCLE_US;
    let resumed = controller.step(now).expect("run request resumes");
    assert_eq!((resumed.from, resumed.to), (MissionState::Idle, active));
    assert_eq!(controller.states().idle.resume_to(), None);
    assert!(!controller.context().link.idle);

    now + CYCLE_US
}

#[test]
fn idle_resumes_initialization() {
    let mut controller = controller(collaborators(30));
    request_mode(&mut controller, ModeRequest::Idle);

    let parked = controller.step(0).expect("initialization honours idle");
    assert_eq!(parked.to, MissionState::Idle);
    assert_eq!(
        controller.states().idle.resume_to(),
        Some(MissionState::Initialization)
    );

    request_mode(&mut controller, ModeRequest::Run);
    let resumed = controller.step(CYCLE_US).expect("resume");
    assert_eq!(resumed.to, MissionState::Initialization);
    let next = controller.step(2 * CYCLE_US).expect("bring-up repeats");
    assert_eq!(next.to, MissionState::Calibrate);
}

#[test]
fn idle_resumes_calibrate_diving_and_resurfacing() {
    let mut controller = controller(collaborators(80));

    let (_, now) = run_until_state(&mut controller, 0, MissionState::Calibrate);
    let now = idle_round_trip(&mut controller, now + CYCLE_US);

    let (_, now) = run_until_state(&mut controller, now, MissionState::Resurfacing);
    let now = idle_round_trip(&mut controller, now + CYCLE_US);

    let (_, now) = run_until_state(&mut controller, now, MissionState::Diving);
    idle_round_trip(&mut controller, now + CYCLE_US);
}

#[test]
fn idle_resumes_error_indication() {
    let mut parts = collaborators(0);
    parts.sensors.fail_init = true;
    let mut controller = controller(parts);

    let failed = controller.step(0).expect("init failure");
    assert_eq!(failed.to, MissionState::ErrorIndication);

    idle_round_trip(&mut controller, CYCLE_US);
}

#[test]
fn idle_holds_the_carriage() {
    let mut controller = controller(collaborators(0));

    let (_, now) = run_until_state(&mut controller, 0, MissionState::Diving);
    let mut now = now;
    for _ in 0..50 {
        now += CYCLE_US;
        controller.step(now);
    }
    let moving = controller.context().actuator.position();
    assert!(moving > 0.0);

    request_mode(&mut controller, ModeRequest::Idle);
    now += CYCLE_US;
    controller.step(now).expect("idle");
    let held = controller.context().actuator.position();
    assert_eq!(controller.context().actuator.stepper().speed(), 0.0);

    for _ in 0..20 {
        now += CYCLE_US;
        assert_eq!(controller.step(now), None);
    }
    assert_eq!(controller.context().actuator.position(), held);
    assert!(
        controller
            .context()
            .record
            .environment
            .temperature_c
            .is_fresh(),
        "idle keeps sampling"
    );
}
