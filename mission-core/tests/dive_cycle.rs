#![allow(clippy::float_cmp)]

mod common;

use common::{CYCLE_US, collaborators, controller, run_until_state};
use mission_core::actuator::ActuatorMode;
use mission_core::mission::MissionState;
use mission_core::telemetry::MissionEventKind;

#[test]
fn calibrates_then_dives_and_recalibrates_every_fourth_resurface() {
    let mut controller = controller(collaborators(120));

    let (first, now) = run_until_state(&mut controller, 0, MissionState::Resurfacing);
    let path: Vec<_> = first.iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        path,
        [
            (MissionState::Initialization, MissionState::Calibrate),
            (MissionState::Calibrate, MissionState::Resurfacing),
        ]
    );
    assert!(controller.context().actuator.is_calibrated());
    assert_eq!(controller.context().actuator.position(), 0.0);

    let (leg, _) = run_until_state(&mut controller, now + CYCLE_US, MissionState::Calibrate);
    assert!(leg.iter().all(|t| matches!(
        (t.from, t.to),
        (MissionState::Resurfacing, MissionState::Diving)
            | (MissionState::Diving, MissionState::Resurfacing)
            | (MissionState::Resurfacing, MissionState::Calibrate)
    )));

    let dives = leg.iter().filter(|t| t.to == MissionState::Diving).count();
    assert_eq!(dives, 3, "three dives between calibrations");
    assert_eq!(leg.last().map(|t| t.from), Some(MissionState::Resurfacing));
    assert_eq!(controller.states().resurfacing.iterations(), 0);
}

#[test]
fn dive_reaches_the_sink_extreme_before_resurfacing() {
    let mut controller = controller(collaborators(0));

    let (_, now) = run_until_state(&mut controller, 0, MissionState::Diving);
    assert_eq!(controller.context().actuator.target(), 200.0);
    assert_eq!(controller.context().actuator.mode(), ActuatorMode::Sinking);

    let (_, _) = run_until_state(&mut controller, now + CYCLE_US, MissionState::Resurfacing);
    let actuator = &controller.context().actuator;
    assert_eq!(actuator.position(), 200.0);
    assert_eq!(actuator.target(), 0.0);
    assert!(actuator.is_rising());
}

#[test]
fn transitions_alternate_exit_and_enter() {
    let mut controller = controller(collaborators(40));

    run_until_state(&mut controller, 0, MissionState::Diving);

    let events = &controller.context().events;
    assert_eq!(events.total() as usize, events.len(), "ring did not wrap");

    let mut active: Option<MissionState> = None;
    for event in events.oldest_first() {
        match event.kind {
            MissionEventKind::StateEntered(state) => {
                assert_eq!(active, None, "entered {state} before exiting");
                active = Some(state);
            }
            MissionEventKind::StateExited(state) => {
                assert_eq!(active, Some(state), "exited {state} without entering");
                active = None;
            }
            _ => {}
        }
    }
    assert_eq!(active, Some(MissionState::Diving));
}

#[test]
fn calibration_records_completion_event() {
    let mut controller = controller(collaborators(60));

    run_until_state(&mut controller, 0, MissionState::Resurfacing);

    assert!(
        controller
            .context()
            .events
            .oldest_first()
            .any(|event| event.kind == MissionEventKind::CalibrationComplete)
    );
}
