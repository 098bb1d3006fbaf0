use super::{InitError, MissionState, StateHandler};
use crate::orchestrator::MissionContext;
use crate::platform::{MissionPlatform, ModeRequest, TelemetryLink};
use crate::telemetry::MissionEventKind;
use crate::timing::TimestampMicros;

/// Power-on bring-up.
#[derive(Copy, Clone, Debug, Default)]
pub struct InitializationState {
    failure: Option<InitError>,
}

impl InitializationState {
    pub const fn new() -> Self {
        Self { failure: None }
    }

    #[must_use]
    pub const fn failure(&self) -> Option<InitError> {
        self.failure
    }
}

impl<P: MissionPlatform> StateHandler<P> for InitializationState {
    fn enter(&mut self, ctx: &mut MissionContext<P>, _: Option<MissionState>, now: TimestampMicros) {
        self.failure = ctx.initialize(now).err();
        if let Some(error) = self.failure {
            ctx.events.record(MissionEventKind::InitFailed(error), now);
        }
    }

    fn run(&mut self, ctx: &mut MissionContext<P>, now: TimestampMicros) -> Option<MissionState> {
        if self.failure.is_some() {
            return Some(MissionState::ErrorIndication);
        }

        if ctx.run_cycle(now).idle_requested {
            return Some(MissionState::Idle);
        }

        Some(MissionState::Calibrate)
    }

    fn exit(&mut self, _: &mut MissionContext<P>, _: MissionState, _: TimestampMicros) {}
}

/// Zeroes the actuator against the limit switch.
#[derive(Copy, Clone, Debug, Default)]
pub struct CalibrateState;

impl<P: MissionPlatform> StateHandler<P> for CalibrateState {
    fn enter(&mut self, ctx: &mut MissionContext<P>, _: Option<MissionState>, now: TimestampMicros) {
        ctx.actuator.apply_profile(ctx.config.calibration);
        ctx.actuator.begin_calibration(now);
    }

    fn run(&mut self, ctx: &mut MissionContext<P>, now: TimestampMicros) -> Option<MissionState> {
        let report = ctx.run_cycle(now);
        if report.idle_requested {
            return Some(MissionState::Idle);
        }
        if !report.actuator_healthy {
            return None;
        }

        match ctx.actuator.calibrate(now) {
            Ok(true) => {
                ctx.events
                    .record(MissionEventKind::CalibrationComplete, now);
                Some(MissionState::Resurfacing)
            }
            Ok(false) => None,
            Err(_) => {
                ctx.events
                    .record(MissionEventKind::CalibrationTimedOut, now);
                Some(MissionState::ErrorIndication)
            }
        }
    }

    fn exit(&mut self, _: &mut MissionContext<P>, _: MissionState, _: TimestampMicros) {}
}

/// Floods the ballast to descend.
#[derive(Copy, Clone, Debug, Default)]
pub struct DivingState;

impl<P: MissionPlatform> StateHandler<P> for DivingState {
    fn enter(&mut self, ctx: &mut MissionContext<P>, _: Option<MissionState>, _: TimestampMicros) {
        let profile = ctx.motion_profile();
        ctx.actuator.apply_profile(profile);
        ctx.actuator.sink();
    }

    fn run(&mut self, ctx: &mut MissionContext<P>, now: TimestampMicros) -> Option<MissionState> {
        let report = ctx.run_cycle(now);
        if report.idle_requested {
            return Some(MissionState::Idle);
        }

        if report.actuator_healthy && ctx.actuator.is_sinking() && ctx.actuator.is_at_target() {
            return Some(MissionState::Resurfacing);
        }

        None
    }

    fn exit(&mut self, _: &mut MissionContext<P>, _: MissionState, _: TimestampMicros) {}
}

/// Empties the ballast to ascend; schedules periodic recalibration.
#[derive(Copy, Clone, Debug, Default)]
pub struct ResurfacingState {
    iterations: u8,
}

impl ResurfacingState {
    pub const fn new() -> Self {
        Self { iterations: 0 }
    }

    /// Completed resurfaces since the last calibration.
    #[must_use]
    pub const fn iterations(&self) -> u8 {
        self.iterations
    }
}

impl<P: MissionPlatform> StateHandler<P> for ResurfacingState {
    fn enter(&mut self, ctx: &mut MissionContext<P>, _: Option<MissionState>, _: TimestampMicros) {
        let profile = ctx.motion_profile();
        ctx.actuator.apply_profile(profile);
        ctx.actuator.rise();
    }

    fn run(&mut self, ctx: &mut MissionContext<P>, now: TimestampMicros) -> Option<MissionState> {
        let report = ctx.run_cycle(now);
        if report.idle_requested {
            return Some(MissionState::Idle);
        }

        if !report.actuator_healthy || !ctx.actuator.is_at_target() {
            return None;
        }

        if self.iterations >= ctx.config.recalibration_interval {
            Some(MissionState::Calibrate)
        } else {
            Some(MissionState::Diving)
        }
    }

    fn exit(&mut self, _: &mut MissionContext<P>, next: MissionState, _: TimestampMicros) {
        match next {
            MissionState::Calibrate => self.iterations = 0,
            MissionState::Diving => self.iterations = self.iterations.saturating_add(1),
            _ => {}
        }
    }
}

/// Parks the actuator until the ground station resumes the mission.
#[derive(Copy, Clone, Debug, Default)]
pub struct IdleState {
    resume_to: Option<MissionState>,
}

impl IdleState {
    pub const fn new() -> Self {
        Self { resume_to: None }
    }

    /// State that will be restored on resume; only set while Idle is active.
    #[must_use]
    pub const fn resume_to(&self) -> Option<MissionState> {
        self.resume_to
    }
}

impl<P: MissionPlatform> StateHandler<P> for IdleState {
    fn enter(
        &mut self,
        ctx: &mut MissionContext<P>,
        previous: Option<MissionState>,
        _: TimestampMicros,
    ) {
        self.resume_to = Some(previous.unwrap_or(MissionState::Calibrate));
        ctx.actuator.hold();
        ctx.link.set_idle(true);
    }

    fn run(&mut self, ctx: &mut MissionContext<P>, now: TimestampMicros) -> Option<MissionState> {
        ctx.run_cycle(now);

        if ctx.commands().mode == ModeRequest::Run {
            return Some(self.resume_to.unwrap_or(MissionState::Calibrate));
        }

        None
    }

    fn exit(&mut self, ctx: &mut MissionContext<P>, _: MissionState, _: TimestampMicros) {
        self.resume_to = None;
        ctx.link.set_idle(false);
    }
}

/// Holds the actuator and signals an error until an operator intervenes.
#[derive(Copy, Clone, Debug, Default)]
pub struct ErrorIndicationState;

impl<P: MissionPlatform> StateHandler<P> for ErrorIndicationState {
    fn enter(&mut self, ctx: &mut MissionContext<P>, _: Option<MissionState>, _: TimestampMicros) {
        ctx.actuator.hold();
    }

    fn run(&mut self, ctx: &mut MissionContext<P>, now: TimestampMicros) -> Option<MissionState> {
        if ctx.run_cycle(now).idle_requested {
            return Some(MissionState::Idle);
        }

        None
    }

    fn exit(&mut self, _: &mut MissionContext<P>, _: MissionState, _: TimestampMicros) {}
}

/// One handler per [`MissionState`], built once at startup.
#[derive(Copy, Clone, Debug, Default)]
pub struct StateTable {
    pub initialization: InitializationState,
    pub calibrate: CalibrateState,
    pub diving: DivingState,
    pub resurfacing: ResurfacingState,
    pub idle: IdleState,
    pub error: ErrorIndicationState,
}

impl StateTable {
    pub const fn new() -> Self {
        Self {
            initialization: InitializationState::new(),
            calibrate: CalibrateState,
            diving: DivingState,
            resurfacing: ResurfacingState::new(),
            idle: IdleState::new(),
            error: ErrorIndicationState,
        }
    }

    /// Handler for `state`.
    pub fn handler<P: MissionPlatform>(&mut self, state: MissionState) -> &mut dyn StateHandler<P> {
        match state {
            MissionState::Initialization => &mut self.initialization,
            MissionState::Calibrate => &mut self.calibrate,
            MissionState::Diving => &mut self.diving,
            MissionState::Resurfacing => &mut self.resurfacing,
            MissionState::Idle => &mut self.idle,
            MissionState::ErrorIndication => &mut self.error,
        }
    }
}
