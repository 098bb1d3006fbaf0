use super::{MissionState, StateTable};
use crate::orchestrator::MissionContext;
use crate::platform::MissionPlatform;
use crate::telemetry::MissionEventKind;
use crate::timing::TimestampMicros;

/// A completed state change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub from: MissionState,
    pub to: MissionState,
    pub at: TimestampMicros,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Lifecycle {
    /// Initialization has not been entered yet.
    Pending,
    Entered,
    Exited,
}

/// Drives the mission: one [`MissionController::step`] per main-loop pass.
pub struct MissionController<P: MissionPlatform> {
    context: MissionContext<P>,
    states: StateTable,
    current: MissionState,
    lifecycle: Lifecycle,
}

impl<P: MissionPlatform> MissionController<P> {
    pub fn new(context: MissionContext<P>) -> Self {
        Self {
            context,
            states: StateTable::new(),
            current: MissionState::Initialization,
            lifecycle: Lifecycle::Pending,
        }
    }

    #[must_use]
    pub const fn state(&self) -> MissionState {
        self.current
    }

    pub const fn context(&self) -> &MissionContext<P> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut MissionContext<P> {
        &mut self.context
    }

    pub const fn states(&self) -> &StateTable {
        &self.states
    }

    /// Runs the active state once and applies any transition it requests.
    ///
    /// The first call enters Initialization, which performs bring-up, and then
    /// runs it in the same pass.
    pub fn step(&mut self, now: TimestampMicros) -> Option<Transition> {
        if self.lifecycle == Lifecycle::Pending {
            self.context.set_state(self.current);
            self.context
                .events
                .record(MissionEventKind::StateEntered(self.current), now);
            self.states
                .handler::<P>(self.current)
                .enter(&mut self.context, None, now);
            self.lifecycle = Lifecycle::Entered;
        }

        let next = self
            .states
            .handler::<P>(self.current)
            .run(&mut self.context, now)?;

        Some(self.transition(next, now))
    }

    fn transition(&mut self, next: MissionState, now: TimestampMicros) -> Transition {
        let previous = self.current;

        debug_assert_eq!(self.lifecycle, Lifecycle::Entered, "exit without enter");
        self.states
            .handler::<P>(previous)
            .exit(&mut self.context, next, now);
        self.lifecycle = Lifecycle::Exited;
        self.context
            .events
            .record(MissionEventKind::StateExited(previous), now);

        self.current = next;
        self.context.set_state(next);

        debug_assert_eq!(self.lifecycle, Lifecycle::Exited, "enter without exit");
        self.context
            .events
            .record(MissionEventKind::StateEntered(next), now);
        self.states
            .handler::<P>(next)
            .enter(&mut self.context, Some(previous), now);
        self.lifecycle = Lifecycle::Entered;

        Transition {
            from: previous,
            to: next,
            at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissionConfig;
    use crate::platform::{Collaborators, NoopPlatform};

    fn controller() -> MissionController<NoopPlatform> {
        MissionController::new(MissionContext::new(
            MissionConfig::default(),
            Collaborators::noop(),
        ))
    }

    #[test]
    fn first_step_initializes_then_calibrates() {
        let mut controller = controller();

        let transition = controller.step(0).expect("initialization always moves on");

        assert_eq!(transition.from, MissionState::Initialization);
        assert_eq!(transition.to, MissionState::Calibrate);
        assert_eq!(controller.state(), MissionState::Calibrate);
        assert_eq!(controller.context().state(), MissionState::Calibrate);
    }

    #[test]
    fn idle_remembers_state_until_resumed() {
        let mut controller = controller();
        controller.step(0);

        let mut states = StateTable::new();
        let ctx = controller.context_mut();
        states
            .handler::<NoopPlatform>(MissionState::Idle)
            .enter(ctx, Some(MissionState::Diving), 10);
        assert_eq!(states.idle.resume_to(), Some(MissionState::Diving));

        states
            .handler::<NoopPlatform>(MissionState::Idle)
            .exit(ctx, MissionState::Diving, 20);
        assert_eq!(states.idle.resume_to(), None);
    }

    #[test]
    fn resurfacing_counter_follows_exit_target() {
        let mut controller = controller();
        let mut states = StateTable::new();
        let ctx = controller.context_mut();

        for _ in 0..3 {
            states
                .handler::<NoopPlatform>(MissionState::Resurfacing)
                .exit(ctx, MissionState::Diving, 0);
        }
        assert_eq!(states.resurfacing.iterations(), 3);

        states
            .handler::<NoopPlatform>(MissionState::Resurfacing)
            .exit(ctx, MissionState::Idle, 0);
        assert_eq!(states.resurfacing.iterations(), 3);

        states
            .handler::<NoopPlatform>(MissionState::Resurfacing)
            .exit(ctx, MissionState::Calibrate, 0);
        assert_eq!(states.resurfacing.iterations(), 0);
    }
}
