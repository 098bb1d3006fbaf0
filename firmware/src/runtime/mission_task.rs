use embassy_time::{Duration, Instant, Ticker};

use mission_core::mission::MissionController;
use mission_core::telemetry::EventId;

use super::BoardPlatform;
use crate::log::{log_event, log_transition};

/// Cycle period; the stepper is only pulsed from here, so this also bounds
/// pulse jitter.
const MISSION_TICK: Duration = Duration::from_millis(5);

#[embassy_executor::task]
pub async fn run(mut controller: MissionController<BoardPlatform>) -> ! {
    let mut ticker = Ticker::every(MISSION_TICK);
    let mut next_event: EventId = 0;

    loop {
        let now = Instant::now().as_micros();
        if let Some(transition) = controller.step(now) {
            log_transition(&transition);
        }

        let events = &controller.context().events;
        for event in events.oldest_first().filter(|event| event.id >= next_event) {
            log_event(event);
        }
        next_event = events.total();

        ticker.next().await;
    }
}
