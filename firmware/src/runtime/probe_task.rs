use embassy_time::{Duration, Ticker};

use crate::hw::PROBES_READY;

/// The analog probes settle slowly; sampling faster only adds noise.
const PROBE_PERIOD: Duration = Duration::from_millis(200);

#[embassy_executor::task]
pub async fn run() -> ! {
    let mut ticker = Ticker::every(PROBE_PERIOD);
    loop {
        ticker.next().await;
        PROBES_READY.signal();
    }
}
