use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Timer};

use crate::hw::{blink_timing, indicator_pattern};

#[embassy_executor::task]
pub async fn run(mut led: Output<'static>) -> ! {
    loop {
        let (on_ms, off_ms) = blink_timing(indicator_pattern());

        led.set_high();
        Timer::after(Duration::from_millis(on_ms)).await;
        if off_ms > 0 {
            led.set_low();
            Timer::after(Duration::from_millis(off_ms)).await;
        }
    }
}
