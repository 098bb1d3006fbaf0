use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use static_cell::StaticCell;

use mission_core::config::{MissionConfig, StepperGeometry};
use mission_core::mission::MissionController;
use mission_core::orchestrator::MissionContext;
use mission_core::platform::{Collaborators, MissionPlatform, NoopNavigation};

use crate::hw::sensors::ProbeChannels;
use crate::hw::{BoardSensors, HardwareStepperDriver, LedIndicator};
use crate::link::{InboundQueue, OutboundQueue, UsbLink};
use crate::storage::RamLog;
use crate::usb;

mod indicator_task;
mod mission_task;
mod probe_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static LINK_INBOUND: InboundQueue = InboundQueue::new();
pub(super) static LINK_OUTBOUND: OutboundQueue = OutboundQueue::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

/// Collaborators wired to this board.
pub struct BoardPlatform;

impl MissionPlatform for BoardPlatform {
    type Sensors = BoardSensors<'static>;
    type Navigation = NoopNavigation;
    type Storage = RamLog;
    type Link = UsbLink<'static>;
    type Driver = HardwareStepperDriver<'static>;
    type Indicator = LedIndicator;
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        ADC1,
        PA0,
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PB0,
        PB1,
        PB3,
        PC6,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let driver = HardwareStepperDriver::new(
        Output::new(PB0, Level::Low, Speed::VeryHigh),
        Output::new(PB1, Level::Low, Speed::Low),
        Output::new(PA8, Level::Low, Speed::Low),
        Output::new(PB3, Level::Low, Speed::Low),
        Input::new(PA7, Pull::Up),
        Input::new(PA6, Pull::Up),
    );

    let sensors = BoardSensors::new(
        Adc::new(ADC1),
        ProbeChannels {
            battery: PA0.degrade_adc(),
            thermistor: PA1.degrade_adc(),
            pressure: PA4.degrade_adc(),
            tds: PA5.degrade_adc(),
        },
    );

    let collaborators: Collaborators<BoardPlatform> = Collaborators {
        sensors,
        navigation: NoopNavigation,
        storage: RamLog::new(),
        link: UsbLink::new(LINK_INBOUND.receiver(), LINK_OUTBOUND.sender()),
        driver,
        indicator: LedIndicator,
    };

    let context = MissionContext::new(MissionConfig::new(StepperGeometry::default()), collaborators);
    let controller = MissionController::new(context);

    spawner
        .spawn(mission_task::run(controller))
        .expect("failed to spawn mission task");

    spawner
        .spawn(usb_task::run(USB, PA12, PA11))
        .expect("failed to spawn USB task");

    spawner
        .spawn(probe_task::run())
        .expect("failed to spawn probe clock task");

    spawner
        .spawn(indicator_task::run(Output::new(PC6, Level::Low, Speed::Low)))
        .expect("failed to spawn indicator task");

    core::future::pending::<()>().await;
}
