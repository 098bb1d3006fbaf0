use super::{LINK_INBOUND, LINK_OUTBOUND, USB_STORAGE};
use crate::link::LinkPacket;
use crate::usb::{self, UsbDeviceStrings};
use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_usb::driver::EndpointError;

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let usb::UsbTelemetryDevice { mut device, link } =
        usb::UsbTelemetryDevice::new(driver, storage, UsbDeviceStrings::default());
    let usb::CdcAcmHandle {
        sender,
        receiver,
        control,
    } = link;

    join(device.run(), run_link_interface(sender, receiver, control)).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_link_interface<D>(
    mut sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    mut receiver: embassy_usb::class::cdc_acm::Receiver<'static, D>,
    control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let inbound = LINK_INBOUND.sender();
    let outbound = LINK_OUTBOUND.receiver();
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut pending_tx: Option<LinkPacket> = None;

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &mut sender).await;
        // Telemetry queued while nobody was listening is stale.
        pending_tx.take();
        while outbound.try_receive().is_ok() {}

        defmt::info!("usb: ground station connected");

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                async {
                    if pending_tx.is_none() {
                        pending_tx = Some(outbound.receive().await);
                    }

                    let Some(packet) = pending_tx.as_ref() else {
                        return Ok(0);
                    };
                    let len = packet.len();
                    sender.write_packet(packet).await?;
                    pending_tx.take();
                    Ok::<usize, EndpointError>(len)
                },
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(count)) => {
                    if count == 0 {
                        continue;
                    }

                    let mut packet = LinkPacket::new();
                    if packet.extend_from_slice(&ingress[..count]).is_err() {
                        defmt::warn!("usb: dropping link packet len={} (overflow)", count);
                        continue;
                    }

                    inbound.send(packet).await;
                }
                Either3::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: link interface disabled");
                    break;
                }
                Either3::First(Err(_)) => {
                    defmt::warn!("usb: link read error");
                }
                Either3::Second(Ok(_)) => {}
                Either3::Second(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: link write disabled");
                    break;
                }
                Either3::Second(Err(_)) => {
                    defmt::warn!("usb: link write error");
                }
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: ground station dropped DTR");
                        break;
                    }
                }
            }
        }
    }
}

async fn wait_for_dtr<D>(
    control: &embassy_usb::class::cdc_acm::ControlChanged<'static>,
    sender: &mut embassy_usb::class::cdc_acm::Sender<'static, D>,
) where
    D: embassy_usb::driver::Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
