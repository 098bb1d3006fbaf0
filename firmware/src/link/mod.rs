//! Ground-station link carried over the USB CDC interface.
//!
//! The USB task only moves raw packets; line assembly, command parsing and
//! frame rendering happen here inside the mission task so the cycle never
//! awaits on the transport.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::{String, Vec};

use mission_core::platform::{CommandSet, IdleLatch, TelemetryLink};
use mission_core::record::MissionRecord;
use mission_core::telemetry::{LineAssembler, TelemetryFrame};

use crate::log::log_rejected_line;

/// Bytes per CDC bulk packet.
pub const PACKET_LEN: usize = 64;
/// Longest rendered telemetry line, terminator included.
pub const MAX_FRAME_LINE: usize = 384;
pub const INBOUND_DEPTH: usize = 8;
/// Room for two full secondary frames.
pub const OUTBOUND_DEPTH: usize = 2 * MAX_FRAME_LINE / PACKET_LEN;

#[cfg(target_os = "none")]
type LinkMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type LinkMutex = NoopRawMutex;

/// One USB packet worth of link bytes.
pub type LinkPacket = Vec<u8, PACKET_LEN>;

pub type InboundQueue = Channel<LinkMutex, LinkPacket, INBOUND_DEPTH>;
pub type InboundSender<'a> = Sender<'a, LinkMutex, LinkPacket, INBOUND_DEPTH>;
pub type InboundReceiver<'a> = Receiver<'a, LinkMutex, LinkPacket, INBOUND_DEPTH>;

pub type OutboundQueue = Channel<LinkMutex, LinkPacket, OUTBOUND_DEPTH>;
pub type OutboundSender<'a> = Sender<'a, LinkMutex, LinkPacket, OUTBOUND_DEPTH>;
pub type OutboundReceiver<'a> = Receiver<'a, LinkMutex, LinkPacket, OUTBOUND_DEPTH>;

/// Failures surfaced by [`UsbLink::send_frame`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkError {
    /// The rendered frame did not fit the line buffer.
    FrameTooLong,
    /// The USB task has not drained enough packets to take the whole frame.
    QueueFull,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// [`TelemetryLink`] backed by the USB packet queues.
pub struct UsbLink<'a> {
    inbound: InboundReceiver<'a>,
    outbound: OutboundSender<'a>,
    assembler: LineAssembler,
    commands: CommandSet,
    latch: IdleLatch,
    dropped_frames: u32,
}

impl<'a> UsbLink<'a> {
    pub fn new(inbound: InboundReceiver<'a>, outbound: OutboundSender<'a>) -> Self {
        Self {
            inbound,
            outbound,
            assembler: LineAssembler::new(),
            commands: CommandSet::new(),
            latch: IdleLatch::new(),
            dropped_frames: 0,
        }
    }

    /// Frames discarded because the host was not keeping up.
    pub const fn dropped_frames(&self) -> u32 {
        self.dropped_frames
    }

    fn render(frame: &TelemetryFrame) -> Result<String<MAX_FRAME_LINE>, LinkError> {
        let mut line = String::new();
        frame
            .write_line(&mut line)
            .map_err(|_| LinkError::FrameTooLong)?;
        line.push_str("\r\n")
            .map_err(|_| LinkError::FrameTooLong)?;
        Ok(line)
    }
}

impl TelemetryLink for UsbLink<'_> {
    type Error = LinkError;

    fn init(&mut self) {
        while self.inbound.try_receive().is_ok() {}
        self.assembler = LineAssembler::new();
        self.commands = CommandSet::new();
        self.latch = IdleLatch::new();
    }

    fn handle_transport(&mut self, _: &MissionRecord) -> bool {
        while let Ok(packet) = self.inbound.try_receive() {
            for &byte in &packet {
                if let Err(error) = self.assembler.ingest(byte, &mut self.commands) {
                    log_rejected_line(error);
                }
            }
        }

        self.latch.poll(&self.commands)
    }

    fn send_frame(&mut self, frame: &TelemetryFrame) -> Result<(), Self::Error> {
        let line = Self::render(frame)?;
        let chunks = line.as_bytes().chunks(PACKET_LEN);

        // Whole frames only; a partial line would corrupt the next one.
        if self.outbound.free_capacity() < chunks.len() {
            self.dropped_frames = self.dropped_frames.wrapping_add(1);
            return Err(LinkError::QueueFull);
        }

        for chunk in chunks {
            let mut packet = LinkPacket::new();
            packet
                .extend_from_slice(chunk)
                .map_err(|_| LinkError::FrameTooLong)?;
            self.outbound
                .try_send(packet)
                .map_err(|_| LinkError::QueueFull)?;
        }

        Ok(())
    }

    fn commands(&self) -> CommandSet {
        self.commands
    }

    fn set_idle(&mut self, idle: bool) {
        self.latch.set(idle);
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec as StdVec;

    use mission_core::platform::ModeRequest;
    use mission_core::telemetry::FrameHalf;

    use super::*;

    fn packet(bytes: &[u8]) -> LinkPacket {
        let mut packet = LinkPacket::new();
        packet.extend_from_slice(bytes).expect("fits one packet");
        packet
    }

    fn drain(outbound: &OutboundQueue) -> StdVec<u8> {
        let receiver = outbound.receiver();
        let mut bytes = StdVec::new();
        while let Ok(packet) = receiver.try_receive() {
            bytes.extend_from_slice(&packet);
        }
        bytes
    }

    #[test]
    fn commands_split_across_packets_are_reassembled() {
        let inbound = InboundQueue::new();
        let outbound = OutboundQueue::new();
        let mut link = UsbLink::new(inbound.receiver(), outbound.sender());
        let record = MissionRecord::new();

        inbound.try_send(packet(b"spe")).expect("queue has room");
        inbound.try_send(packet(b"ed 900\nid")).expect("queue has room");
        assert!(!link.handle_transport(&record));
        assert_eq!(link.commands().actuator_speed, Some(900.0));

        inbound.try_send(packet(b"le\r\n")).expect("queue has room");
        assert!(link.handle_transport(&record));
        assert_eq!(link.commands().mode, ModeRequest::Idle);
        assert!(!link.handle_transport(&record), "idle reported once");
    }

    #[test]
    fn malformed_lines_leave_commands_untouched() {
        let inbound = InboundQueue::new();
        let outbound = OutboundQueue::new();
        let mut link = UsbLink::new(inbound.receiver(), outbound.sender());

        inbound.try_send(packet(b"dive now\n")).expect("queue has room");
        assert!(!link.handle_transport(&MissionRecord::new()));
        assert_eq!(link.commands(), CommandSet::new());
    }

    #[test]
    fn frames_are_chunked_into_packets() {
        let inbound = InboundQueue::new();
        let outbound = OutboundQueue::new();
        let mut link = UsbLink::new(inbound.receiver(), outbound.sender());
        let record = MissionRecord::new();

        let frame = TelemetryFrame::from_record(&record, FrameHalf::Secondary);
        link.send_frame(&frame).expect("queue empty");

        let bytes = drain(&outbound);
        let line = core::str::from_utf8(&bytes).expect("utf-8 frame");
        assert!(line.starts_with("S t=0"), "{line}");
        assert!(line.ends_with("\r\n"));
    }

    #[test]
    fn full_queue_drops_whole_frames() {
        let inbound = InboundQueue::new();
        let outbound = OutboundQueue::new();
        let mut link = UsbLink::new(inbound.receiver(), outbound.sender());
        let record = MissionRecord::new();
        let frame = TelemetryFrame::from_record(&record, FrameHalf::Primary);

        let mut sent = 0;
        while link.send_frame(&frame).is_ok() {
            sent += 1;
        }

        assert!(sent > 0);
        assert_eq!(link.send_frame(&frame), Err(LinkError::QueueFull));
        assert_eq!(link.dropped_frames(), 2);

        let bytes = drain(&outbound);
        let text = core::str::from_utf8(&bytes).expect("utf-8 frames");
        assert_eq!(text.matches("\r\n").count(), sent);
    }
}
