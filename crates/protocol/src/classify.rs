//! Packet classification
//!
//! [`classify`] is the only decision the host makes about a packet. It is a
//! pure function: the same input always yields the same [`Classified`] value
//! and nothing is retained between calls.

use crate::packet::{
    ADDRESS_OFFSET, COMMAND_OFFSET, IR_EVENT_TAG, PACKET_SIZE, REPEAT_FLAG, REPEAT_OFFSET,
    RawPacket, TAG_OFFSET,
};
use std::fmt;

/// A decoded IR remote signal reported by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrEvent {
    /// IR device address
    pub address: u8,
    /// IR command code
    pub command: u8,
    /// True if the remote sent a repeat code (button held)
    pub repeating: bool,
}

impl IrEvent {
    /// Encode the event the way the firmware lays it out on the wire
    pub fn to_packet(&self) -> RawPacket {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[TAG_OFFSET] = IR_EVENT_TAG;
        bytes[ADDRESS_OFFSET] = self.address;
        bytes[COMMAND_OFFSET] = self.command;
        bytes[REPEAT_OFFSET] = if self.repeating { REPEAT_FLAG } else { 0 };
        RawPacket::new(bytes)
    }
}

impl fmt::Display for IrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address: 0x{:02X}, command: 0x{:02X}, repeating: {}",
            self.address, self.command, self.repeating
        )
    }
}

/// Outcome of classifying one read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classified {
    /// The read returned nothing within its timeout
    NoData,
    /// A recognized IR event packet
    IrEvent(IrEvent),
    /// Any packet with a non-zero tag, kept verbatim
    Unknown(RawPacket),
}

impl Classified {
    /// Output line for this result, or `None` when nothing should be printed
    pub fn render(&self) -> Option<String> {
        match self {
            Classified::NoData => None,
            Classified::IrEvent(event) => Some(format!("Got IR signal: {}", event)),
            Classified::Unknown(raw) => Some(format!("Got unknown packet: {}", raw)),
        }
    }

    /// Whether the read produced nothing
    pub fn is_no_data(&self) -> bool {
        matches!(self, Classified::NoData)
    }
}

/// Classify one read result
///
/// `None` stands for a read that timed out without data. A packet whose tag
/// byte is `0x00` is an IR event; the repeat flag is set only when byte 3 is
/// exactly `0x01`. Any other tag yields [`Classified::Unknown`] with the full
/// packet.
pub fn classify(packet: Option<&RawPacket>) -> Classified {
    let Some(packet) = packet else {
        return Classified::NoData;
    };

    let bytes = packet.as_bytes();
    if bytes[TAG_OFFSET] == IR_EVENT_TAG {
        Classified::IrEvent(IrEvent {
            address: bytes[ADDRESS_OFFSET],
            command: bytes[COMMAND_OFFSET],
            repeating: bytes[REPEAT_OFFSET] == REPEAT_FLAG,
        })
    } else {
        Classified::Unknown(*packet)
    }
}
