//! Raw packet layout
//!
//! Every transfer on the receiver's IN endpoint carries exactly one packet of
//! [`PACKET_SIZE`] bytes. IR event packets use the first four bytes:
//!
//! | Offset | Meaning                                  |
//! |--------|------------------------------------------|
//! | 0      | Tag, `0x00` for an IR event              |
//! | 1      | IR address                               |
//! | 2      | IR command                               |
//! | 3      | `0x01` if the frame is a repeat code     |
//!
//! The remaining bytes are zero-filled by the firmware.

use crate::error::{ProtocolError, Result};
use std::fmt;

/// Size of one packet on the wire
pub const PACKET_SIZE: usize = 64;

/// Offset of the packet tag
pub const TAG_OFFSET: usize = 0;
/// Offset of the IR address
pub const ADDRESS_OFFSET: usize = 1;
/// Offset of the IR command
pub const COMMAND_OFFSET: usize = 2;
/// Offset of the repeat flag
pub const REPEAT_OFFSET: usize = 3;

/// Tag value identifying an IR event packet
pub const IR_EVENT_TAG: u8 = 0x00;
/// Repeat flag value meaning "this is a repeat code"
pub const REPEAT_FLAG: u8 = 0x01;

/// One fixed-size packet as read from the device
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawPacket([u8; PACKET_SIZE]);

impl RawPacket {
    /// Wrap a full packet buffer
    pub const fn new(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a packet from a slice of exactly [`PACKET_SIZE`] bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let bytes: [u8; PACKET_SIZE] = data.try_into().map_err(|_| ProtocolError::InvalidLength {
            expected: PACKET_SIZE,
            actual: data.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Build a packet from a possibly short transfer
    ///
    /// Missing trailing bytes are zero-filled, matching what the firmware
    /// sends for unused fields.
    pub fn from_partial(data: &[u8]) -> Result<Self> {
        if data.len() > PACKET_SIZE {
            return Err(ProtocolError::PacketTooLarge {
                size: data.len(),
                max: PACKET_SIZE,
            });
        }

        let mut bytes = [0u8; PACKET_SIZE];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self(bytes))
    }

    /// The packet tag (byte 0)
    pub fn tag(&self) -> u8 {
        self.0[TAG_OFFSET]
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }

    /// Consume the packet, returning the raw bytes
    pub fn into_bytes(self) -> [u8; PACKET_SIZE] {
        self.0
    }
}

impl AsRef<[u8]> for RawPacket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Renders as `[01, FF, 00, ...]`
impl fmt::Display for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPacket").field(&format_args!("{}", self)).finish()
    }
}
