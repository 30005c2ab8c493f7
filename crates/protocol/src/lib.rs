//! Packet protocol for the IR USB receiver
//!
//! The receiver firmware decodes IR remote frames itself and reports each one
//! as a fixed 64-byte USB packet. This crate defines that packet layout and the
//! pure classification step that turns a raw read into an [`IrEvent`], an
//! unknown packet, or nothing at all.
//!
//! # Example
//!
//! ```
//! use protocol::{Classified, IrEvent, RawPacket, classify};
//!
//! let mut bytes = [0u8; protocol::PACKET_SIZE];
//! bytes[1] = 0x20;
//! bytes[2] = 0x15;
//! bytes[3] = 0x01;
//! let packet = RawPacket::new(bytes);
//!
//! let result = classify(Some(&packet));
//! assert_eq!(
//!     result,
//!     Classified::IrEvent(IrEvent { address: 0x20, command: 0x15, repeating: true })
//! );
//! assert_eq!(
//!     result.render().as_deref(),
//!     Some("Got IR signal: address: 0x20, command: 0x15, repeating: true")
//! );
//! ```

pub mod classify;
pub mod error;
pub mod packet;

pub use classify::{Classified, IrEvent, classify};
pub use error::{ProtocolError, Result};
pub use packet::{
    ADDRESS_OFFSET, COMMAND_OFFSET, IR_EVENT_TAG, PACKET_SIZE, REPEAT_FLAG, REPEAT_OFFSET,
    RawPacket, TAG_OFFSET,
};
