//! USB subsystem
//!
//! Finds the IR receiver, claims its vendor interface, discovers the read and
//! write pipes, and exposes the device as a [`common::PacketSource`].

pub mod device;
pub mod listing;
pub mod pipes;

pub use device::{IrReceiverDevice, map_rusb_error};
pub use listing::{DeviceSummary, list_devices};
pub use pipes::{PipeKind, Pipes};
