//! Packet source capability
//!
//! The polling loop only needs three operations from a device: open it, read
//! one packet with a bounded wait, and close it. Keeping them behind a trait
//! lets the loop run against the scripted `FakeSource` in tests and
//! against the rusb device in the binary.

use crate::error::{OpenError, TransferError};
use protocol::RawPacket;
use std::fmt;
use std::time::Duration;

/// Vendor ID of the IR receiver firmware
pub const DEFAULT_VENDOR_ID: u16 = 0xF055;
/// Product ID of the IR receiver firmware
pub const DEFAULT_PRODUCT_ID: u16 = 0xB195;

/// Identifies which USB device and interface to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSelector {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Interface number; auto-detected when `None`
    pub interface: Option<u8>,
}

impl DeviceSelector {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            interface: None,
        }
    }

    pub fn with_interface(mut self, interface: u8) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Check whether a VID/PID pair matches this selector
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::new(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID)
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)?;
        if let Some(interface) = self.interface {
            write!(f, " interface {}", interface)?;
        }
        Ok(())
    }
}

/// A device that produces fixed-size packets
pub trait PacketSource: Sized {
    /// What `open` needs to find the device
    type Selector;

    /// Open and prepare the device for reading
    fn open(selector: &Self::Selector) -> Result<Self, OpenError>;

    /// Read one packet, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` when nothing arrived in time. A timeout is a normal
    /// polling outcome, not an error.
    fn read_with_timeout(&mut self, timeout: Duration) -> Result<Option<RawPacket>, TransferError>;

    /// Release the device. Calling it more than once is harmless.
    fn close(&mut self) -> Result<(), TransferError>;
}

/// A packet source that can also send packets to the device
pub trait LoopbackTarget: PacketSource {
    /// Write one packet, waiting at most `timeout`
    fn write_with_timeout(
        &mut self,
        packet: &RawPacket,
        timeout: Duration,
    ) -> Result<(), TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selector() {
        let selector = DeviceSelector::default();
        assert_eq!(selector.vendor_id, 0xF055);
        assert_eq!(selector.product_id, 0xB195);
        assert_eq!(selector.interface, None);
        assert_eq!(selector.to_string(), "f055:b195");
    }

    #[test]
    fn test_selector_matches() {
        let selector = DeviceSelector::new(0x1234, 0x5678);
        assert!(selector.matches(0x1234, 0x5678));
        assert!(!selector.matches(0x1234, 0x0000));
        assert!(!selector.matches(0x0000, 0x5678));
    }

    #[test]
    fn test_selector_with_interface_display() {
        let selector = DeviceSelector::new(0x1234, 0x5678).with_interface(2);
        assert_eq!(selector.to_string(), "1234:5678 interface 2");
    }
}
