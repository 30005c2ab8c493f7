//! rusb-backed packet source
//!
//! Opens the IR receiver by VID/PID, claims its vendor interface and reads
//! packets from the IN pipe.

use crate::usb::pipes::{InterfaceCandidate, PipeKind, Pipes, choose_interface};
use common::{DeviceSelector, LoopbackTarget, OpenError, PacketSource, TransferError};
use protocol::{PACKET_SIZE, RawPacket};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Timeout of each read while draining stale packets
const FLUSH_TIMEOUT: Duration = Duration::from_millis(1);
/// Upper bound on packets discarded by a flush
const FLUSH_LIMIT: usize = 16;

/// The opened IR receiver
pub struct IrReceiverDevice {
    handle: DeviceHandle<Context>,
    interface: u8,
    pipes: Pipes,
    claimed: bool,
}

impl IrReceiverDevice {
    /// Discard anything the device queued before we started listening
    pub fn flush(&mut self) -> usize {
        let mut buffer = [0u8; PACKET_SIZE];
        let mut discarded = 0;

        while discarded < FLUSH_LIMIT {
            match self.raw_read(&mut buffer, FLUSH_TIMEOUT) {
                Ok(len) if len > 0 => {
                    trace!("Flushed {} stale bytes", len);
                    discarded += 1;
                }
                Ok(_) | Err(rusb::Error::Timeout) => break,
                Err(e) => {
                    debug!("Flush stopped: {}", e);
                    break;
                }
            }
        }

        if discarded > 0 {
            debug!("Discarded {} stale packets", discarded);
        }
        discarded
    }

    fn raw_read(&self, buffer: &mut [u8], timeout: Duration) -> Result<usize, rusb::Error> {
        match self.pipes.read_kind {
            PipeKind::Bulk => self.handle.read_bulk(self.pipes.read_pipe, buffer, timeout),
            PipeKind::Interrupt => {
                self.handle
                    .read_interrupt(self.pipes.read_pipe, buffer, timeout)
            }
        }
    }

    fn raw_write(&self, data: &[u8], timeout: Duration) -> Result<usize, rusb::Error> {
        match self.pipes.write_kind {
            PipeKind::Bulk => self.handle.write_bulk(self.pipes.write_pipe, data, timeout),
            PipeKind::Interrupt => {
                self.handle
                    .write_interrupt(self.pipes.write_pipe, data, timeout)
            }
        }
    }
}

impl PacketSource for IrReceiverDevice {
    type Selector = DeviceSelector;

    fn open(selector: &DeviceSelector) -> Result<Self, OpenError> {
        let context = Context::new().map_err(|e| OpenError::BackendUnavailable(e.to_string()))?;

        let device = find_device(&context, selector)?.ok_or(OpenError::NotFound {
            vendor_id: selector.vendor_id,
            product_id: selector.product_id,
        })?;

        let handle = device.open().map_err(|e| {
            warn!("Failed to open device {}: {}", selector, e);
            OpenError::OpenFailed(e.to_string())
        })?;
        debug!(
            "Opened device {} at bus {:03} address {:03}",
            selector,
            device.bus_number(),
            device.address()
        );

        let config = device.active_config_descriptor().map_err(|e| {
            OpenError::OpenFailed(format!("Failed to get config descriptor: {}", e))
        })?;
        let candidates = InterfaceCandidate::from_config(&config);

        let interface = choose_interface(&candidates, selector.interface).ok_or_else(|| {
            OpenError::OpenFailed(match selector.interface {
                Some(number) => format!("Interface {} not present", number),
                None => "Device has no interfaces".to_string(),
            })
        })?;
        let pipes = Pipes::discover(interface).ok_or_else(|| {
            OpenError::OpenFailed(format!("Interface {} has no endpoints", interface.number))
        })?;
        let interface_number = interface.number;

        match handle.kernel_driver_active(interface_number) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", interface_number);
                if let Err(e) = handle.detach_kernel_driver(interface_number) {
                    warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface_number, e
                    );
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface_number, e
                );
            }
        }

        handle.claim_interface(interface_number).map_err(|e| {
            OpenError::OpenFailed(format!(
                "Failed to claim interface {}: {}",
                interface_number, e
            ))
        })?;

        info!(
            "Claimed interface {}, write pipe {:#04x}, read pipe {:#04x} ({:?})",
            interface_number, pipes.write_pipe, pipes.read_pipe, pipes.read_kind
        );

        let mut receiver = Self {
            handle,
            interface: interface_number,
            pipes,
            claimed: true,
        };
        receiver.flush();
        Ok(receiver)
    }

    fn read_with_timeout(&mut self, timeout: Duration) -> Result<Option<RawPacket>, TransferError> {
        let mut buffer = [0u8; PACKET_SIZE];

        match self.raw_read(&mut buffer, timeout) {
            Ok(0) => Ok(None),
            Ok(len) => {
                if len < PACKET_SIZE {
                    debug!("Short read of {} bytes, zero-filling", len);
                }
                RawPacket::from_partial(&buffer[..len])
                    .map(Some)
                    .map_err(|e| TransferError::Transfer(e.to_string()))
            }
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(map_rusb_error(e)),
        }
    }

    fn close(&mut self) -> Result<(), TransferError> {
        if !self.claimed {
            return Ok(());
        }

        self.claimed = false;
        self.handle
            .release_interface(self.interface)
            .map_err(map_rusb_error)?;
        debug!("Released interface {}", self.interface);
        Ok(())
    }
}

impl LoopbackTarget for IrReceiverDevice {
    fn write_with_timeout(
        &mut self,
        packet: &RawPacket,
        timeout: Duration,
    ) -> Result<(), TransferError> {
        let written = self
            .raw_write(packet.as_ref(), timeout)
            .map_err(map_rusb_error)?;

        if written != PACKET_SIZE {
            return Err(TransferError::ShortWrite {
                written,
                expected: PACKET_SIZE,
            });
        }
        Ok(())
    }
}

impl Drop for IrReceiverDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("Failed to release interface on drop: {}", e);
        }
    }
}

/// Find the first device matching the selector
fn find_device(
    context: &Context,
    selector: &DeviceSelector,
) -> Result<Option<Device<Context>>, OpenError> {
    let devices = context
        .devices()
        .map_err(|e| OpenError::BackendUnavailable(format!("Failed to list devices: {}", e)))?;

    for device in devices.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                debug!(
                    "Skipping device at bus {:03} address {:03}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };

        if selector.matches(desc.vendor_id(), desc.product_id()) {
            return Ok(Some(device));
        }
    }

    Ok(None)
}

/// Map rusb errors to transfer errors
pub fn map_rusb_error(err: rusb::Error) -> TransferError {
    match err {
        rusb::Error::NoDevice => TransferError::Disconnected,
        _ => TransferError::Transfer(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(
            map_rusb_error(rusb::Error::NoDevice),
            TransferError::Disconnected
        );
        assert!(matches!(
            map_rusb_error(rusb::Error::Pipe),
            TransferError::Transfer(_)
        ));
        assert!(matches!(
            map_rusb_error(rusb::Error::Io),
            TransferError::Transfer(_)
        ));
    }

    #[test]
    fn test_open_missing_device() {
        // No real device uses this pair; without USB access the backend error is expected
        let selector = DeviceSelector::new(0x0000, 0x0000);
        match IrReceiverDevice::open(&selector) {
            Err(OpenError::NotFound {
                vendor_id: 0x0000,
                product_id: 0x0000,
            })
            | Err(OpenError::BackendUnavailable(_)) => {}
            Ok(_) => panic!("unexpectedly opened a device with VID:PID 0000:0000"),
            Err(e) => panic!("expected NotFound or BackendUnavailable, got: {}", e),
        }
    }
}
