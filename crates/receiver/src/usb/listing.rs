//! Device listing for `--list-devices`

use common::{DeviceSelector, OpenError};
use rusb::{Context, UsbContext};
use std::fmt;
use tracing::debug;

/// One enumerated USB device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSummary {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Whether the device matches the configured selector
    pub selected: bool,
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus {:03} Device {:03}: ID {:04x}:{:04x}",
            self.bus_number, self.address, self.vendor_id, self.product_id
        )?;
        if self.selected {
            f.write_str(" *")?;
        }
        Ok(())
    }
}

/// Enumerate all USB devices, marking those that match `selector`
pub fn list_devices(selector: &DeviceSelector) -> Result<Vec<DeviceSummary>, OpenError> {
    let context = Context::new().map_err(|e| OpenError::BackendUnavailable(e.to_string()))?;
    let devices = context
        .devices()
        .map_err(|e| OpenError::BackendUnavailable(format!("Failed to list devices: {}", e)))?;

    let mut summaries = Vec::with_capacity(devices.len());
    for device in devices.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                debug!("Skipping device without descriptor: {}", e);
                continue;
            }
        };

        summaries.push(DeviceSummary {
            bus_number: device.bus_number(),
            address: device.address(),
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            selected: selector.matches(desc.vendor_id(), desc.product_id()),
        });
    }

    Ok(summaries)
}
