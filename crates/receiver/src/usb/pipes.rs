//! Interface and pipe discovery
//!
//! The receiver exposes one vendor-specific interface with a bulk OUT/IN
//! endpoint pair that share an endpoint number. The first endpoint of the
//! interface ("pipe 0") fixes that number; the write pipe is its OUT address
//! and the read pipe the matching IN address.

use rusb::{ConfigDescriptor, TransferType};

/// Interface class code for vendor-specific interfaces
pub const VENDOR_SPECIFIC_CLASS: u8 = 0xFF;

const DIRECTION_IN: u8 = 0x80;

/// Endpoint as seen in the configuration descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub address: u8,
    pub transfer_type: TransferType,
}

/// Interface (alternate setting 0) as seen in the configuration descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCandidate {
    pub number: u8,
    pub class_code: u8,
    pub endpoints: Vec<EndpointCandidate>,
}

impl InterfaceCandidate {
    /// Collect the default alternate setting of every interface
    pub fn from_config(config: &ConfigDescriptor) -> Vec<Self> {
        config
            .interfaces()
            .filter_map(|interface| {
                interface
                    .descriptors()
                    .find(|desc| desc.setting_number() == 0)
                    .map(|desc| InterfaceCandidate {
                        number: desc.interface_number(),
                        class_code: desc.class_code(),
                        endpoints: desc
                            .endpoint_descriptors()
                            .map(|ep| EndpointCandidate {
                                address: ep.address(),
                                transfer_type: ep.transfer_type(),
                            })
                            .collect(),
                    })
            })
            .collect()
    }

    fn endpoint(&self, address: u8) -> Option<&EndpointCandidate> {
        self.endpoints.iter().find(|ep| ep.address == address)
    }
}

/// Pick the interface to claim
///
/// An explicitly requested number wins. Otherwise the first vendor-specific
/// interface, then the first interface at all.
pub fn choose_interface(
    candidates: &[InterfaceCandidate],
    requested: Option<u8>,
) -> Option<&InterfaceCandidate> {
    match requested {
        Some(number) => candidates.iter().find(|c| c.number == number),
        None => candidates
            .iter()
            .find(|c| c.class_code == VENDOR_SPECIFIC_CLASS)
            .or_else(|| candidates.first()),
    }
}

/// How a pipe is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeKind {
    Bulk,
    Interrupt,
}

impl PipeKind {
    fn from_transfer_type(transfer_type: Option<TransferType>) -> Self {
        match transfer_type {
            Some(TransferType::Interrupt) => PipeKind::Interrupt,
            _ => PipeKind::Bulk,
        }
    }
}

/// Read and write pipes derived from pipe 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipes {
    pub write_pipe: u8,
    pub read_pipe: u8,
    pub write_kind: PipeKind,
    pub read_kind: PipeKind,
}

impl Pipes {
    /// Derive the pipe pair from an interface's first endpoint
    ///
    /// Returns `None` if the interface has no endpoints.
    pub fn discover(interface: &InterfaceCandidate) -> Option<Self> {
        let first = interface.endpoints.first()?;
        let write_pipe = first.address & !DIRECTION_IN;
        let read_pipe = write_pipe | DIRECTION_IN;

        Some(Self {
            write_pipe,
            read_pipe,
            write_kind: PipeKind::from_transfer_type(
                interface.endpoint(write_pipe).map(|ep| ep.transfer_type),
            ),
            read_kind: PipeKind::from_transfer_type(
                interface.endpoint(read_pipe).map(|ep| ep.transfer_type),
            ),
        })
    }
}
