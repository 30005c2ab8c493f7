//! Common error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while opening a packet source
///
/// Each variant is fatal at startup and maps to a distinct message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenError {
    /// The USB backend (libusb) could not be initialized
    #[error("libusb is unavailable: {0}")]
    BackendUnavailable(String),

    /// No attached device matches the selector
    #[error("No matching device found ({vendor_id:04x}:{product_id:04x})")]
    NotFound { vendor_id: u16, product_id: u16 },

    /// A matching device exists but could not be opened or claimed
    #[error("Unable to open device: {0}")]
    OpenFailed(String),
}

/// Failures during a single transfer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    /// The device went away
    #[error("Device disconnected")]
    Disconnected,

    /// Any other transfer failure, usually transient
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// The device accepted fewer bytes than were written
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}
