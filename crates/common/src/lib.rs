//! Common utilities for the IR USB receiver
//!
//! This crate provides the pieces shared between the receiver binary and its
//! tests: logging setup, error types, the cooperative shutdown signal, and the
//! [`PacketSource`] capability that hides the USB device behind `open`,
//! `read_with_timeout` and `close`.

pub mod error;
pub mod logging;
pub mod shutdown;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Error, OpenError, Result, TransferError};
pub use logging::setup_logging;
pub use shutdown::ShutdownToken;
pub use source::{DeviceSelector, LoopbackTarget, PacketSource};
