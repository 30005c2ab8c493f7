//! IR USB receiver
//!
//! Host side of an RP2040 USB IR receiver. The device decodes remote control
//! frames itself; this crate opens it over USB, reads its 64-byte packets and
//! prints each decoded IR signal.

pub mod config;
pub mod loopback;
pub mod poller;
pub mod session;
pub mod usb;

pub use config::{ConfigOverrides, ReceiverConfig};
pub use poller::{PollError, PollStats, Poller, PollerSettings};
pub use session::{SessionError, SessionMode, SessionOutcome, SessionSettings, run_session};
