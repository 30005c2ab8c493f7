//! Test utilities for the IR USB receiver
//!
//! Provides a scripted [`FakeSource`] that implements [`PacketSource`] without
//! any hardware, plus helpers for building packets.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{FakeScript, FakeSource, ir_packet};
//! use common::PacketSource;
//! use std::time::Duration;
//!
//! let script = FakeScript::new().packet(ir_packet(0x20, 0x15, true)).timeout();
//! let mut source = FakeSource::open(&script).unwrap();
//!
//! let first = source.read_with_timeout(Duration::from_millis(100)).unwrap();
//! assert_eq!(first, Some(ir_packet(0x20, 0x15, true)));
//! assert_eq!(source.read_with_timeout(Duration::from_millis(100)).unwrap(), None);
//! ```

use crate::error::{OpenError, TransferError};
use crate::shutdown::ShutdownToken;
use crate::source::{LoopbackTarget, PacketSource};
use protocol::{IrEvent, RawPacket};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Build an IR event packet in the firmware's layout
///
/// # Example
/// ```
/// use common::test_utils::ir_packet;
///
/// let packet = ir_packet(0x20, 0x15, false);
/// assert_eq!(&packet.as_bytes()[..4], &[0x00, 0x20, 0x15, 0x00]);
/// ```
pub fn ir_packet(address: u8, command: u8, repeating: bool) -> RawPacket {
    IrEvent {
        address,
        command,
        repeating,
    }
    .to_packet()
}

/// Build a packet with a non-zero tag followed by `payload`
pub fn unknown_packet(tag: u8, payload: &[u8]) -> RawPacket {
    let mut bytes = [0u8; protocol::PACKET_SIZE];
    bytes[0] = tag;
    let len = payload.len().min(protocol::PACKET_SIZE - 1);
    bytes[1..=len].copy_from_slice(&payload[..len]);
    RawPacket::new(bytes)
}

/// One scripted read outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeRead {
    Packet(RawPacket),
    Timeout,
    Error(TransferError),
}

/// What happened to a fake source, shared with the test
#[derive(Debug, Default)]
pub struct FakeLog {
    /// Number of `read_with_timeout` calls
    pub reads: usize,
    /// Number of `close` calls
    pub closes: usize,
    /// Packets written through `write_with_timeout`
    pub written: Vec<RawPacket>,
    /// Timeouts passed to each read
    pub read_timeouts: Vec<Duration>,
}

/// Script for a [`FakeSource`], used as its selector
#[derive(Debug, Clone, Default)]
pub struct FakeScript {
    reads: VecDeque<FakeRead>,
    open_error: Option<OpenError>,
    cancel_when_exhausted: Option<ShutdownToken>,
    echo_writes: bool,
    realtime: bool,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packet(mut self, packet: RawPacket) -> Self {
        self.reads.push_back(FakeRead::Packet(packet));
        self
    }

    pub fn timeout(mut self) -> Self {
        self.reads.push_back(FakeRead::Timeout);
        self
    }

    pub fn error(mut self, error: TransferError) -> Self {
        self.reads.push_back(FakeRead::Error(error));
        self
    }

    /// Make `open` fail with `error`
    pub fn failing_open(mut self, error: OpenError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Cancel `token` once every scripted read has been consumed
    pub fn cancel_when_exhausted(mut self, token: ShutdownToken) -> Self {
        self.cancel_when_exhausted = Some(token);
        self
    }

    /// Queue every written packet as a future read, like the firmware echo
    pub fn echo_writes(mut self) -> Self {
        self.echo_writes = true;
        self
    }

    /// Make reads that return no data block for the full timeout
    pub fn realtime_timeouts(mut self) -> Self {
        self.realtime = true;
        self
    }

    /// Handle to the shared log, valid after the source is consumed
    pub fn log(&self) -> Arc<Mutex<FakeLog>> {
        Arc::clone(&self.log)
    }
}

/// Scripted packet source
#[derive(Debug)]
pub struct FakeSource {
    reads: VecDeque<FakeRead>,
    cancel_when_exhausted: Option<ShutdownToken>,
    echo_writes: bool,
    realtime: bool,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeSource {
    fn log(&self) -> MutexGuard<'_, FakeLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait(&self, timeout: Duration) {
        if self.realtime {
            std::thread::sleep(timeout);
        }
    }
}

impl PacketSource for FakeSource {
    type Selector = FakeScript;

    fn open(script: &FakeScript) -> Result<Self, OpenError> {
        if let Some(error) = &script.open_error {
            return Err(error.clone());
        }

        Ok(Self {
            reads: script.reads.clone(),
            cancel_when_exhausted: script.cancel_when_exhausted.clone(),
            echo_writes: script.echo_writes,
            realtime: script.realtime,
            log: Arc::clone(&script.log),
        })
    }

    fn read_with_timeout(&mut self, timeout: Duration) -> Result<Option<RawPacket>, TransferError> {
        {
            let mut log = self.log();
            log.reads += 1;
            log.read_timeouts.push(timeout);
        }

        match self.reads.pop_front() {
            Some(FakeRead::Packet(packet)) => Ok(Some(packet)),
            Some(FakeRead::Error(error)) => Err(error),
            Some(FakeRead::Timeout) => {
                self.wait(timeout);
                Ok(None)
            }
            None => {
                if let Some(token) = &self.cancel_when_exhausted {
                    token.cancel();
                }
                self.wait(timeout);
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<(), TransferError> {
        self.log().closes += 1;
        Ok(())
    }
}

impl LoopbackTarget for FakeSource {
    fn write_with_timeout(
        &mut self,
        packet: &RawPacket,
        _timeout: Duration,
    ) -> Result<(), TransferError> {
        self.log().written.push(*packet);
        if self.echo_writes {
            self.reads.push_back(FakeRead::Packet(*packet));
        }
        Ok(())
    }
}
