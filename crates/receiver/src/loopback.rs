//! Loopback self-test
//!
//! The receiver firmware echoes every packet written to its OUT endpoint back
//! on the IN endpoint. Writing a probe and waiting for the identical bytes to
//! come back checks both pipes end to end.

use common::{LoopbackTarget, TransferError};
use protocol::{PACKET_SIZE, RawPacket, classify};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Tag byte of loopback probes, chosen so the echo classifies as unknown
pub const PROBE_TAG: u8 = 0xEC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackSettings {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Total time to wait for the echo
    pub deadline: Duration,
}

impl Default for LoopbackSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_millis(100),
            deadline: Duration::from_secs(1),
        }
    }
}

/// Result of a successful loopback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackReport {
    pub round_trip: Duration,
    /// Non-probe packets that arrived while waiting
    pub other_packets: u64,
}

#[derive(Debug, Error)]
pub enum LoopbackError {
    #[error("Failed to write probe: {0}")]
    Write(TransferError),

    #[error("Failed to read echo: {0}")]
    Read(TransferError),

    #[error("No echo received within {0:?}")]
    NoEcho(Duration),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Build the probe packet for sequence number `seq`
///
/// Bytes after the tag count up from `seq`, so a stale echo from an earlier
/// run never matches.
pub fn probe_packet(seq: u8) -> RawPacket {
    let mut bytes = [0u8; PACKET_SIZE];
    bytes[0] = PROBE_TAG;
    for (i, byte) in bytes.iter_mut().enumerate().skip(1) {
        *byte = seq.wrapping_add(i as u8);
    }
    RawPacket::new(bytes)
}

/// Write a probe and wait for its echo
///
/// Packets other than the echo are rendered to `out` as usual.
pub fn run_loopback<S: LoopbackTarget, W: Write>(
    source: &mut S,
    seq: u8,
    settings: &LoopbackSettings,
    out: &mut W,
) -> Result<LoopbackReport, LoopbackError> {
    let probe = probe_packet(seq);
    let started = Instant::now();

    source
        .write_with_timeout(&probe, settings.write_timeout)
        .map_err(LoopbackError::Write)?;
    debug!("Loopback probe {} written", seq);

    let mut other_packets = 0;
    loop {
        if started.elapsed() >= settings.deadline {
            return Err(LoopbackError::NoEcho(settings.deadline));
        }

        let packet = source
            .read_with_timeout(settings.read_timeout)
            .map_err(LoopbackError::Read)?;

        if packet == Some(probe) {
            let round_trip = started.elapsed();
            info!("Loopback echo received after {:?}", round_trip);
            return Ok(LoopbackReport {
                round_trip,
                other_packets,
            });
        }

        let classified = classify(packet.as_ref());
        if !classified.is_no_data() {
            other_packets += 1;
        }
        if let Some(line) = classified.render() {
            writeln!(out, "{}", line)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PacketSource;
    use common::test_utils::{FakeScript, FakeSource, ir_packet};
    use protocol::Classified;

    #[test]
    fn test_probe_layout() {
        let probe = probe_packet(0);
        assert_eq!(probe.tag(), PROBE_TAG);
        assert_eq!(probe.as_bytes()[1], 1);
        assert_eq!(probe.as_bytes()[63], 63);
    }

    #[test]
    fn test_probe_differs_per_sequence() {
        assert_ne!(probe_packet(0), probe_packet(1));
        assert_eq!(probe_packet(7), probe_packet(7));
    }

    #[test]
    fn test_probe_classifies_as_unknown() {
        assert!(matches!(
            classify(Some(&probe_packet(3))),
            Classified::Unknown(_)
        ));
    }

    #[test]
    fn test_timeouts_are_not_counted_as_other_packets() {
        let script = FakeScript::new()
            .timeout()
            .packet(ir_packet(0x01, 0x02, false))
            .timeout()
            .echo_writes();
        let mut source = FakeSource::open(&script).unwrap();
        let settings = LoopbackSettings {
            read_timeout: Duration::from_millis(10),
            write_timeout: Duration::from_millis(10),
            deadline: Duration::from_secs(5),
        };
        let mut out = Vec::new();

        let report = run_loopback(&mut source, 3, &settings, &mut out).unwrap();

        assert_eq!(report.other_packets, 1);
        assert_eq!(script.log().lock().unwrap().reads, 4);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Got IR signal: address: 0x01, command: 0x02, repeating: false\n"
        );
    }
}

