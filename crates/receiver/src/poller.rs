//! Cancellable polling loop
//!
//! Reads one packet at a time from a [`PacketSource`], classifies it and
//! writes the rendered line to an output sink. Timeouts produce no output and
//! no delay; the read timeout alone paces the loop. The loop stops when the
//! [`ShutdownToken`] is cancelled or the device disconnects.

use common::{PacketSource, ShutdownToken, TransferError};
use protocol::{Classified, IR_EVENT_TAG, REPEAT_FLAG, REPEAT_OFFSET, RawPacket, classify};
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Timing for the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Timeout of each read
    pub read_timeout: Duration,
    /// Pause after a failed read before trying again
    pub error_backoff: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            error_backoff: Duration::from_millis(100),
        }
    }
}

/// Counters collected over one polling session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Packets received (IR events and unknown)
    pub packets: u64,
    pub ir_events: u64,
    pub unknown: u64,
    /// Reads that returned no data
    pub timeouts: u64,
    /// Reads that failed and were retried
    pub errors: u64,
}

impl PollStats {
    fn record(&mut self, classified: &Classified) {
        match classified {
            Classified::NoData => self.timeouts += 1,
            Classified::IrEvent(_) => {
                self.packets += 1;
                self.ir_events += 1;
            }
            Classified::Unknown(_) => {
                self.packets += 1;
                self.unknown += 1;
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    /// The device went away while polling
    #[error("Device disconnected while polling")]
    Disconnected,

    /// Writing to the output sink failed
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Polling loop over one opened source
pub struct Poller<S: PacketSource> {
    source: S,
    settings: PollerSettings,
    token: ShutdownToken,
}

impl<S: PacketSource> Poller<S> {
    pub fn new(source: S, settings: PollerSettings, token: ShutdownToken) -> Self {
        Self {
            source,
            settings,
            token,
        }
    }

    /// Run until cancelled or the device disconnects
    ///
    /// The source is closed exactly once before returning, whatever the
    /// outcome.
    pub fn run<W: Write>(mut self, out: &mut W) -> Result<PollStats, PollError> {
        info!("Polling started");

        let mut stats = PollStats::default();
        let result = self.poll_until_cancelled(out, &mut stats);

        if let Err(e) = self.source.close() {
            warn!("Failed to close packet source: {}", e);
        }

        info!(
            "Polling stopped: {} packets ({} IR, {} unknown), {} timeouts, {} errors",
            stats.packets, stats.ir_events, stats.unknown, stats.timeouts, stats.errors
        );

        result.map(|()| stats)
    }

    fn poll_until_cancelled<W: Write>(
        &mut self,
        out: &mut W,
        stats: &mut PollStats,
    ) -> Result<(), PollError> {
        while !self.token.is_cancelled() {
            match self.source.read_with_timeout(self.settings.read_timeout) {
                Ok(packet) => {
                    if let Some(packet) = &packet {
                        trace!("Read packet: {}", packet);
                        note_unusual_repeat_flag(packet);
                    }

                    let classified = classify(packet.as_ref());
                    stats.record(&classified);

                    if let Some(line) = classified.render() {
                        writeln!(out, "{}", line)?;
                        out.flush()?;
                    }
                }
                Err(TransferError::Disconnected) => {
                    error!("Device disconnected");
                    return Err(PollError::Disconnected);
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!("Read failed: {}, retrying", e);
                    std::thread::sleep(self.settings.error_backoff);
                }
            }
        }

        debug!("Shutdown requested");
        Ok(())
    }
}

/// The repeat flag collapses to a boolean; log values that are lost that way.
fn note_unusual_repeat_flag(packet: &RawPacket) {
    let flag = packet.as_bytes()[REPEAT_OFFSET];
    if packet.tag() == IR_EVENT_TAG && flag != 0 && flag != REPEAT_FLAG {
        debug!("Repeat flag {:#04x} treated as not repeating", flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{FakeScript, FakeSource, ir_packet, unknown_packet};

    fn run_script(
        script: FakeScript,
        token: ShutdownToken,
    ) -> (Result<PollStats, PollError>, String) {
        let source = FakeSource::open(&script).unwrap();
        let poller = Poller::new(source, PollerSettings::default(), token);
        let mut out = Vec::new();
        let result = poller.run(&mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_cancelled_before_start_reads_nothing() {
        let token = ShutdownToken::new();
        token.cancel();
        let script = FakeScript::new().packet(ir_packet(1, 2, false));
        let log = script.log();

        let (result, out) = run_script(script, token);

        assert_eq!(result.unwrap(), PollStats::default());
        assert!(out.is_empty());
        assert_eq!(log.lock().unwrap().reads, 0);
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_stats_count_each_outcome() {
        let token = ShutdownToken::new();
        let script = FakeScript::new()
            .packet(ir_packet(0x20, 0x15, true))
            .timeout()
            .packet(unknown_packet(0x01, &[0xFF]))
            .cancel_when_exhausted(token.clone());

        let (result, _) = run_script(script, token);
        let stats = result.unwrap();

        assert_eq!(stats.packets, 2);
        assert_eq!(stats.ir_events, 1);
        assert_eq!(stats.unknown, 1);
        // the scripted timeout plus the read that exhausted the script
        assert_eq!(stats.timeouts, 2);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_uses_configured_read_timeout() {
        let token = ShutdownToken::new();
        let script = FakeScript::new().cancel_when_exhausted(token.clone());
        let log = script.log();
        let settings = PollerSettings {
            read_timeout: Duration::from_millis(250),
            error_backoff: Duration::ZERO,
        };

        let source = FakeSource::open(&script).unwrap();
        Poller::new(source, settings, token)
            .run(&mut io::sink())
            .unwrap();

        assert_eq!(
            log.lock().unwrap().read_timeouts,
            vec![Duration::from_millis(250)]
        );
    }
}
