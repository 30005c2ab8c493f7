//! One receiver session: open the source, then poll or run the loopback test

use crate::loopback::{LoopbackError, LoopbackReport, LoopbackSettings, run_loopback};
use crate::poller::{PollError, PollStats, Poller, PollerSettings};
use common::{LoopbackTarget, OpenError, ShutdownToken};
use std::io::{self, Write};
use thiserror::Error;
use tracing::warn;

/// What the session does once the device is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Print packets until cancelled
    Poll,
    /// Send one probe and wait for the echo
    Loopback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub poller: PollerSettings,
    pub loopback: LoopbackSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Polled(PollStats),
    Loopback(LoopbackReport),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Fatal at startup; the message is shown as is
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("Loopback test failed: {0}")]
    Loopback(#[from] LoopbackError),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Open a source of type `S` and run `mode` against it
///
/// Blocks until the mode finishes; meant to run off the async runtime.
pub fn run_session<S, W>(
    selector: &S::Selector,
    mode: SessionMode,
    settings: &SessionSettings,
    token: ShutdownToken,
    out: &mut W,
) -> Result<SessionOutcome, SessionError>
where
    S: LoopbackTarget,
    W: Write,
{
    let mut source = S::open(selector)?;

    match mode {
        SessionMode::Poll => {
            writeln!(out, "Device opened, waiting for packets...")?;
            out.flush()?;

            let stats = Poller::new(source, settings.poller, token).run(out)?;
            Ok(SessionOutcome::Polled(stats))
        }
        SessionMode::Loopback => {
            writeln!(out, "Device opened, running loopback test...")?;

            let result = run_loopback(&mut source, 0, &settings.loopback, out);
            if let Err(e) = source.close() {
                warn!("Failed to close packet source: {}", e);
            }

            let report = result?;
            writeln!(out, "Loopback OK ({} ms)", report.round_trip.as_millis())?;
            Ok(SessionOutcome::Loopback(report))
        }
    }
}
