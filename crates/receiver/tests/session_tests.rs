//! Integration tests for the receiver session and polling loop
//!
//! Runs the full open -> poll -> close path against a scripted fake source:
//! - Output lines and their order
//! - Startup failures
//! - Timeouts, transient errors and disconnects
//! - Cancellation from another thread
//! - Loopback self-test

use common::test_utils::{FakeScript, FakeSource, ir_packet, unknown_packet};
use common::{OpenError, ShutdownToken, TransferError};
use receiver::loopback::{LoopbackError, LoopbackSettings, probe_packet};
use receiver::{
    PollError, PollerSettings, SessionError, SessionMode, SessionOutcome, SessionSettings,
    run_session,
};
use std::thread;
use std::time::Duration;

const OPENED: &str = "Device opened, waiting for packets...";

fn fast_settings() -> SessionSettings {
    SessionSettings {
        poller: PollerSettings {
            read_timeout: Duration::from_millis(10),
            error_backoff: Duration::from_millis(1),
        },
        loopback: LoopbackSettings {
            read_timeout: Duration::from_millis(10),
            write_timeout: Duration::from_millis(10),
            deadline: Duration::from_millis(50),
        },
    }
}

fn run(
    script: &FakeScript,
    mode: SessionMode,
    token: ShutdownToken,
) -> (Result<SessionOutcome, SessionError>, Vec<String>) {
    let mut out = Vec::new();
    let result = run_session::<FakeSource, _>(script, mode, &fast_settings(), token, &mut out);
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    (result, lines)
}

mod polling {
    use super::*;

    #[test]
    fn test_prints_packets_in_read_order() {
        let token = ShutdownToken::new();
        let script = FakeScript::new()
            .packet(ir_packet(0x20, 0x15, false))
            .packet(ir_packet(0x20, 0x15, true))
            .packet(unknown_packet(0x01, &[0xFF]))
            .cancel_when_exhausted(token.clone());

        let (result, lines) = run(&script, SessionMode::Poll, token);

        let SessionOutcome::Polled(stats) = result.unwrap() else {
            panic!("expected polling outcome");
        };
        assert_eq!(stats.ir_events, 2);
        assert_eq!(stats.unknown, 1);

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], OPENED);
        assert_eq!(
            lines[1],
            "Got IR signal: address: 0x20, command: 0x15, repeating: false"
        );
        assert_eq!(
            lines[2],
            "Got IR signal: address: 0x20, command: 0x15, repeating: true"
        );
        assert!(lines[3].starts_with("Got unknown packet: [01, FF, 00"));
    }

    #[test]
    fn test_timeouts_print_nothing() {
        let token = ShutdownToken::new();
        let script = FakeScript::new()
            .timeout()
            .timeout()
            .packet(ir_packet(0x01, 0x02, false))
            .timeout()
            .cancel_when_exhausted(token.clone());

        let (result, lines) = run(&script, SessionMode::Poll, token);

        let SessionOutcome::Polled(stats) = result.unwrap() else {
            panic!("expected polling outcome");
        };
        assert_eq!(stats.timeouts, 4);
        assert_eq!(
            lines,
            vec![
                OPENED.to_string(),
                "Got IR signal: address: 0x01, command: 0x02, repeating: false".to_string(),
            ]
        );
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let token = ShutdownToken::new();
        let script = FakeScript::new()
            .error(TransferError::Transfer("Pipe error".to_string()))
            .packet(ir_packet(0x10, 0x11, false))
            .cancel_when_exhausted(token.clone());

        let (result, lines) = run(&script, SessionMode::Poll, token);

        let SessionOutcome::Polled(stats) = result.unwrap() else {
            panic!("expected polling outcome");
        };
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.ir_events, 1);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_disconnect_stops_polling() {
        let script = FakeScript::new()
            .packet(ir_packet(0x10, 0x11, false))
            .error(TransferError::Disconnected)
            .packet(ir_packet(0x99, 0x99, false));
        let log = script.log();

        let (result, lines) = run(&script, SessionMode::Poll, ShutdownToken::new());

        assert!(matches!(
            result,
            Err(SessionError::Poll(PollError::Disconnected))
        ));
        assert_eq!(lines.len(), 2);
        let log = log.lock().unwrap();
        assert_eq!(log.reads, 2);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn test_source_closed_once_on_cancel() {
        let token = ShutdownToken::new();
        let script = FakeScript::new()
            .packet(ir_packet(0x10, 0x11, false))
            .cancel_when_exhausted(token.clone());
        let log = script.log();

        let (result, _) = run(&script, SessionMode::Poll, token);

        assert!(result.is_ok());
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let token = ShutdownToken::new();
        let remote = token.clone();

        // An empty script without auto-cancel keeps returning "no data" forever
        let script = FakeScript::new().realtime_timeouts();
        let log = script.log();

        let handle = thread::spawn(move || run(&script, SessionMode::Poll, token));
        thread::sleep(Duration::from_millis(20));
        remote.cancel();

        let (result, lines) = handle.join().unwrap();
        assert!(result.is_ok());
        assert_eq!(lines, vec![OPENED.to_string()]);
        assert_eq!(log.lock().unwrap().closes, 1);
    }
}

mod startup {
    use super::*;

    fn assert_open_error(error: OpenError) {
        let script = FakeScript::new().failing_open(error.clone());
        let (result, lines) = run(&script, SessionMode::Poll, ShutdownToken::new());

        match result {
            Err(SessionError::Open(e)) => assert_eq!(e, error),
            other => panic!("expected open error, got {:?}", other),
        }
        assert!(lines.is_empty());
    }

    #[test]
    fn test_backend_unavailable() {
        assert_open_error(OpenError::BackendUnavailable("not supported".to_string()));
    }

    #[test]
    fn test_no_matching_device() {
        assert_open_error(OpenError::NotFound {
            vendor_id: 0xF055,
            product_id: 0xB195,
        });
    }

    #[test]
    fn test_open_failed() {
        assert_open_error(OpenError::OpenFailed("Access denied".to_string()));
    }

    #[test]
    fn test_open_error_messages_reach_the_user() {
        let error = SessionError::Open(OpenError::NotFound {
            vendor_id: 0xF055,
            product_id: 0xB195,
        });
        assert_eq!(error.to_string(), "No matching device found (f055:b195)");
    }
}

mod loopback {
    use super::*;

    #[test]
    fn test_echo_succeeds() {
        let script = FakeScript::new().echo_writes();
        let log = script.log();

        let (result, lines) = run(&script, SessionMode::Loopback, ShutdownToken::new());

        assert!(matches!(result, Ok(SessionOutcome::Loopback(_))));
        assert!(lines.last().unwrap().starts_with("Loopback OK ("));
        let log = log.lock().unwrap();
        assert_eq!(log.written, vec![probe_packet(0)]);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn test_ir_events_printed_while_waiting() {
        let script = FakeScript::new()
            .packet(ir_packet(0x07, 0x08, true))
            .echo_writes();

        let (result, lines) = run(&script, SessionMode::Loopback, ShutdownToken::new());

        let Ok(SessionOutcome::Loopback(report)) = result else {
            panic!("expected loopback outcome");
        };
        assert_eq!(report.other_packets, 1);
        assert!(lines.contains(
            &"Got IR signal: address: 0x07, command: 0x08, repeating: true".to_string()
        ));
    }

    #[test]
    fn test_missing_echo_times_out() {
        let script = FakeScript::new().realtime_timeouts();
        let log = script.log();

        let (result, _) = run(&script, SessionMode::Loopback, ShutdownToken::new());

        assert!(matches!(
            result,
            Err(SessionError::Loopback(LoopbackError::NoEcho(_)))
        ));
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_read_failure_aborts() {
        let script = FakeScript::new().error(TransferError::Disconnected);

        let (result, _) = run(&script, SessionMode::Loopback, ShutdownToken::new());

        assert!(matches!(
            result,
            Err(SessionError::Loopback(LoopbackError::Read(
                TransferError::Disconnected
            )))
        ));
    }
}
