//! IR USB Receiver
//!
//! Opens the USB IR receiver, waits for packets and prints every decoded IR
//! signal. Runs until Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use common::{DeviceSelector, ShutdownToken, setup_logging};
use receiver::config::{ConfigOverrides, ReceiverConfig};
use receiver::usb::{IrReceiverDevice, list_devices};
use receiver::{SessionError, SessionMode, SessionOutcome, SessionSettings, run_session};
use std::io;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ir-usb-receiver")]
#[command(author, version, about = "Print IR remote signals received by the USB IR receiver")]
#[command(long_about = "
Reads packets from the RP2040 USB IR receiver and prints every decoded
IR signal as address, command and repeat flag.

EXAMPLES:
    # Listen on the default device (F055:B195)
    ir-usb-receiver

    # Use a different VID/PID
    ir-usb-receiver --vid 0x1234 --pid 0x5678

    # Check that both pipes work using the firmware echo
    ir-usb-receiver --loopback

    # List USB devices and exit
    ir-usb-receiver --list-devices

CONFIGURATION:
    The receiver looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/ir-usb-receiver/receiver.toml
    3. /etc/ir-usb-receiver/receiver.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// USB Vendor ID (e.g. 0xF055)
    #[arg(long, value_name = "HEX")]
    vid: Option<String>,

    /// USB Product ID (e.g. 0xB195)
    #[arg(long, value_name = "HEX")]
    pid: Option<String>,

    /// Interface number to claim instead of auto-detecting
    #[arg(long, value_name = "N")]
    interface: Option<u8>,

    /// Read timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write a probe packet and wait for the firmware echo, then exit
    #[arg(long)]
    loopback: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            vendor_id: self.vid.clone(),
            product_id: self.pid.clone(),
            interface: self.interface,
            read_timeout_ms: self.timeout_ms,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.save_config {
        let config = ReceiverConfig::default();
        let path = ReceiverConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match args.config.as_deref() {
        Some(path) => ReceiverConfig::load_from(path).context("Failed to load configuration")?,
        None => ReceiverConfig::load_or_default().context("Failed to load configuration")?,
    };
    config
        .apply_overrides(&args.overrides())
        .context("Invalid command line option")?;

    setup_logging(&config.receiver.log_level).context("Failed to setup logging")?;

    info!("IR USB Receiver v{}", env!("CARGO_PKG_VERSION"));

    let selector = config.selector()?;

    if args.list_devices {
        return list_devices_mode(selector).await;
    }

    let mode = if args.loopback {
        SessionMode::Loopback
    } else {
        SessionMode::Poll
    };
    let settings = SessionSettings {
        poller: config.poller_settings(),
        loopback: config.loopback_settings(),
    };

    run(selector, mode, settings).await
}

/// Run a session on a blocking thread until it ends or Ctrl+C
async fn run(
    selector: DeviceSelector,
    mode: SessionMode,
    settings: SessionSettings,
) -> Result<ExitCode> {
    let token = ShutdownToken::new();
    let session_token = token.clone();

    let mut session = tokio::task::spawn_blocking(move || {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        run_session::<IrReceiverDevice, _>(&selector, mode, &settings, session_token, &mut out)
    });

    let result = tokio::select! {
        result = &mut session => result,
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => error!("Error waiting for Ctrl+C: {}", e),
            }
            token.cancel();
            session.await
        }
    }
    .context("Receiver thread panicked")?;

    match result {
        Ok(SessionOutcome::Polled(stats)) => {
            info!(
                "Received {} IR signals and {} unknown packets",
                stats.ir_events, stats.unknown
            );
            Ok(ExitCode::SUCCESS)
        }
        Ok(SessionOutcome::Loopback(report)) => {
            info!("Loopback round trip: {:?}", report.round_trip);
            Ok(ExitCode::SUCCESS)
        }
        Err(SessionError::Open(e)) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// List USB devices and exit
async fn list_devices_mode(selector: DeviceSelector) -> Result<ExitCode> {
    info!("Listing USB devices...");

    let devices = tokio::task::spawn_blocking(move || list_devices(&selector))
        .await
        .context("Device listing panicked")?;

    let devices = match devices {
        Ok(devices) => devices,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if devices.is_empty() {
        println!("No USB devices found.");
    } else {
        println!("Found {} USB device(s):\n", devices.len());
        for device in devices {
            println!("  {}", device);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["ir-usb-receiver"]);
        assert!(!args.list_devices);
        assert!(!args.loopback);
        assert!(args.vid.is_none());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "ir-usb-receiver",
            "--vid",
            "0x1234",
            "--pid",
            "0x5678",
            "--interface",
            "1",
            "--timeout-ms",
            "250",
        ]);
        let overrides = args.overrides();
        assert_eq!(overrides.vendor_id.as_deref(), Some("0x1234"));
        assert_eq!(overrides.product_id.as_deref(), Some("0x5678"));
        assert_eq!(overrides.interface, Some(1));
        assert_eq!(overrides.read_timeout_ms, Some(250));
    }
}
