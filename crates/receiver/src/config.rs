//! Receiver configuration management

use crate::loopback::LoopbackSettings;
use crate::poller::PollerSettings;
use anyhow::{Context, Result, anyhow};
use common::DeviceSelector;
use common::source::{DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub receiver: ReceiverSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub polling: PollingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "ReceiverSettings::default_log_level")]
    pub log_level: String,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl ReceiverSettings {
    fn default_log_level() -> String {
        "warn".to_string() // keep stdout/stderr quiet apart from packet lines
    }
}

/// Which device to open
///
/// # Example Configuration
/// ```toml
/// [device]
/// vendor_id = "0xF055"
/// product_id = "0xB195"
/// interface = 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// USB Vendor ID in `0x` hex form
    #[serde(default = "DeviceSettings::default_vendor_id")]
    pub vendor_id: String,
    /// USB Product ID in `0x` hex form
    #[serde(default = "DeviceSettings::default_product_id")]
    pub product_id: String,
    /// Interface number; the vendor interface is auto-detected if unset
    #[serde(default)]
    pub interface: Option<u8>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
            interface: None,
        }
    }
}

impl DeviceSettings {
    fn default_vendor_id() -> String {
        format!("0x{:04X}", DEFAULT_VENDOR_ID)
    }

    fn default_product_id() -> String {
        format!("0x{:04X}", DEFAULT_PRODUCT_ID)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Timeout of a single read in milliseconds
    #[serde(default = "PollingSettings::default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Pause after a failed read in milliseconds
    #[serde(default = "PollingSettings::default_error_backoff")]
    pub error_backoff_ms: u64,
    /// How long the loopback self-test waits for its echo
    #[serde(default = "PollingSettings::default_loopback_timeout")]
    pub loopback_timeout_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            read_timeout_ms: Self::default_read_timeout(),
            error_backoff_ms: Self::default_error_backoff(),
            loopback_timeout_ms: Self::default_loopback_timeout(),
        }
    }
}

impl PollingSettings {
    fn default_read_timeout() -> u64 {
        100
    }

    fn default_error_backoff() -> u64 {
        100
    }

    fn default_loopback_timeout() -> u64 {
        1000
    }
}

/// Values given on the command line, applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub interface: Option<u8>,
    pub read_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl ReceiverConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file()
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?,
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ReceiverConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a user-supplied path, expanding `~`
    pub fn load_from(path: &str) -> Result<Self> {
        let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
        Self::load(Some(path_buf))
    }

    /// Load the first configuration file found, or defaults if there is none
    ///
    /// A file that exists but cannot be read, parsed or validated is an error.
    pub fn load_or_default() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load(Some(path)),
            None => Ok(Self::default()),
        }
    }

    /// Standard locations searched when no path is given
    fn search_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/ir-usb-receiver/receiver.toml"),
        ]
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.exists())
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("ir-usb-receiver").join("receiver.toml")
        } else {
            PathBuf::from(".config/ir-usb-receiver/receiver.toml")
        }
    }

    /// Apply command line overrides, then re-validate
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Some(vid) = &overrides.vendor_id {
            self.device.vendor_id = vid.clone();
        }
        if let Some(pid) = &overrides.product_id {
            self.device.product_id = pid.clone();
        }
        if let Some(interface) = overrides.interface {
            self.device.interface = Some(interface);
        }
        if let Some(timeout) = overrides.read_timeout_ms {
            self.polling.read_timeout_ms = timeout;
        }
        if let Some(level) = &overrides.log_level {
            self.receiver.log_level = level.clone();
        }

        self.validate()
    }

    /// Device selector described by this configuration
    pub fn selector(&self) -> Result<DeviceSelector> {
        let vendor_id = Self::parse_hex_id(&self.device.vendor_id, "VID")?;
        let product_id = Self::parse_hex_id(&self.device.product_id, "PID")?;

        let selector = DeviceSelector::new(vendor_id, product_id);
        Ok(match self.device.interface {
            Some(interface) => selector.with_interface(interface),
            None => selector,
        })
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            read_timeout: Duration::from_millis(self.polling.read_timeout_ms),
            error_backoff: Duration::from_millis(self.polling.error_backoff_ms),
        }
    }

    pub fn loopback_settings(&self) -> LoopbackSettings {
        LoopbackSettings {
            read_timeout: Duration::from_millis(self.polling.read_timeout_ms),
            write_timeout: Duration::from_millis(self.polling.read_timeout_ms),
            deadline: Duration::from_millis(self.polling.loopback_timeout_ms),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.receiver.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.receiver.log_level,
                valid_levels.join(", ")
            ));
        }

        Self::parse_hex_id(&self.device.vendor_id, "VID")?;
        Self::parse_hex_id(&self.device.product_id, "PID")?;

        if self.polling.read_timeout_ms == 0 {
            return Err(anyhow!("read_timeout_ms must be greater than 0"));
        }
        if self.polling.loopback_timeout_ms == 0 {
            return Err(anyhow!("loopback_timeout_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Parse a hex ID (VID or PID) of the form `0x1234`
    fn parse_hex_id(id: &str, name: &str) -> Result<u16> {
        let hex_part = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .ok_or_else(|| {
                anyhow!(
                    "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                    name,
                    id
                )
            })?;

        if hex_part.is_empty() || hex_part.len() > 4 {
            return Err(anyhow!(
                "Invalid {} '{}', hex part must be 1-4 digits",
                name,
                id
            ));
        }

        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow!("Invalid {} '{}', not a valid hex number", name, id));
        }

        u16::from_str_radix(hex_part, 16)
            .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))
    }
}
