//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The configuration is built once at start-up and then handed by reference to
//! every component that needs it. Nothing reads it through a global.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{BaseStationError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub udp: UdpConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which transport carries frames to the rover
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// XBee radio on a serial port
    Serial,
    /// UDP to a local rover simulator
    Udp,
}

/// Which wire format controller data is sent in
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Fixed 10-byte bit-packed frame
    Legacy,
    /// 15-byte header + JSON payload
    Extensible,
}

/// Radio link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_link_mode")]
    pub mode: LinkMode,

    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_fallback_baud_rate")]
    pub fallback_baud_rate: u32,

    #[serde(default = "default_remote_address")]
    pub remote_address: String,

    #[serde(default = "default_codec")]
    pub codec: CodecKind,
}

/// UDP simulation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UdpConfig {
    #[serde(default = "default_udp_host")]
    pub host: String,

    #[serde(default = "default_local_port")]
    pub local_port: u16,

    #[serde(default = "default_rover_port")]
    pub rover_port: u16,

    #[serde(default = "default_telemetry_port")]
    pub telemetry_port: u16,
}

/// Control loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_status_log_interval_s")]
    pub status_log_interval_s: u64,
}

/// Input shaping and controller detection
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_deadband")]
    pub deadband: f32,

    #[serde(default = "default_normal_multiplier")]
    pub normal_multiplier: i32,

    #[serde(default = "default_creep_multiplier")]
    pub creep_multiplier: i32,

    #[serde(default = "default_primary_names")]
    pub primary_names: Vec<String>,

    #[serde(default = "default_auxiliary_names")]
    pub auxiliary_names: Vec<String>,

    /// How often `/dev/input` is rescanned for newly connected controllers
    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file. Console only when unset.
    #[serde(default)]
    pub directory: Option<String>,
}

// Default value functions
fn default_link_mode() -> LinkMode { LinkMode::Serial }
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 230400 }
fn default_fallback_baud_rate() -> u32 { 921600 }
fn default_remote_address() -> String { "0013A200423A7DDD".to_string() }
fn default_codec() -> CodecKind { CodecKind::Legacy }

fn default_udp_host() -> String { "127.0.0.1".to_string() }
fn default_local_port() -> u16 { 5000 }
fn default_rover_port() -> u16 { 5001 }
fn default_telemetry_port() -> u16 { 5002 }

fn default_update_interval_ms() -> u64 { 40 }
fn default_heartbeat_interval_ms() -> u64 { 1000 }
fn default_status_log_interval_s() -> u64 { 5 }

fn default_deadband() -> f32 { 0.10 }
fn default_normal_multiplier() -> i32 { 100 }
fn default_creep_multiplier() -> i32 { 20 }
fn default_primary_names() -> Vec<String> { vec!["xbox".to_string()] }
fn default_auxiliary_names() -> Vec<String> { vec!["dinput".to_string()] }
fn default_rescan_interval_ms() -> u64 { 1000 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

/// Baud rates the XBee modules on the rover are configured for
const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            mode: default_link_mode(),
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            fallback_baud_rate: default_fallback_baud_rate(),
            remote_address: default_remote_address(),
            codec: default_codec(),
        }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            host: default_udp_host(),
            local_port: default_local_port(),
            rover_port: default_rover_port(),
            telemetry_port: default_telemetry_port(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            status_log_interval_s: default_status_log_interval_s(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            deadband: default_deadband(),
            normal_multiplier: default_normal_multiplier(),
            creep_multiplier: default_creep_multiplier(),
            primary_names: default_primary_names(),
            auxiliary_names: default_auxiliary_names(),
            rescan_interval_ms: default_rescan_interval_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl LinkConfig {
    /// Parse `remote_address` into the 64-bit XBee destination address.
    ///
    /// # Errors
    ///
    /// Returns `Config` error if the address is not 16 hex digits.
    pub fn remote_address_u64(&self) -> Result<u64> {
        if self.remote_address.len() != 16 {
            return Err(config_error(format!(
                "remote_address must be 16 hex digits, got {:?}",
                self.remote_address
            )));
        }

        u64::from_str_radix(&self.remote_address, 16).map_err(|e| {
            config_error(format!("remote_address {:?} is not hex: {}", self.remote_address, e))
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_basestation::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to built-in defaults when the file
    /// does not exist. A file that exists but is invalid is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.link.mode == LinkMode::Serial && self.link.port.is_empty() {
            return Err(config_error("serial port cannot be empty"));
        }

        for (name, baud) in [
            ("baud_rate", self.link.baud_rate),
            ("fallback_baud_rate", self.link.fallback_baud_rate),
        ] {
            if !SUPPORTED_BAUD_RATES.contains(&baud) {
                return Err(config_error(format!(
                    "{} must be one of: {:?}",
                    name, SUPPORTED_BAUD_RATES
                )));
            }
        }

        self.link.remote_address_u64()?;

        if self.udp.host.is_empty() {
            return Err(config_error("udp host cannot be empty"));
        }

        if self.udp.rover_port == 0 || self.udp.telemetry_port == 0 {
            return Err(config_error("udp rover_port and telemetry_port must be non-zero"));
        }

        // Timing
        if self.timing.update_interval_ms == 0 || self.timing.update_interval_ms > 1000 {
            return Err(config_error("update_interval_ms must be between 1 and 1000"));
        }

        if self.timing.heartbeat_interval_ms == 0 || self.timing.heartbeat_interval_ms > 60000 {
            return Err(config_error("heartbeat_interval_ms must be between 1 and 60000"));
        }

        if self.timing.status_log_interval_s == 0 {
            return Err(config_error("status_log_interval_s must be greater than 0"));
        }

        // Input shaping
        if !(0.0_f32..1.0).contains(&self.input.deadband) {
            return Err(config_error("deadband must be in [0.0, 1.0)"));
        }

        for (name, value) in [
            ("normal_multiplier", self.input.normal_multiplier),
            ("creep_multiplier", self.input.creep_multiplier),
        ] {
            if !(1..=100).contains(&value) {
                return Err(config_error(format!("{} must be between 1 and 100", name)));
            }
        }

        if self.input.rescan_interval_ms < 100 {
            return Err(config_error("rescan_interval_ms must be at least 100"));
        }

        if self.input.creep_multiplier > self.input.normal_multiplier {
            return Err(config_error("creep_multiplier must not exceed normal_multiplier"));
        }

        if self.input.primary_names.iter().all(|n| n.is_empty())
            || self.input.auxiliary_names.iter().all(|n| n.is_empty())
        {
            return Err(config_error("primary_names and auxiliary_names need a non-empty pattern"));
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(config_error("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(config_error("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(config_error("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}

fn config_error(msg: impl std::fmt::Display) -> BaseStationError {
    BaseStationError::Config(toml::de::Error::custom(msg))
}
