//! TOML configuration for the controller.
//!
//! The file lives at a platform-appropriate location unless `--config` points
//! elsewhere:
//! - Windows:  `%APPDATA%\BoxCar\controller.toml`
//! - Linux:    `~/.config/boxcar/controller.toml`
//! - macOS:    `~/Library/Application Support/BoxCar/controller.toml`
//!
//! ```toml
//! log_level = "info"
//!
//! [link]
//! address = "192.168.4.1:23"
//! ack_timeout_ms = 10000
//!
//! [drive]
//! min_speed = 150
//! max_speed = 255
//!
//! [bindings]
//! auto_toggle = "cross"
//! drive_enable = "r2"
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "...")]` so a missing file, a missing
//! section or a missing key all fall back to the built-in value.  A file only
//! needs to mention what it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use boxcar_core::domain::{DEFAULT_MAX_SPEED, DEFAULT_MIN_SPEED, DEFAULT_SPEED_HYSTERESIS};
use boxcar_core::input::DEFAULT_DEAD_ZONE;
use boxcar_core::SpeedRange;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::drive::{DriveTuning, GamepadBindings};
use crate::application::state_machine::DEFAULT_TICK_PERIOD;
use crate::application::vehicle_link::LinkTiming;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub bindings: GamepadBindings,
}

/// Connection and protocol timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkConfig {
    /// `host:port` of the serial bridge.
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_listener_period_ms")]
    pub listener_period_ms: u64,
    #[serde(default = "default_greeting_timeout_ms")]
    pub greeting_timeout_ms: u64,
}

/// Drive-mode tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriveConfig {
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    #[serde(default = "default_min_speed")]
    pub min_speed: u8,
    #[serde(default = "default_max_speed")]
    pub max_speed: u8,
    #[serde(default = "default_speed_hysteresis")]
    pub speed_hysteresis: u8,
    #[serde(default = "default_autonomous_speed")]
    pub autonomous_speed: u8,
    /// How long autonomous mode turns away from a sensor hit.
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
}

/// Controller input settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Stick dead zone, `0.0` to `1.0`.
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_address() -> String {
    "192.168.4.1:23".to_string()
}
fn default_ack_timeout_ms() -> u64 {
    10_000
}
fn default_lock_timeout_ms() -> u64 {
    10_000
}
fn default_listener_period_ms() -> u64 {
    100
}
fn default_greeting_timeout_ms() -> u64 {
    1_000
}
fn default_tick_period_ms() -> u64 {
    DEFAULT_TICK_PERIOD.as_millis() as u64
}
fn default_min_speed() -> u8 {
    DEFAULT_MIN_SPEED
}
fn default_max_speed() -> u8 {
    DEFAULT_MAX_SPEED
}
fn default_speed_hysteresis() -> u8 {
    DEFAULT_SPEED_HYSTERESIS
}
fn default_autonomous_speed() -> u8 {
    u8::MAX
}
fn default_dwell_ms() -> u64 {
    2_000
}
fn default_dead_zone() -> f32 {
    DEFAULT_DEAD_ZONE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            link: LinkConfig::default(),
            drive: DriveConfig::default(),
            input: InputConfig::default(),
            bindings: GamepadBindings::default(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            ack_timeout_ms: default_ack_timeout_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
            listener_period_ms: default_listener_period_ms(),
            greeting_timeout_ms: default_greeting_timeout_ms(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            speed_hysteresis: default_speed_hysteresis(),
            autonomous_speed: default_autonomous_speed(),
            dwell_ms: default_dwell_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dead_zone: default_dead_zone(),
        }
    }
}

// ── Conversions into runtime settings ─────────────────────────────────────────

impl LinkConfig {
    pub fn timing(&self) -> LinkTiming {
        LinkTiming {
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            listener_period: Duration::from_millis(self.listener_period_ms),
            greeting_timeout: Duration::from_millis(self.greeting_timeout_ms),
        }
    }
}

impl DriveConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// A `min_speed` above `max_speed` is swapped rather than rejected.
    pub fn tuning(&self) -> DriveTuning {
        DriveTuning {
            speed_range: SpeedRange {
                min: self.min_speed.min(self.max_speed),
                max: self.min_speed.max(self.max_speed),
            },
            speed_hysteresis: self.speed_hysteresis,
            autonomous_speed: self.autonomous_speed,
            dwell: Duration::from_millis(self.dwell_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the default config file path.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("controller.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `BoxCar`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("BoxCar"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("boxcar"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("BoxCar")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
