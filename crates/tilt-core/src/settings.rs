//! Persisted user settings.
//!
//! A flat TOML file under the platform config directory holds the
//! serial connection parameters, protocol tuning, and motor
//! configuration. Loading never fails: any missing or malformed file
//! falls back to defaults, and loaded values are clamped to their
//! valid ranges so a hand-edited file cannot put the stack into an
//! out-of-range state.
//!
//! Orientation is stored here but is deliberately *not* cached by the
//! mapping code; callers re-read it on every remap because a second UI
//! surface may change it between calls.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TiltError, TiltResult};
use crate::serial::is_supported_baud;

/// Bounds for the command timeout, in milliseconds.
pub const COMMAND_TIMEOUT_RANGE_MS: (u64, u64) = (500, 30_000);
/// Bounds for motor speed, max speed and acceleration.
pub const MOTOR_CONFIG_RANGE: (u32, u32) = (1, 2_000);
/// Bounds for the default step size.
pub const STEP_SIZE_RANGE: (i32, i32) = (1, 10_000);

/// User settings for the tilt control stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Last selected serial port.
    pub selected_port: String,
    /// Serial baud rate; must be one of the supported rates.
    pub baud_rate: u32,
    /// Connect automatically when the application starts.
    pub auto_connect_on_startup: bool,
    /// Full timeout waiting for the first response line.
    pub command_timeout_ms: u64,
    /// Quiet period after which a response is considered complete.
    ///
    /// This is an empirical heuristic, not a protocol guarantee: a
    /// device burst slower than this window would be truncated, which
    /// is why it is a tunable rather than a constant.
    pub quiet_period_ms: u64,
    /// Default step count for tilt moves.
    pub default_step_size: i32,
    /// Motor speed (device `cA`).
    pub motor_speed: u32,
    /// Motor maximum speed (device `cB`).
    pub motor_max_speed: u32,
    /// Motor acceleration (device `cC`).
    pub motor_acceleration: u32,
    /// Device mounting orientation, 1-4 (0/90/180/270 degrees
    /// clockwise).
    pub orientation: u8,
    /// Echo serial traffic to the log.
    pub log_serial_traffic: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_port: String::new(),
            baud_rate: 9600,
            auto_connect_on_startup: false,
            command_timeout_ms: 3000,
            quiet_period_ms: 500,
            default_step_size: 25,
            motor_speed: 100,
            motor_max_speed: 500,
            motor_acceleration: 100,
            orientation: 1,
            log_serial_traffic: false,
        }
    }
}

impl Settings {
    /// Location of the settings file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("asg-tilt")
            .join("settings.toml")
    }

    /// Load settings from the default location, falling back to
    /// defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from `path`, falling back to defaults on any
    /// error. Loaded values are clamped to their valid ranges.
    pub fn load_from(path: &Path) -> Self {
        let mut settings = std::fs::read_to_string(path)
            .ok()
            .and_then(|text| toml::from_str::<Settings>(&text).ok())
            .unwrap_or_default();
        settings.sanitize();
        settings
    }

    /// Persist settings to the default location.
    pub fn save(&self) -> TiltResult<()> {
        self.save_to(&Self::default_path())
    }

    /// Persist settings to `path`, creating parent directories as
    /// needed.
    pub fn save_to(&self, path: &Path) -> TiltResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| TiltError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Clamp every field to its valid range, resetting values that
    /// have no meaningful clamp (baud, orientation) to defaults.
    pub fn sanitize(&mut self) {
        let (lo, hi) = COMMAND_TIMEOUT_RANGE_MS;
        self.command_timeout_ms = self.command_timeout_ms.clamp(lo, hi);
        self.quiet_period_ms = self.quiet_period_ms.clamp(50, 5_000);
        let (lo, hi) = STEP_SIZE_RANGE;
        self.default_step_size = self.default_step_size.clamp(lo, hi);
        let (lo, hi) = MOTOR_CONFIG_RANGE;
        self.motor_speed = self.motor_speed.clamp(lo, hi);
        self.motor_max_speed = self.motor_max_speed.clamp(lo, hi);
        self.motor_acceleration = self.motor_acceleration.clamp(lo, hi);
        if !is_supported_baud(self.baud_rate) {
            self.baud_rate = 9600;
        }
        if !(1..=4).contains(&self.orientation) {
            self.orientation = 1;
        }
    }

    /// Set the baud rate, rejecting unsupported values.
    pub fn set_baud_rate(&mut self, baud: u32) -> TiltResult<()> {
        if !is_supported_baud(baud) {
            return Err(TiltError::Config(format!("unsupported baud rate {}", baud)));
        }
        self.baud_rate = baud;
        Ok(())
    }

    /// Set the orientation code, rejecting values outside 1-4.
    pub fn set_orientation(&mut self, orientation: u8) -> TiltResult<()> {
        if !(1..=4).contains(&orientation) {
            return Err(TiltError::Config(format!(
                "orientation must be 1-4, got {}",
                orientation
            )));
        }
        self.orientation = orientation;
        Ok(())
    }

    /// Set the command timeout, clamped to its valid range.
    pub fn set_command_timeout_ms(&mut self, ms: u64) {
        let (lo, hi) = COMMAND_TIMEOUT_RANGE_MS;
        self.command_timeout_ms = ms.clamp(lo, hi);
    }

    /// Set the motor speed, clamped to its valid range.
    pub fn set_motor_speed(&mut self, value: u32) {
        let (lo, hi) = MOTOR_CONFIG_RANGE;
        self.motor_speed = value.clamp(lo, hi);
    }

    /// Set the motor maximum speed, clamped to its valid range.
    pub fn set_motor_max_speed(&mut self, value: u32) {
        let (lo, hi) = MOTOR_CONFIG_RANGE;
        self.motor_max_speed = value.clamp(lo, hi);
    }

    /// Set the motor acceleration, clamped to its valid range.
    pub fn set_motor_acceleration(&mut self, value: u32) {
        let (lo, hi) = MOTOR_CONFIG_RANGE;
        self.motor_acceleration = value.clamp(lo, hi);
    }
}
