//! Configuration Vault – reads/writes `~/.arbiter/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arbiter_runtime::BehaviorConfig;
use arbiter_types::{ArbiterError, Mode};
use serde::{Deserialize, Serialize};

/// Persisted behavior parameters.  Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Control loop frequency (Hz).
    #[serde(default = "default_update_freq")]
    pub update_freq: f64,

    /// Ordinal of the starting mode (0 = Idle, 1 = Searching, …).
    #[serde(default)]
    pub initial_mode: u8,

    /// Joystick button index that requests manual control.
    #[serde(default = "default_joy_override_button")]
    pub joy_override_button: usize,

    /// Seconds in manual mode after which the interrupted mode is dropped.
    #[serde(default = "default_joy_override_timeout")]
    pub joy_override_timeout: f64,

    /// Seconds in idle mode before autonomy restarts.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: f64,

    /// Maximum input age in seconds.
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold: f64,

    /// Per-topic bus buffer size.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_update_freq() -> f64 {
    10.0
}
fn default_joy_override_button() -> usize {
    7
}
fn default_joy_override_timeout() -> f64 {
    20.0
}
fn default_idle_timeout() -> f64 {
    10.0
}
fn default_staleness_threshold() -> f64 {
    1.0
}
fn default_bus_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_freq: default_update_freq(),
            initial_mode: 0,
            joy_override_button: default_joy_override_button(),
            joy_override_timeout: default_joy_override_timeout(),
            idle_timeout: default_idle_timeout(),
            staleness_threshold: default_staleness_threshold(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl Config {
    /// Validate and convert into the runtime's [`BehaviorConfig`].
    ///
    /// # Errors
    ///
    /// - [`ArbiterError::InvalidMode`] for an unknown `initial_mode` ordinal.
    /// - [`ArbiterError::Config`] for a rate with no usable tick period, a
    ///   negative or non-finite duration, or a zero bus capacity.
    pub fn to_behavior_config(&self) -> Result<BehaviorConfig, ArbiterError> {
        if !self.update_freq.is_finite() || self.update_freq <= 0.0 {
            return Err(ArbiterError::Config(format!(
                "update_freq must be a positive number of Hz, got {}",
                self.update_freq
            )));
        }
        if self.bus_capacity == 0 {
            return Err(ArbiterError::Config("bus_capacity must be at least 1".to_string()));
        }
        let behavior = BehaviorConfig {
            tick_rate_hz: self.update_freq,
            initial_mode: Mode::try_from(self.initial_mode)?,
            override_button_index: self.joy_override_button,
            override_timeout: seconds("joy_override_timeout", self.joy_override_timeout)?,
            idle_timeout: seconds("idle_timeout", self.idle_timeout)?,
            staleness_threshold: seconds("staleness_threshold", self.staleness_threshold)?,
        };
        behavior.tick_period()?;
        Ok(behavior)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, ArbiterError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ArbiterError::Config(format!("{field} must be a non-negative number of seconds, got {value}"))
    })
}

/// Return the config path: `$ARBITER_CONFIG`, else `~/.arbiter/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(explicit) = std::env::var("ARBITER_CONFIG") {
        return PathBuf::from(explicit);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".arbiter").join("config.toml")
}

/// Load the config from disk and apply environment overrides.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ArbiterError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ArbiterError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        ArbiterError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| ArbiterError::Config(format!("failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Apply `ARBITER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARBITER_UPDATE_FREQ` | `update_freq` |
/// | `ARBITER_INITIAL_MODE` | `initial_mode` |
/// | `ARBITER_JOY_OVERRIDE_BUTTON` | `joy_override_button` |
/// | `ARBITER_JOY_OVERRIDE_TIMEOUT` | `joy_override_timeout` |
/// | `ARBITER_IDLE_TIMEOUT` | `idle_timeout` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    override_from_env("ARBITER_UPDATE_FREQ", &mut cfg.update_freq);
    override_from_env("ARBITER_INITIAL_MODE", &mut cfg.initial_mode);
    override_from_env("ARBITER_JOY_OVERRIDE_BUTTON", &mut cfg.joy_override_button);
    override_from_env("ARBITER_JOY_OVERRIDE_TIMEOUT", &mut cfg.joy_override_timeout);
    override_from_env("ARBITER_IDLE_TIMEOUT", &mut cfg.idle_timeout);
}

fn override_from_env<T: std::str::FromStr>(var: &str, field: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(parsed) = v.trim().parse::<T>()
    {
        *field = parsed;
    }
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &Config) -> Result<(), ArbiterError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ArbiterError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ArbiterError::Config(format!("failed to create config directory: {e}"))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| ArbiterError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        ArbiterError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}
