//! Bridge configuration – reads/writes `~/.navbridge/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use navbridge_hal::SimParams;
use navbridge_runtime::SamplingLoopConfig;
use navbridge_types::{CameraAxes, NavError};
use serde::{Deserialize, Serialize};

/// Persisted bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Camera poll rate (Hz).
    #[serde(default = "default_update_frequency_hz")]
    pub update_frequency_hz: f64,

    /// Recompute the drift offset on every resync instead of only the first.
    #[serde(default = "default_continuous_sync")]
    pub continuous_sync: bool,

    /// Axis convention of the tracking camera.
    #[serde(default)]
    pub camera_axes: CameraAxes,

    /// Silence (ms) after which missing camera data is logged as a warning.
    #[serde(default = "default_stale_sample_timeout_ms")]
    pub stale_sample_timeout_ms: u64,

    /// Simulated camera trajectory.
    #[serde(default)]
    pub sim: SimParams,
}

fn default_update_frequency_hz() -> f64 {
    10.0
}
fn default_continuous_sync() -> bool {
    true
}
fn default_stale_sample_timeout_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_frequency_hz: default_update_frequency_hz(),
            continuous_sync: default_continuous_sync(),
            camera_axes: CameraAxes::default(),
            stale_sample_timeout_ms: default_stale_sample_timeout_ms(),
            sim: SimParams::default(),
        }
    }
}

impl Config {
    /// Runtime settings for the sampling loop, validating the frequency.
    pub fn sampling_config(&self) -> Result<SamplingLoopConfig, NavError> {
        let sampling = SamplingLoopConfig {
            frequency_hz: self.update_frequency_hz,
            continuous_sync: self.continuous_sync,
            camera_axes: self.camera_axes,
            stale_sample_timeout: Duration::from_millis(self.stale_sample_timeout_ms),
        };
        sampling.period()?;
        Ok(sampling)
    }
}

/// Path of the config file: `$NAVBRIDGE_CONFIG` if set, otherwise
/// `~/.navbridge/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("NAVBRIDGE_CONFIG")
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".navbridge").join("config.toml")
}

/// Load the config from a specific path.  `Ok(None)` if the file does not
/// exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, NavError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| NavError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| NavError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `NAVBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `NAVBRIDGE_FREQUENCY_HZ` | `update_frequency_hz` |
/// | `NAVBRIDGE_CONTINUOUS_SYNC` | `continuous_sync` (`true`/`false`/`1`/`0`/`yes`/`no`/`on`/`off`) |
/// | `NAVBRIDGE_CAMERA_AXES` | `camera_axes` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("NAVBRIDGE_FREQUENCY_HZ")
        && let Ok(hz) = v.trim().parse::<f64>()
    {
        cfg.update_frequency_hz = hz;
    }
    if let Ok(v) = std::env::var("NAVBRIDGE_CONTINUOUS_SYNC")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.continuous_sync = flag;
    }
    if let Ok(v) = std::env::var("NAVBRIDGE_CAMERA_AXES")
        && let Ok(axes) = v.parse::<CameraAxes>()
    {
        cfg.camera_axes = axes;
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to a specific path, creating its directory if needed.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), NavError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| NavError::Config(format!("failed to create config directory: {e}")))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                NavError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| NavError::Config(format!("failed to serialize config: {e}")))?;
    // Owner-only file (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| NavError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| NavError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
