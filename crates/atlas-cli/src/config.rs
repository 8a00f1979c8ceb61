//! Configuration vault – reads/writes `~/.atlas/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted user configuration stored in `~/.atlas/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Source label stamped onto every relayed envelope.
    #[serde(default = "default_world_name")]
    pub world_name: String,

    /// Capacity of the relay's broadcast channel.  Slow consumers lose the
    /// oldest envelopes once this many are buffered.
    #[serde(default = "default_relay_capacity")]
    pub relay_capacity: usize,

    /// Where the demo writes its DOT snapshot.
    #[serde(default = "default_dot_path")]
    pub dot_path: String,
}

fn default_world_name() -> String {
    "atlas".to_string()
}
fn default_relay_capacity() -> usize {
    256
}
fn default_dot_path() -> String {
    "world.dot".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_name: default_world_name(),
            relay_capacity: default_relay_capacity(),
            dot_path: default_dot_path(),
        }
    }
}

/// Return the path to `~/.atlas/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".atlas").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ATLAS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ATLAS_WORLD_NAME` | `world_name` |
/// | `ATLAS_RELAY_CAPACITY` | `relay_capacity` |
/// | `ATLAS_DOT_PATH` | `dot_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ATLAS_WORLD_NAME") {
        cfg.world_name = v;
    }
    if let Ok(v) = std::env::var("ATLAS_RELAY_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>()
    {
        cfg.relay_capacity = capacity;
    }
    if let Ok(v) = std::env::var("ATLAS_DOT_PATH") {
        cfg.dot_path = v;
    }
}

/// Save the config to disk, creating `~/.atlas/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
