//! Configuration management (config.toml)
//!
//! Interface slot, output sink and host timing. Settings are stored in TOML
//! format in the platform-specific config directory; a missing file means
//! defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use pulse_gen::{ImageConfig, OutputSink};

use crate::error::ConfigError;
use crate::machine::MachineConfig;
use crate::net::w5100::RX_SIZE;
use crate::player::{DEFAULT_THRESHOLD, PlaybackSettings};

const CONFIG_FILE: &str = "config.toml";

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Network interface settings
    #[serde(default)]
    pub interface: InterfaceConfig,
    /// Where the pulses go
    #[serde(default)]
    pub output: OutputConfig,
    /// Dispatch loop settings
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Emulated hardware
    #[serde(default)]
    pub machine: HostConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Expansion slot of the W5100 card (default: 3, range: 1-7)
    #[serde(default = "default_slot")]
    pub slot: u8,
    /// Play the built-in silence pattern instead of reading the interface
    #[serde(default)]
    pub mock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Speaker or cassette output (default: speaker)
    #[serde(default)]
    pub sink: OutputSink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Bytes that must be buffered before a burst (default: 256)
    #[serde(default = "default_threshold")]
    pub buffer_threshold: usize,
    /// Host cycles per idle dispatch iteration (default: 1024)
    #[serde(default = "default_idle_cycles")]
    pub idle_cycles: u64,
    /// Abort bursts longer than this many cycles (default: unlimited)
    #[serde(default)]
    pub burst_cycle_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Emulate the IIgs speed register
    #[serde(default)]
    pub iigs: bool,
    /// Remote delivery rate in bytes per 1000 cycles (default: unlimited)
    #[serde(default)]
    pub delivery_rate: Option<u32>,
}

fn default_slot() -> u8 {
    3
}
fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}
fn default_idle_cycles() -> u64 {
    1024
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            slot: default_slot(),
            mock: false,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_threshold: default_threshold(),
            idle_cycles: default_idle_cycles(),
            burst_cycle_limit: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=7).contains(&self.interface.slot) {
            return Err(ConfigError::InvalidSlot(self.interface.slot));
        }
        if self.playback.buffer_threshold > RX_SIZE {
            return Err(ConfigError::InvalidThreshold(self.playback.buffer_threshold));
        }
        Ok(())
    }

    pub fn image_config(&self) -> ImageConfig {
        ImageConfig {
            slot: self.interface.slot,
            mock: self.interface.mock,
            sink: self.output.sink,
        }
    }

    pub fn playback_settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            threshold: self.playback.buffer_threshold,
            mock: self.interface.mock,
        }
    }

    pub fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            slot: self.interface.slot,
            iigs: self.machine.iigs,
            delivery_rate: self.machine.delivery_rate,
            idle_cycles: self.playback.idle_cycles,
            burst_cycle_limit: self.playback.burst_cycle_limit,
        }
    }
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.pulsestream", "", "PulseStream")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform's configuration directory.
///
/// Returns default values if there is no directory or no file.
pub fn load() -> Result<Config, ConfigError> {
    match config_dir() {
        Some(dir) => load_from(&dir.join(CONFIG_FILE)),
        None => Ok(Config::default()),
    }
}

/// Saves the configuration to the platform's configuration directory.
///
/// Creates the directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(&dir)?;
        save_to(&dir.join(CONFIG_FILE), config)?;
    }
    Ok(())
}

/// Loads and validates a configuration file; a missing file means defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(err) => return Err(err.into()),
    };
    config.validate()?;
    Ok(config)
}

pub fn save_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
