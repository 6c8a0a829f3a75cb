//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`.
//! Missing keys fall back to their defaults, so a hand-written
//! `settings.toml` only needs the values it changes.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::device::MAX_BUFFER_SECS;
use crate::audio::{AudioBackend, StreamSpec, SAMPLE_RATE};

/// Highest sample rate accepted from `settings.toml` (Hz).
pub const MAX_SAMPLE_RATE: u32 = 384_000;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Capture / playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz for both directions.
    pub sample_rate: u32,
    /// Bytes per device read/write.  `None` uses the platform minimum.
    pub buffer_size: Option<usize>,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Output device name; `None` means the system default.
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_size: None,
            input_device: None,
            output_device: None,
        }
    }
}

impl AudioConfig {
    /// Resolve the stream parameters, asking `backend` for its minimum
    /// buffer size unless one is configured.
    pub fn stream_spec(&self, backend: &dyn AudioBackend) -> StreamSpec {
        let buffer_size = self
            .buffer_size
            .unwrap_or_else(|| backend.min_buffer_size(self.sample_rate));
        StreamSpec::mono_16bit(self.sample_rate, buffer_size)
    }
}

// ---------------------------------------------------------------------------
// ProfileConfig
// ---------------------------------------------------------------------------

/// Voice-profile selection at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Id of the profile active when the application starts.
    pub default_profile: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default_profile: "normal".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_shifter::config::AppConfig;
///
/// // Returns Default when the file is missing.
/// let config = AppConfig::load().unwrap();
/// println!("starting with {}", config.profile.default_profile);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub profile: ProfileConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no device could honour.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.audio.sample_rate > 0, "audio.sample_rate must be > 0");
        ensure!(
            self.audio.sample_rate <= MAX_SAMPLE_RATE,
            "audio.sample_rate must be <= {MAX_SAMPLE_RATE}"
        );
        if let Some(size) = self.audio.buffer_size {
            let max = StreamSpec::max_buffer_size(self.audio.sample_rate);
            ensure!(size > 0, "audio.buffer_size must be > 0 when set");
            ensure!(
                size <= max,
                "audio.buffer_size must be <= {max} bytes ({MAX_BUFFER_SECS} s at {} Hz)",
                self.audio.sample_rate
            );
        }
        ensure!(
            !self.profile.default_profile.trim().is_empty(),
            "profile.default_profile must not be empty"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
