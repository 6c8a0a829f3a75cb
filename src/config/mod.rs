//! Configuration module for voice-shifter.
//!
//! Provides `AppConfig` (top-level settings), its sub-configs, `AppPaths`
//! for the platform config directory, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, ProfileConfig};
