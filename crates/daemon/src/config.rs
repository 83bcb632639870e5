//! Configuration management for the keydrag daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. `%APPDATA%/keydrag/config.toml` (Windows standard)
//! 2. `~/.config/keydrag/config.toml` (Unix-style, for WSL compatibility)
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use keydrag_core_gesture::ReleasePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure for keydrag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
    /// Gesture configuration.
    pub gesture: GestureConfig,
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Gesture-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Polling interval of the geometry worker in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How key releases end an active gesture.
    #[serde(default)]
    pub release_policy: ReleasePolicyConfig,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            release_policy: ReleasePolicyConfig::default(),
        }
    }
}

/// Release policy configuration (wrapper for serialization).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicyConfig {
    /// Releasing any tracked key ends the gesture.
    AnyRelease,
    /// The gesture lives as long as Ctrl is held; releasing another key
    /// during a resize downgrades it to a move.
    #[default]
    CtrlAnchored,
}

impl From<ReleasePolicyConfig> for ReleasePolicy {
    fn from(config: ReleasePolicyConfig) -> Self {
        match config {
            ReleasePolicyConfig::AnyRelease => ReleasePolicy::AnyRelease,
            ReleasePolicyConfig::CtrlAnchored => ReleasePolicy::CtrlAnchored,
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    16
}

/// Bounds for the polling interval. Below 1ms the worker busy-spins; above
/// 250ms drags feel detached from the cursor.
const MIN_POLL_INTERVAL_MS: u64 = 1;
const MAX_POLL_INTERVAL_MS: u64 = 250;

/// A single validation finding; the value has already been corrected.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Tries the following locations in order:
    /// 1. `%APPDATA%/keydrag/config.toml`
    /// 2. `~/.config/keydrag/config.toml`
    /// 3. `./config.toml`
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp out-of-range values and report what was corrected.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.gesture.poll_interval_ms) {
            let clamped = self
                .gesture
                .poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
            warnings.push(ConfigWarning {
                field: "gesture.poll_interval_ms".to_string(),
                message: format!(
                    "value {} out of range, clamped to {}",
                    self.gesture.poll_interval_ms, clamped
                ),
            });
            self.gesture.poll_interval_ms = clamped;
        }

        let level = self.behavior.log_level.to_lowercase();
        if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            warnings.push(ConfigWarning {
                field: "behavior.log_level".to_string(),
                message: format!(
                    "unknown level \"{}\", falling back to \"info\"",
                    self.behavior.log_level
                ),
            });
            self.behavior.log_level = "info".to_string();
        }

        warnings
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Windows standard: %APPDATA%/keydrag/config.toml
    if let Some(proj_dirs) = ProjectDirs::from("com", "keydrag", "keydrag") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    // 2. Unix-style: ~/.config/keydrag/config.toml
    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("keydrag").join("config.toml"));
    }

    // 3. Current directory: ./config.toml
    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.behavior.log_level, "info");
        assert_eq!(config.gesture.poll_interval_ms, 16);
        assert_eq!(config.gesture.release_policy, ReleasePolicyConfig::CtrlAnchored);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gesture.poll_interval_ms, config.gesture.poll_interval_ms);
        assert_eq!(parsed.gesture.release_policy, config.gesture.release_policy);
    }

    #[test]
    fn test_config_partial_parse() {
        // Config with only some fields should use defaults for the rest
        let toml_str = r#"
            [gesture]
            poll_interval_ms = 32
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gesture.poll_interval_ms, 32);
        assert_eq!(config.behavior.log_level, "info"); // default
        assert_eq!(config.gesture.release_policy, ReleasePolicyConfig::CtrlAnchored); // default
    }

    #[test]
    fn test_release_policy_parse() {
        let toml_str = r#"
            [gesture]
            release_policy = "any_release"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gesture.release_policy, ReleasePolicyConfig::AnyRelease);
    }

    #[test]
    fn test_release_policy_conversion() {
        let any: ReleasePolicy = ReleasePolicyConfig::AnyRelease.into();
        let anchored: ReleasePolicy = ReleasePolicyConfig::CtrlAnchored.into();
        assert_eq!(any, ReleasePolicy::AnyRelease);
        assert_eq!(anchored, ReleasePolicy::CtrlAnchored);
    }

    #[test]
    fn test_validate_clamps_poll_interval() {
        let mut config = Config::default();
        config.gesture.poll_interval_ms = 0;
        let warnings = config.validate();
        assert_eq!(config.gesture.poll_interval_ms, 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "gesture.poll_interval_ms");

        let mut config = Config::default();
        config.gesture.poll_interval_ms = 10_000;
        config.validate();
        assert_eq!(config.gesture.poll_interval_ms, 250);
    }

    #[test]
    fn test_validate_fixes_log_level() {
        let mut config = Config::default();
        config.behavior.log_level = "verbose".to_string();
        let warnings = config.validate();
        assert_eq!(config.behavior.log_level, "info");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let mut config = Config::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_config_paths_not_empty() {
        let paths = config_paths();
        assert!(!paths.is_empty());
    }
}
