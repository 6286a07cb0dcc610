//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.murmur/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::TransportPreference;
use crate::core::scroll::DEFAULT_NEAR_BOTTOM_THRESHOLD_PX;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MurmurConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransportConfig {
    pub preference: Option<TransportPreference>,
    pub event_stream_supported: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ScrollConfig {
    pub near_bottom_threshold: Option<f64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub transport: TransportPreference,
    pub event_stream_supported: bool,
    pub near_bottom_threshold: f64,
}

/// CLI-level overrides (None = flag not given).
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub transport: Option<TransportPreference>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.murmur/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".murmur").join("config.toml"))
}

/// Load config from `~/.murmur/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `MurmurConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<MurmurConfig, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("Could not determine home directory, using default config");
            Ok(MurmurConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<MurmurConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(MurmurConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: MurmurConfig = toml::from_str(&contents)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# murmur configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [backend]
# base_url = "http://localhost:8000"   # Or set MURMUR_BASE_URL

# [transport]
# preference = "auto"                  # "auto", "event-stream", "chunked-body" (or MURMUR_TRANSPORT)
# event_stream_supported = true        # false forces chunked-body even in auto

# [scroll]
# near_bottom_threshold = 120          # Distance from bottom that still counts as following
"#;

fn generate_default_config(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG_TEMPLATE) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &MurmurConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

fn resolve_with_env(
    config: &MurmurConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Base URL: CLI → env → config → default
    let base_url = cli
        .base_url
        .clone()
        .or_else(|| env("MURMUR_BASE_URL"))
        .or_else(|| config.backend.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    // Transport: CLI → env → config → auto
    let transport = cli
        .transport
        .or_else(|| {
            let raw = env("MURMUR_TRANSPORT")?;
            match TransportPreference::from_str(&raw, true) {
                Ok(pref) => Some(pref),
                Err(e) => {
                    warn!("Ignoring MURMUR_TRANSPORT: {}", e);
                    None
                }
            }
        })
        .or(config.transport.preference)
        .unwrap_or_default();

    let near_bottom_threshold = match config.scroll.near_bottom_threshold {
        Some(t) if t.is_finite() && t >= 0.0 => t,
        Some(t) => {
            warn!("Invalid scroll.near_bottom_threshold {}, using default", t);
            DEFAULT_NEAR_BOTTOM_THRESHOLD_PX
        }
        None => DEFAULT_NEAR_BOTTOM_THRESHOLD_PX,
    };

    ResolvedConfig {
        base_url,
        transport,
        event_stream_supported: config.transport.event_stream_supported.unwrap_or(true),
        near_bottom_threshold,
    }
}
