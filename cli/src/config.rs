//! Configuration loading.
//!
//! The capture configuration lives in the platform config directory:
//! - Linux: `~/.config/screenshot/config.json`
//! - macOS: `~/Library/Application Support/screenshot/config.json`
//! - Windows: `%APPDATA%\screenshot\config.json`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::{debug, warn};

use screenshot_ipc::CaptureConfig;

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "screenshot").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Parse a config document. Missing keys take their defaults.
pub fn parse_config(contents: &str) -> Result<CaptureConfig> {
    serde_json::from_str(contents).context("invalid capture config")
}

/// Load the capture configuration.
///
/// An explicit path must exist and parse. The default location is
/// optional: if it is missing or broken, defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<CaptureConfig> {
    if let Some(path) = explicit {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = parse_config(&contents)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        return Ok(config);
    }

    let Some(path) = default_config_path() else {
        warn!("Could not determine config directory, using defaults");
        return Ok(CaptureConfig::default());
    };

    if !path.exists() {
        debug!(path = %path.display(), "No config file found, using defaults");
        return Ok(CaptureConfig::default());
    }

    match fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|contents| parse_config(&contents))
    {
        Ok(config) => {
            debug!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        Err(e) => {
            warn!("Failed to load {}: {:#}. Using defaults.", path.display(), e);
            Ok(CaptureConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config(r#"{ "album": "Captures", "frame_timeout_ms": 0 }"#).unwrap();
        assert_eq!(config.album, "Captures");
        assert_eq!(config.frame_timeout(), None);
        assert_eq!(config.virtual_display_name, "Screenshot");
        assert_eq!(config.consent_timeout_ms, 60_000);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(parse_config("{ not json").is_err());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let missing = std::env::temp_dir().join("screenshot-cli-no-such-config.json");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let path = std::env::temp_dir().join(format!(
            "screenshot-cli-config-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "capability_tier": 28 }"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(!config.uses_indexed_storage());
        fs::remove_file(&path).unwrap();
    }
}
