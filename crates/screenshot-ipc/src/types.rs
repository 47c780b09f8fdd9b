//! Common types used across pipeline messages.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker string a successful capture resolves with.
pub const SUCCESS_MARKER: &str = "success";

/// Configuration for the capture pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capability tier reported by the host OS.
    pub capability_tier: u32,

    /// Lowest tier that stores through the media index (default: 29).
    pub indexed_storage_min_tier: u32,

    /// Public pictures location. `None` uses the user's pictures directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pictures_dir: Option<PathBuf>,

    /// Album directory inside the pictures location.
    pub album: String,

    /// Name given to the mirroring virtual display.
    pub virtual_display_name: String,

    /// Deadline for the consent step in milliseconds (0 disables).
    pub consent_timeout_ms: u64,

    /// Deadline for frame arrival in milliseconds (0 disables).
    pub frame_timeout_ms: u64,
}

impl CaptureConfig {
    /// Returns true if captures go through the media index.
    pub fn uses_indexed_storage(&self) -> bool {
        self.capability_tier >= self.indexed_storage_min_tier
    }

    /// Consent deadline, if enabled.
    pub fn consent_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.consent_timeout_ms)
    }

    /// Frame arrival deadline, if enabled.
    pub fn frame_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.frame_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capability_tier: 29,
            indexed_storage_min_tier: 29,
            pictures_dir: None,
            album: "Screenshots".to_string(),
            virtual_display_name: "Screenshot".to_string(),
            consent_timeout_ms: 60_000,
            frame_timeout_ms: 10_000,
        }
    }
}

/// Error codes surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Service unavailable, processing failure or save failure.
    Error,

    /// The user refused consent.
    PermissionDenied,

    /// Another capture is already outstanding.
    Busy,

    /// Consent or frame did not arrive in time.
    Timeout,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Busy => "BUSY",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error resolving a request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RequestError {
    /// Machine-readable code.
    pub code: ErrorCode,

    /// Human-readable reason.
    pub message: String,
}

impl RequestError {
    /// Create a new request error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Generic `ERROR`.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Error, message)
    }

    /// Consent was refused.
    pub fn permission_denied() -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            "Permission for screen capture denied",
        )
    }

    /// A capture is already outstanding.
    pub fn busy(outstanding: u64) -> Self {
        Self::new(
            ErrorCode::Busy,
            format!("Capture request {outstanding} is still outstanding"),
        )
    }
}

/// How a screenshot was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    /// Registered with the media index, then written through its handle.
    Indexed,

    /// Written to a file path, then announced to the media scanner.
    DirectPath,
}

/// A stored screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedScreenshot {
    /// File name (`Screenshot_<yyyyMMdd_HHmmss>.png`).
    pub file_name: String,

    /// Final location of the file.
    pub location: PathBuf,

    /// Strategy used to store it.
    pub storage: StorageKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_index() {
        let config = CaptureConfig::default();
        assert!(config.uses_indexed_storage());
        assert_eq!(config.album, "Screenshots");
        assert_eq!(config.frame_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_tier_below_threshold_uses_direct_path() {
        let config = CaptureConfig {
            capability_tier: 28,
            ..Default::default()
        };
        assert!(!config.uses_indexed_storage());
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = CaptureConfig {
            consent_timeout_ms: 0,
            frame_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.consent_timeout(), None);
        assert_eq!(config.frame_timeout(), None);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"capability_tier": 21, "album": "Shots"}"#).unwrap();
        assert_eq!(config.capability_tier, 21);
        assert_eq!(config.album, "Shots");
        assert_eq!(config.indexed_storage_min_tier, 29);
        assert_eq!(config.pictures_dir, None);
    }

    #[test]
    fn test_error_codes_serialize_to_wire_names() {
        let json = serde_json::to_string(&ErrorCode::PermissionDenied).unwrap();
        assert_eq!(json, "\"PERMISSION_DENIED\"");
        assert_eq!(ErrorCode::Error.as_str(), "ERROR");
        assert_eq!(
            RequestError::permission_denied().to_string(),
            "PERMISSION_DENIED: Permission for screen capture denied"
        );
    }
}
