//! Commands sent from the caller to the engine.

use serde::{Deserialize, Serialize};

/// Commands that the calling layer can send to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenshotCommand {
    /// Capture the primary display once and store it.
    ///
    /// Resolves with exactly one `ScreenshotTaken` or `ScreenshotFailed`
    /// carrying the same `request_id`.
    TakeScreenshot { request_id: u64 },

    /// Report whether screen capture is currently authorized.
    CheckPermission { request_id: u64 },

    /// Request current pipeline state.
    GetState,

    /// Release everything and stop the engine.
    Shutdown,
}

impl ScreenshotCommand {
    /// Returns the request id carried by this command, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::TakeScreenshot { request_id } | Self::CheckPermission { request_id } => {
                Some(*request_id)
            }
            Self::GetState | Self::Shutdown => None,
        }
    }
}
