//! Events sent from the engine to the caller.

use serde::{Deserialize, Serialize};

use crate::state::PipelineState;
use crate::types::{RequestError, SavedScreenshot};

/// Events that the engine can send to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScreenshotEvent {
    /// Engine is ready to accept commands.
    Ready,

    /// Pipeline state has changed.
    StateChanged {
        /// Previous state.
        previous: PipelineState,

        /// Current state.
        current: PipelineState,
    },

    /// A capture request completed and the image was stored.
    ScreenshotTaken {
        request_id: u64,
        saved: SavedScreenshot,
    },

    /// A capture request failed. Always terminal for that request.
    ScreenshotFailed {
        request_id: u64,
        error: RequestError,
    },

    /// Answer to a permission check.
    PermissionStatus { request_id: u64, granted: bool },

    /// Engine has shut down.
    Shutdown,
}

impl ScreenshotEvent {
    /// Returns the request id this event resolves, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::ScreenshotTaken { request_id, .. }
            | Self::ScreenshotFailed { request_id, .. }
            | Self::PermissionStatus { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}
