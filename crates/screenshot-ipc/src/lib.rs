//! Typed caller<->pipeline messages for the screenshot pipeline.
//!
//! This crate defines the request/response surface used by the calling
//! layer to drive the capture engine, plus the configuration shared by
//! every pipeline crate.

mod commands;
mod events;
mod state;
mod types;

pub use commands::ScreenshotCommand;
pub use events::ScreenshotEvent;
pub use state::PipelineState;
pub use types::{
    CaptureConfig, ErrorCode, RequestError, SavedScreenshot, StorageKind, SUCCESS_MARKER,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (caller → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Channel capacity for events (engine → caller).
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<ScreenshotCommand>, Receiver<ScreenshotCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<ScreenshotEvent>, Receiver<ScreenshotEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
