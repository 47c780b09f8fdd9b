//! Core orchestrator for the screenshot pipeline.
//!
//! This crate sequences consent, capture, decoding and storage for one
//! request at a time, and guarantees capture resources are released on
//! every path.

mod orchestrator;
mod state;

pub use orchestrator::Engine;
pub use state::SessionSlot;

use crossbeam_channel::{Receiver, Sender};

use screenshot_capture::{DisplayService, ProjectionService};
use screenshot_ipc::{CaptureConfig, ScreenshotCommand, ScreenshotEvent};
use screenshot_store::ImagePersister;

/// Host OS services the engine captures through.
pub struct Platform {
    /// Source of display metrics.
    pub display: Box<dyn DisplayService>,

    /// Consent flow and capture grants.
    pub projection: Box<dyn ProjectionService>,
}

/// Create an engine instance with IPC channels.
pub fn create_engine(
    platform: Platform,
    persister: ImagePersister,
    config: CaptureConfig,
    command_rx: Receiver<ScreenshotCommand>,
    event_tx: Sender<ScreenshotEvent>,
) -> Engine {
    Engine::new(platform, persister, config, command_rx, event_tx)
}
