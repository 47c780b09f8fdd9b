//! Single-shot display capture.
//!
//! This crate provides the pieces of one screen capture: display metrics,
//! the consent/grant seam to the OS, a one-frame pixel sink, the session
//! binding them together, and decoding of the stride-padded frame.

mod display;
mod error;
#[cfg(target_os = "linux")]
pub mod fbdev;
mod frame;
mod projection;
mod session;
mod sink;

pub use display::{provision_metrics, DisplayMetrics, DisplayService};
pub use error::CaptureError;
pub use frame::{decode, RawFrame, BYTES_PER_PIXEL};
pub use projection::{
    Authorization, CaptureGrant, ConsentOutcome, ConsentToken, ProjectionService,
    VirtualDisplayRequest, VirtualSurface,
};
pub use session::{CaptureSession, CleanupReport};
pub use sink::{FrameProducer, PixelFormat, PixelSink, SINK_BUFFER_DEPTH};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
