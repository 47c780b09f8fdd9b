//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Display service could not report metrics.
    #[error("Display unavailable: {0}")]
    DisplayUnavailable(String),

    /// Screen capture service is not available on this system.
    #[error("Capture service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Consent token was rejected when exchanging it for a grant.
    #[error("Capture grant rejected: {0}")]
    GrantRejected(String),

    /// Capture dimensions are zero or otherwise unusable.
    #[error("Invalid capture dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Grant, sink and display could not be bound together.
    #[error("Failed to bind capture session: {0}")]
    BindingFailed(String),

    /// The pixel sink has been closed.
    #[error("Pixel sink closed")]
    SinkClosed,

    /// The sink's producer was already handed to a surface.
    #[error("Pixel sink producer already taken")]
    ProducerTaken,

    /// Raw frame could not be decoded.
    #[error("Frame decode error: {0}")]
    Decode(String),

    /// A capture resource refused to release.
    #[error("Failed to release {resource}: {message}")]
    ReleaseFailed {
        resource: &'static str,
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Build a release failure for the named resource.
    pub fn release(resource: &'static str, message: impl Into<String>) -> Self {
        Self::ReleaseFailed {
            resource,
            message: message.into(),
        }
    }
}
