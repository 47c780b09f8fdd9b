//! Capture capability: consent, grants and virtual surfaces.
//!
//! These traits are the seams to the host OS. A [`ProjectionService`]
//! runs the consent flow and exchanges its token for a single-use
//! [`CaptureGrant`]; the grant mirrors the display into a sink through a
//! [`VirtualSurface`].

use crossbeam_channel::Receiver;

use crate::display::DisplayMetrics;
use crate::sink::FrameProducer;
use crate::CaptureResult;

/// Opaque proof of one user consent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentToken(String);

impl ConsentToken {
    /// Wrap a backend-specific token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Backend-specific token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of the external consent flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// The user allowed the capture.
    Granted(ConsentToken),

    /// The user refused, or the prompt was dismissed.
    Denied,
}

/// Current screen capture authorization as known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Consent was given and still applies.
    Granted,

    /// Consent was refused.
    Denied,

    /// The user has not been asked yet, or every capture asks again.
    NotDetermined,

    /// The backend does not gate capture behind consent.
    NotRequired,
}

impl Authorization {
    /// Returns true if a capture can proceed without being refused.
    pub fn allows_capture(self) -> bool {
        matches!(self, Self::Granted | Self::NotRequired)
    }
}

/// Parameters for the mirroring virtual display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDisplayRequest {
    /// Display name shown by the OS.
    pub name: String,

    /// Size and density of the mirror.
    pub metrics: DisplayMetrics,

    /// Mirror the primary display's content automatically.
    pub auto_mirror: bool,
}

/// OS screen capture service.
pub trait ProjectionService: Send {
    /// Start the consent flow.
    ///
    /// The outcome is delivered later on the returned receiver. An error
    /// means the flow could not be started at all.
    fn request_consent(&mut self) -> CaptureResult<Receiver<ConsentOutcome>>;

    /// Exchange a consent token for a capture grant.
    fn acquire_grant(&mut self, token: ConsentToken) -> CaptureResult<Box<dyn CaptureGrant>>;

    /// Current authorization state.
    fn authorization(&self) -> Authorization;
}

/// Single-use authorization to mirror the display.
pub trait CaptureGrant: Send {
    /// Create a virtual display routing composited frames into `producer`.
    fn create_virtual_display(
        &mut self,
        request: &VirtualDisplayRequest,
        producer: FrameProducer,
    ) -> CaptureResult<Box<dyn VirtualSurface>>;

    /// Revoke the grant.
    fn stop(&mut self) -> CaptureResult<()>;
}

/// OS-managed mirror of the display.
pub trait VirtualSurface: Send {
    /// Stop mirroring and free the surface.
    fn release(&mut self) -> CaptureResult<()>;
}
