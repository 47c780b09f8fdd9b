//! Capture resource ownership and cleanup tracking.

use crossbeam_channel::Receiver;
use tracing::{debug, instrument, warn};

use screenshot_capture::{CaptureSession, CleanupReport, RawFrame};

/// Holds the capture session of the outstanding request, if any.
///
/// Every path out of a capture attempt goes through [`SessionSlot::cleanup`];
/// dropping the slot cleans up as well, so resources never outlive the
/// engine.
#[derive(Default)]
pub struct SessionSlot {
    session: Option<CaptureSession>,
}

impl SessionSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly started session.
    ///
    /// A session already in the slot is cleaned up first.
    pub fn install(&mut self, session: CaptureSession) {
        if self.session.is_some() {
            warn!("Replacing a capture session that was never cleaned up");
            self.cleanup();
        }
        self.session = Some(session);
        debug!("Capture session installed");
    }

    /// Returns true if no session is held.
    pub fn is_empty(&self) -> bool {
        self.session.is_none()
    }

    /// Frame receiver of the held session.
    pub fn frames(&self) -> Option<Receiver<RawFrame>> {
        self.session
            .as_ref()
            .and_then(CaptureSession::frames)
            .cloned()
    }

    /// Release the held session's resources and empty the slot.
    ///
    /// Calling this on an empty slot does nothing.
    #[instrument(name = "release_session", skip(self))]
    pub fn cleanup(&mut self) -> CleanupReport {
        match self.session.take() {
            Some(mut session) => session.cleanup(),
            None => CleanupReport::default(),
        }
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.cleanup();
    }
}
