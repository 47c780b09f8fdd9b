//! Pipeline state machine types.

use serde::{Deserialize, Serialize};

/// The current state of the capture pipeline.
///
/// `Idle → AwaitingConsent → Capturing → Processing → Idle`. Denial,
/// failure or timeout at any stage returns straight to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// No capture attempt is outstanding.
    #[default]
    Idle,

    /// The external consent flow is running.
    AwaitingConsent {
        /// Request being served.
        request_id: u64,
    },

    /// A session is bound and waiting for its frame.
    Capturing {
        /// Request being served.
        request_id: u64,
    },

    /// The frame is being decoded and persisted.
    Processing {
        /// Request being served.
        request_id: u64,
    },
}

impl PipelineState {
    /// Returns true if no attempt is outstanding.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a capture attempt is outstanding.
    pub fn is_busy(&self) -> bool {
        !self.is_idle()
    }

    /// Returns true while the consent flow is running.
    pub fn is_awaiting_consent(&self) -> bool {
        matches!(self, Self::AwaitingConsent { .. })
    }

    /// Returns true while waiting for the frame.
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    /// Returns the outstanding request id, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::AwaitingConsent { request_id }
            | Self::Capturing { request_id }
            | Self::Processing { request_id } => Some(*request_id),
        }
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AwaitingConsent { .. } => "AwaitingConsent",
            Self::Capturing { .. } => "Capturing",
            Self::Processing { .. } => "Processing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_has_no_request() {
        let state = PipelineState::default();
        assert!(state.is_idle());
        assert!(!state.is_busy());
        assert_eq!(state.request_id(), None);
    }

    #[test]
    fn test_busy_states_carry_request_id() {
        for state in [
            PipelineState::AwaitingConsent { request_id: 7 },
            PipelineState::Capturing { request_id: 7 },
            PipelineState::Processing { request_id: 7 },
        ] {
            assert!(state.is_busy());
            assert_eq!(state.request_id(), Some(7));
        }
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PipelineState::Idle.name(), "Idle");
        assert_eq!(
            PipelineState::AwaitingConsent { request_id: 1 }.name(),
            "AwaitingConsent"
        );
        assert_eq!(PipelineState::Capturing { request_id: 1 }.name(), "Capturing");
    }
}
