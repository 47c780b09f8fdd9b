//! Process exit codes.

use screenshot_ipc::ErrorCode;

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed successfully.
    Success = 0,
    /// General/unspecified error.
    GeneralError = 1,
    /// Screen capture consent was refused.
    PermissionDenied = 3,
    /// Another capture was still outstanding.
    Busy = 4,
    /// Consent or frame did not arrive in time.
    Timeout = 5,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ErrorCode> for ExitCode {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Error => Self::GeneralError,
            ErrorCode::PermissionDenied => Self::PermissionDenied,
            ErrorCode::Busy => Self::Busy,
            ErrorCode::Timeout => Self::Timeout,
        }
    }
}
