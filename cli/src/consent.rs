//! Terminal consent prompt.

use std::io::{self, BufRead, Write};

#[cfg(target_os = "linux")]
use tracing::warn;

#[cfg(target_os = "linux")]
use screenshot_capture::fbdev::projection::ConsentPrompt;

/// Asks on the controlling terminal before every capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsent;

/// Returns true if `answer` allows the capture.
pub fn answer_allows(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl TerminalConsent {
    fn prompt() -> io::Result<bool> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "Allow capturing the screen? [y/N] ")?;
        stderr.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer_allows(&answer))
    }
}

#[cfg(target_os = "linux")]
impl ConsentPrompt for TerminalConsent {
    fn ask(&self) -> bool {
        Self::prompt().unwrap_or_else(|e| {
            warn!("Consent prompt failed: {}", e);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_yes_allows() {
        assert!(answer_allows("y\n"));
        assert!(answer_allows(" YES "));
        assert!(!answer_allows("\n"));
        assert!(!answer_allows("no"));
        assert!(!answer_allows("yep"));
    }
}
