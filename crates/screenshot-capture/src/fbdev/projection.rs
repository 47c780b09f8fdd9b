//! Consent and grants for framebuffer capture.

use std::fs::File;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::info::FramebufferDevice;
use super::mirror::FramebufferMirror;
use crate::error::CaptureError;
use crate::projection::{
    Authorization, CaptureGrant, ConsentOutcome, ConsentToken, ProjectionService,
    VirtualDisplayRequest, VirtualSurface,
};
use crate::sink::FrameProducer;
use crate::CaptureResult;

const TOKEN_PREFIX: &str = "fbdev-consent-";

/// Asks the user whether the screen may be captured.
pub trait ConsentPrompt: Send + Sync {
    /// Block until the user answers. `true` allows the capture.
    fn ask(&self) -> bool;

    /// Whether answers come from a person.
    fn is_interactive(&self) -> bool {
        true
    }
}

/// Prompt that allows every capture without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConsent;

impl ConsentPrompt for AutoConsent {
    fn ask(&self) -> bool {
        true
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Consent bookkeeping shared with prompt threads.
#[derive(Debug, Default)]
struct Issued {
    /// Sequence of the most recent consent request.
    latest: u64,

    /// Token granted for `latest`, until exchanged.
    token: Option<ConsentToken>,
}

/// Capture service backed by a Linux framebuffer device.
pub struct FramebufferProjection {
    device: FramebufferDevice,
    prompt: Arc<dyn ConsentPrompt>,
    authorization: Arc<Mutex<Authorization>>,
    next_token: AtomicU64,
    issued: Arc<Mutex<Issued>>,
}

impl FramebufferProjection {
    /// Create a capture service for `device`, consenting through `prompt`.
    pub fn new(device: FramebufferDevice, prompt: Arc<dyn ConsentPrompt>) -> Self {
        let initial = if prompt.is_interactive() {
            Authorization::NotDetermined
        } else {
            Authorization::NotRequired
        };

        Self {
            device,
            prompt,
            authorization: Arc::new(Mutex::new(initial)),
            next_token: AtomicU64::new(1),
            issued: Arc::new(Mutex::new(Issued::default())),
        }
    }
}

impl ProjectionService for FramebufferProjection {
    #[instrument(name = "fbdev_request_consent", skip(self))]
    fn request_consent(&mut self) -> CaptureResult<Receiver<ConsentOutcome>> {
        if !self.device.is_present() {
            return Err(CaptureError::ServiceUnavailable(format!(
                "framebuffer {} not available",
                self.device.device.display()
            )));
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let sequence = self.next_token.fetch_add(1, Ordering::SeqCst);
        let token = ConsentToken::new(format!("{TOKEN_PREFIX}{sequence}"));
        *self.issued.lock() = Issued {
            latest: sequence,
            token: None,
        };

        let prompt = Arc::clone(&self.prompt);
        let authorization = Arc::clone(&self.authorization);
        let issued = Arc::clone(&self.issued);
        let interactive = prompt.is_interactive();

        thread::Builder::new()
            .name("fbdev-consent".into())
            .spawn(move || {
                let allowed = prompt.ask();

                let outcome = {
                    let mut issued = issued.lock();
                    if issued.latest != sequence {
                        debug!(sequence, "Stale consent answer ignored");
                        return;
                    }
                    if allowed {
                        issued.token = Some(token.clone());
                        ConsentOutcome::Granted(token)
                    } else {
                        ConsentOutcome::Denied
                    }
                };

                if interactive {
                    *authorization.lock() = match outcome {
                        ConsentOutcome::Granted(_) => Authorization::Granted,
                        ConsentOutcome::Denied => Authorization::Denied,
                    };
                }

                if tx.send(outcome).is_err() {
                    debug!("Consent outcome dropped: requester went away");
                }
            })?;

        Ok(rx)
    }

    #[instrument(name = "fbdev_acquire_grant", skip_all)]
    fn acquire_grant(&mut self, token: ConsentToken) -> CaptureResult<Box<dyn CaptureGrant>> {
        // Tokens are single use.
        let issued = self.issued.lock().token.take();
        if issued.as_ref() != Some(&token) {
            return Err(CaptureError::GrantRejected(format!(
                "unknown consent token {}",
                token.as_str()
            )));
        }

        let file = File::open(&self.device.device).map_err(|e| {
            CaptureError::GrantRejected(format!(
                "cannot open {}: {}",
                self.device.device.display(),
                e
            ))
        })?;

        info!(device = %self.device.device.display(), "Capture grant acquired");
        Ok(Box::new(FramebufferGrant {
            device: self.device.clone(),
            file: Some(file),
        }))
    }

    fn authorization(&self) -> Authorization {
        *self.authorization.lock()
    }
}

/// Grant holding the framebuffer open.
pub struct FramebufferGrant {
    device: FramebufferDevice,
    file: Option<File>,
}

impl CaptureGrant for FramebufferGrant {
    fn create_virtual_display(
        &mut self,
        request: &VirtualDisplayRequest,
        producer: FrameProducer,
    ) -> CaptureResult<Box<dyn VirtualSurface>> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| CaptureError::BindingFailed("grant has been stopped".into()))?;

        let info = self
            .device
            .info()
            .map_err(|e| CaptureError::BindingFailed(e.to_string()))?;

        let requested = request.metrics.dimensions();
        if requested != (info.width, info.height) || producer.dimensions() != requested {
            return Err(CaptureError::BindingFailed(format!(
                "display is {}x{}, virtual display '{}' asked for {}x{}",
                info.width, info.height, request.name, requested.0, requested.1
            )));
        }

        let mirror = FramebufferMirror::spawn(file.try_clone()?, info, producer)?;
        debug!(name = %request.name, "Framebuffer mirror started");
        Ok(Box::new(mirror))
    }

    fn stop(&mut self) -> CaptureResult<()> {
        match self.file.take() {
            Some(_) => Ok(()),
            None => {
                warn!("Capture grant stopped twice");
                Err(CaptureError::release("capture grant", "already stopped"))
            }
        }
    }
}
