//! Main engine orchestrator.

use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, Receiver, RecvError, Sender};
use tracing::{debug, error, info, instrument, warn};

use screenshot_capture::{
    decode, provision_metrics, CaptureSession, ConsentOutcome, ConsentToken, DisplayMetrics,
    RawFrame,
};
use screenshot_ipc::{
    CaptureConfig, ErrorCode, PipelineState, RequestError, ScreenshotCommand, ScreenshotEvent,
};
use screenshot_store::ImagePersister;

use crate::state::SessionSlot;
use crate::Platform;

/// How long the loop sleeps when no deadline is pending.
const IDLE_TICK: Duration = Duration::from_millis(100);

enum Wake {
    Command(Result<ScreenshotCommand, RecvError>),
    Consent(Result<ConsentOutcome, RecvError>),
    Frame(Result<RawFrame, RecvError>),
    Tick,
}

/// The screenshot engine.
///
/// Serves one capture request at a time from a single thread. Consent
/// outcomes, frames, commands and deadlines are all handled by the same
/// loop, so pipeline state is never touched concurrently.
pub struct Engine {
    command_rx: Receiver<ScreenshotCommand>,
    event_tx: Sender<ScreenshotEvent>,
    platform: Platform,
    persister: ImagePersister,
    config: CaptureConfig,
    metrics: DisplayMetrics,
    state: PipelineState,
    consent_rx: Option<Receiver<ConsentOutcome>>,
    session: SessionSlot,
    deadline: Option<Instant>,
}

impl Engine {
    /// Create a new engine.
    ///
    /// Display metrics are read here, once.
    pub fn new(
        platform: Platform,
        persister: ImagePersister,
        config: CaptureConfig,
        command_rx: Receiver<ScreenshotCommand>,
        event_tx: Sender<ScreenshotEvent>,
    ) -> Self {
        let metrics = provision_metrics(platform.display.as_ref());

        Self {
            command_rx,
            event_tx,
            platform,
            persister,
            config,
            metrics,
            state: PipelineState::Idle,
            consent_rx: None,
            session: SessionSlot::new(),
            deadline: None,
        }
    }

    /// Current pipeline state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Metrics captured at construction.
    pub fn metrics(&self) -> DisplayMetrics {
        self.metrics
    }

    /// Run the engine (blocking).
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.send_event(ScreenshotEvent::Ready);

        loop {
            match self.next_wake() {
                Wake::Command(Ok(command)) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Wake::Command(Err(_)) => {
                    info!("Command channel disconnected, shutting down");
                    self.abort_outstanding();
                    break;
                }
                Wake::Consent(outcome) => self.on_consent(outcome.ok()),
                Wake::Frame(frame) => self.on_frame(frame),
                Wake::Tick => self.check_deadline(),
            }
        }

        info!("Engine stopped");
    }

    fn next_wake(&self) -> Wake {
        let consent_rx = self.consent_rx.clone().unwrap_or_else(never);
        let frame_rx = self.session.frames().unwrap_or_else(never);
        let timeout = self
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_TICK);

        select! {
            recv(self.command_rx) -> command => Wake::Command(command),
            recv(consent_rx) -> outcome => Wake::Consent(outcome),
            recv(frame_rx) -> frame => Wake::Frame(frame),
            default(timeout) => Wake::Tick,
        }
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: ScreenshotCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            ScreenshotCommand::TakeScreenshot { request_id } => self.take_screenshot(request_id),
            ScreenshotCommand::CheckPermission { request_id } => self.check_permission(request_id),
            ScreenshotCommand::GetState => self.send_state(),
            ScreenshotCommand::Shutdown => {
                self.abort_outstanding();
                self.send_event(ScreenshotEvent::Shutdown);
                return false;
            }
        }

        true
    }

    /// Start a capture attempt by running the consent flow.
    #[instrument(name = "take_screenshot", skip(self))]
    fn take_screenshot(&mut self, request_id: u64) {
        if let Some(outstanding) = self.state.request_id() {
            warn!(outstanding, "Capture already in progress");
            self.send_event(ScreenshotEvent::ScreenshotFailed {
                request_id,
                error: RequestError::busy(outstanding),
            });
            return;
        }

        info!("Requesting screen capture consent");
        match self.platform.projection.request_consent() {
            Ok(consent_rx) => {
                self.consent_rx = Some(consent_rx);
                self.deadline = deadline_after(self.config.consent_timeout());
                self.transition_to(PipelineState::AwaitingConsent { request_id });
            }
            Err(e) => {
                error!("Failed to request consent: {}", e);
                self.send_event(ScreenshotEvent::ScreenshotFailed {
                    request_id,
                    error: RequestError::generic(format!("Failed to request permission: {e}")),
                });
            }
        }
    }

    fn on_consent(&mut self, outcome: Option<ConsentOutcome>) {
        self.consent_rx = None;
        self.deadline = None;

        let PipelineState::AwaitingConsent { request_id } = self.state else {
            debug!("Consent outcome with no pending request, ignoring");
            return;
        };

        match outcome {
            Some(ConsentOutcome::Granted(token)) => self.begin_capture(request_id, token),
            Some(ConsentOutcome::Denied) => {
                info!(request_id, "Screen capture consent denied");
                self.fail(request_id, RequestError::permission_denied());
            }
            None => {
                warn!(request_id, "Consent flow ended without an outcome");
                self.fail(
                    request_id,
                    RequestError::generic("Consent flow ended without an outcome"),
                );
            }
        }
    }

    /// Exchange the consent token for a grant and bind the capture session.
    #[instrument(name = "begin_capture", skip(self, token))]
    fn begin_capture(&mut self, request_id: u64, token: ConsentToken) {
        let grant = match self.platform.projection.acquire_grant(token) {
            Ok(grant) => grant,
            Err(e) => {
                error!("Failed to acquire capture grant: {}", e);
                self.fail(
                    request_id,
                    RequestError::generic(format!("Failed to start capture: {e}")),
                );
                return;
            }
        };

        match CaptureSession::start(grant, self.metrics, &self.config.virtual_display_name) {
            Ok(session) => {
                self.session.install(session);
                self.deadline = deadline_after(self.config.frame_timeout());
                self.transition_to(PipelineState::Capturing { request_id });
            }
            Err(e) => {
                error!("Failed to start capture session: {}", e);
                self.fail(
                    request_id,
                    RequestError::generic(format!("Failed to start capture: {e}")),
                );
            }
        }
    }

    /// Decode and store the delivered frame.
    fn on_frame(&mut self, frame: Result<RawFrame, RecvError>) {
        self.deadline = None;

        let PipelineState::Capturing { request_id } = self.state else {
            debug!("Frame with no pending capture, releasing session");
            self.session.cleanup();
            return;
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(_) => {
                self.fail(request_id, RequestError::generic("Frame source closed"));
                return;
            }
        };

        self.transition_to(PipelineState::Processing { request_id });

        let (width, height) = self.metrics.dimensions();
        let decoded = decode(&frame, width, height);
        drop(frame);

        // The frame is in hand; nothing else is read from the session.
        self.session.cleanup();

        let image = match decoded {
            Ok(image) => image,
            Err(e) => {
                error!(request_id, "Failed to decode frame: {}", e);
                self.fail(
                    request_id,
                    RequestError::generic(format!("Failed to process image: {e}")),
                );
                return;
            }
        };

        match self.persister.save(&image) {
            Ok(saved) => {
                info!(request_id, file = %saved.file_name, "Screenshot stored");
                self.transition_to(PipelineState::Idle);
                self.send_event(ScreenshotEvent::ScreenshotTaken { request_id, saved });
            }
            Err(e) => {
                self.fail(
                    request_id,
                    RequestError::generic(format!("Failed to save image: {e}")),
                );
            }
        }
    }

    fn check_deadline(&mut self) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }

        let Some(request_id) = self.state.request_id() else {
            self.deadline = None;
            return;
        };

        let waiting_for = if self.state.is_awaiting_consent() {
            "consent"
        } else {
            "frame"
        };
        warn!(request_id, waiting_for, "Capture attempt timed out");
        self.fail(
            request_id,
            RequestError::new(
                ErrorCode::Timeout,
                format!("Timed out waiting for {waiting_for}"),
            ),
        );
    }

    fn check_permission(&self, request_id: u64) {
        let authorization = self.platform.projection.authorization();
        debug!(?authorization, "Permission check");
        self.send_event(ScreenshotEvent::PermissionStatus {
            request_id,
            granted: authorization.allows_capture(),
        });
    }

    /// Fail whatever request is outstanding, if any.
    fn abort_outstanding(&mut self) {
        if let Some(request_id) = self.state.request_id() {
            self.fail(request_id, RequestError::generic("Engine shutting down"));
        } else {
            self.session.cleanup();
        }
    }

    /// Release everything, return to idle, then report `error`.
    fn fail(&mut self, request_id: u64, error: RequestError) {
        self.consent_rx = None;
        self.deadline = None;
        self.session.cleanup();

        if !self.state.is_idle() {
            self.transition_to(PipelineState::Idle);
        }

        warn!(request_id, code = %error.code, "Capture request failed: {}", error.message);
        self.send_event(ScreenshotEvent::ScreenshotFailed { request_id, error });
    }

    fn send_state(&self) {
        self.send_event(ScreenshotEvent::StateChanged {
            previous: self.state,
            current: self.state,
        });
    }

    fn transition_to(&mut self, new_state: PipelineState) {
        let previous = std::mem::replace(&mut self.state, new_state);

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.send_event(ScreenshotEvent::StateChanged {
            previous,
            current: new_state,
        });
    }

    fn send_event(&self, event: ScreenshotEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|timeout| Instant::now() + timeout)
}
