//! Command-line front end for the screenshot pipeline.
//!
//! Runs the engine on a background thread and drives it over the IPC
//! channels, one request at a time.

pub mod commands;
pub mod config;
pub mod consent;
pub mod exit_codes;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screenshot_engine::{create_engine, Platform};
use screenshot_ipc::{
    command_channel, event_channel, CaptureConfig, ScreenshotCommand, ScreenshotEvent,
};
use screenshot_store::{FsMediaIndex, ImagePersister, LogMediaScanner};

/// Initialize logging to stderr.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "screenshot=debug,screenshot_cli=debug,screenshot_engine=debug,screenshot_capture=debug,screenshot_store=debug"
    } else {
        "screenshot=info,screenshot_cli=info,screenshot_engine=info,screenshot_capture=warn,screenshot_store=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Where and how to capture.
#[derive(Debug, Clone)]
pub struct CaptureTarget {
    /// Framebuffer device node.
    pub device: PathBuf,

    /// Allow captures without prompting.
    pub assume_yes: bool,
}

impl Default for CaptureTarget {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/fb0"),
            assume_yes: false,
        }
    }
}

/// Build the OS services for `target`.
#[cfg(target_os = "linux")]
pub fn build_platform(target: &CaptureTarget) -> Result<Platform> {
    use std::sync::Arc;

    use screenshot_capture::fbdev::info::FramebufferDevice;
    use screenshot_capture::fbdev::projection::{AutoConsent, ConsentPrompt, FramebufferProjection};

    let name = target
        .device
        .file_name()
        .ok_or_else(|| anyhow!("invalid framebuffer device {}", target.device.display()))?;
    let device = FramebufferDevice {
        device: target.device.clone(),
        sysfs_dir: PathBuf::from("/sys/class/graphics").join(name),
        ..Default::default()
    };

    let prompt: Arc<dyn ConsentPrompt> = if target.assume_yes {
        Arc::new(AutoConsent)
    } else {
        Arc::new(consent::TerminalConsent)
    };

    Ok(Platform {
        display: Box::new(device.clone()),
        projection: Box::new(FramebufferProjection::new(device, prompt)),
    })
}

/// Build the OS services for `target`.
#[cfg(not(target_os = "linux"))]
pub fn build_platform(_target: &CaptureTarget) -> Result<Platform> {
    Err(anyhow!("no screen capture backend for this platform"))
}

/// Build the persister described by `config`.
pub fn build_persister(config: &CaptureConfig) -> Result<ImagePersister> {
    let pictures_dir = match &config.pictures_dir {
        Some(dir) => dir.clone(),
        None => screenshot_store::default_pictures_dir()?,
    };
    let config = CaptureConfig {
        pictures_dir: Some(pictures_dir.clone()),
        ..config.clone()
    };

    ImagePersister::from_config(
        &config,
        Box::new(FsMediaIndex::new(pictures_dir)),
        Box::new(LogMediaScanner),
    )
    .context("failed to prepare image storage")
}

/// A running engine and the channels to it.
pub struct EngineHandle {
    command_tx: Sender<ScreenshotCommand>,
    event_rx: Receiver<ScreenshotEvent>,
    engine: Option<JoinHandle<()>>,
    next_request_id: AtomicU64,
}

impl EngineHandle {
    /// Start the engine on its own thread.
    pub fn spawn(
        platform: Platform,
        persister: ImagePersister,
        config: CaptureConfig,
    ) -> Result<Self> {
        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();

        let engine = thread::Builder::new()
            .name("screenshot-engine".into())
            .spawn(move || {
                info!("Engine thread starting");
                let mut engine = create_engine(platform, persister, config, command_rx, event_tx);
                engine.run();
                info!("Engine thread stopped");
            })
            .context("failed to start engine thread")?;

        Ok(Self {
            command_tx,
            event_rx,
            engine: Some(engine),
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Allocate an id for the next request.
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send `command` and wait for the event that resolves it.
    pub fn request(&self, command: ScreenshotCommand) -> Result<ScreenshotEvent> {
        let request_id = command
            .request_id()
            .ok_or_else(|| anyhow!("{command:?} does not expect an answer"))?;

        self.command_tx
            .send(command)
            .map_err(|e| anyhow!("Failed to send command: {}", e))?;

        loop {
            let event = self
                .event_rx
                .recv()
                .context("engine stopped before answering")?;

            match event {
                ScreenshotEvent::StateChanged { previous, current } => {
                    debug!(previous = %previous.name(), current = %current.name(), "Engine state");
                }
                event if event.request_id() == Some(request_id) => return Ok(event),
                other => debug!(?other, "Skipping event"),
            }
        }
    }

    /// Stop the engine and wait for its thread.
    pub fn shutdown(mut self) {
        if self.command_tx.send(ScreenshotCommand::Shutdown).is_ok() {
            while let Ok(event) = self.event_rx.recv() {
                if matches!(event, ScreenshotEvent::Shutdown) {
                    break;
                }
            }
        }

        if let Some(engine) = self.engine.take() {
            let _ = engine.join();
        }
    }
}
