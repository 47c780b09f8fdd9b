//! Command handlers.

use anyhow::{bail, Result};
use tracing::{debug, instrument};

use screenshot_ipc::{ScreenshotCommand, ScreenshotEvent, SUCCESS_MARKER};

use crate::exit_codes::ExitCode;
use crate::EngineHandle;

/// Take one screenshot.
#[instrument(skip(engine))]
pub fn take(engine: &EngineHandle, json: bool) -> Result<ExitCode> {
    debug!("take command");
    let request_id = engine.next_request_id();
    let event = engine.request(ScreenshotCommand::TakeScreenshot { request_id })?;
    report(&event, json)
}

/// Report whether capture is currently authorized.
#[instrument(skip(engine))]
pub fn check_permission(engine: &EngineHandle, json: bool) -> Result<ExitCode> {
    debug!("check-permission command");
    let request_id = engine.next_request_id();
    let event = engine.request(ScreenshotCommand::CheckPermission { request_id })?;
    report(&event, json)
}

fn report(event: &ScreenshotEvent, json: bool) -> Result<ExitCode> {
    let (line, code) = render(event, json)?;
    if code == ExitCode::Success {
        println!("{line}");
    } else {
        eprintln!("{line}");
    }
    Ok(code)
}

/// Format the event that resolved a request, and the exit code it maps to.
pub fn render(event: &ScreenshotEvent, json: bool) -> Result<(String, ExitCode)> {
    let (line, code) = match event {
        ScreenshotEvent::ScreenshotTaken { saved, .. } => (
            format!("{SUCCESS_MARKER}: {}", saved.location.display()),
            ExitCode::Success,
        ),
        ScreenshotEvent::ScreenshotFailed { error, .. } => {
            (error.to_string(), ExitCode::from(error.code))
        }
        ScreenshotEvent::PermissionStatus { granted, .. } => {
            let line = if *granted { "granted" } else { "not granted" };
            (line.to_string(), ExitCode::Success)
        }
        other => bail!("unexpected engine event {other:?}"),
    };

    if json {
        return Ok((serde_json::to_string(event)?, code));
    }

    Ok((line, code))
}
