//! One-shot framebuffer mirror feeding a pixel sink.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tracing::{debug, warn};

use super::info::FramebufferInfo;
use crate::error::CaptureError;
use crate::frame::RawFrame;
use crate::projection::VirtualSurface;
use crate::sink::FrameProducer;
use crate::CaptureResult;

/// Virtual surface reading one composited frame from the framebuffer.
pub struct FramebufferMirror {
    worker: Option<JoinHandle<()>>,
}

impl FramebufferMirror {
    /// Start mirroring `device` into `producer`.
    ///
    /// The producer is dropped with the worker, so a failed read
    /// disconnects the sink instead of leaving it waiting.
    pub fn spawn(
        device: File,
        info: FramebufferInfo,
        producer: FrameProducer,
    ) -> CaptureResult<Self> {
        let worker = thread::Builder::new()
            .name("fbdev-mirror".into())
            .spawn(move || {
                if let Err(e) = mirror_once(&device, info, &producer) {
                    warn!("Framebuffer mirror failed: {}", e);
                }
            })?;

        Ok(Self {
            worker: Some(worker),
        })
    }
}

fn mirror_once(device: &File, info: FramebufferInfo, producer: &FrameProducer) -> CaptureResult<()> {
    let mut buffer = vec![0u8; info.frame_len()];
    device.read_exact_at(&mut buffer, info.frame_offset())?;

    bgrx_to_rgba(
        &mut buffer,
        info.width as usize,
        info.height as usize,
        info.pixel_stride() as usize,
        info.stride as usize,
    );

    let frame = RawFrame::new(Bytes::from(buffer), info.pixel_stride(), info.stride);
    if producer.try_submit(frame)? {
        debug!("Framebuffer frame delivered");
    }
    Ok(())
}

/// Rewrite little-endian XRGB8888 pixels as RGBA in place.
///
/// Only the visible `width × height` pixels are touched; row padding is
/// left as is.
pub fn bgrx_to_rgba(
    buffer: &mut [u8],
    width: usize,
    height: usize,
    pixel_stride: usize,
    row_stride: usize,
) {
    for row in buffer.chunks_mut(row_stride).take(height) {
        for pixel in row.chunks_mut(pixel_stride).take(width) {
            if pixel.len() >= 4 {
                pixel.swap(0, 2);
                pixel[3] = 0xFF;
            }
        }
    }
}

impl VirtualSurface for FramebufferMirror {
    fn release(&mut self) -> CaptureResult<()> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| CaptureError::release("virtual surface", "already released"))?;

        worker
            .join()
            .map_err(|_| CaptureError::release("virtual surface", "mirror thread panicked"))
    }
}
