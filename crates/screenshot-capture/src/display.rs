//! Display metrics and capture surface provisioning.

use tracing::{error, info};

use crate::CaptureResult;

/// Pixel dimensions and density of the display being captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayMetrics {
    /// Width in pixels.
    pub width_pixels: u32,

    /// Height in pixels.
    pub height_pixels: u32,

    /// Density in dots per inch.
    pub density_dpi: u32,
}

impl DisplayMetrics {
    /// Create new display metrics.
    pub fn new(width_pixels: u32, height_pixels: u32, density_dpi: u32) -> Self {
        Self {
            width_pixels,
            height_pixels,
            density_dpi,
        }
    }

    /// Metrics left behind when the display could not be queried.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns true if every field is non-zero.
    pub fn is_valid(&self) -> bool {
        self.width_pixels > 0 && self.height_pixels > 0 && self.density_dpi > 0
    }

    /// Get the dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width_pixels, self.height_pixels)
    }
}

/// Source of the active display's metrics.
pub trait DisplayService: Send {
    /// Query the primary display.
    fn primary_metrics(&self) -> CaptureResult<DisplayMetrics>;
}

/// Read the primary display's metrics once.
///
/// Never fails: when the display service is unavailable the error is
/// logged and zeroed metrics are returned, which a capture session will
/// later refuse.
pub fn provision_metrics(display: &dyn DisplayService) -> DisplayMetrics {
    match display.primary_metrics() {
        Ok(metrics) => {
            info!(
                "Display initialized: {}x{}, density: {}",
                metrics.width_pixels, metrics.height_pixels, metrics.density_dpi
            );
            metrics
        }
        Err(e) => {
            error!("Failed to initialize display metrics: {}", e);
            DisplayMetrics::zero()
        }
    }
}
