//! Framebuffer geometry from sysfs.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::display::{DisplayMetrics, DisplayService};
use crate::error::CaptureError;
use crate::CaptureResult;

/// Default framebuffer device node.
pub const DEFAULT_DEVICE: &str = "/dev/fb0";

/// Default sysfs directory describing [`DEFAULT_DEVICE`].
pub const DEFAULT_SYSFS_DIR: &str = "/sys/class/graphics/fb0";

/// Density reported when the framebuffer does not expose one.
pub const DEFAULT_DENSITY_DPI: u32 = 96;

/// Location of a framebuffer device and its sysfs attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDevice {
    /// Device node read for pixel data.
    pub device: PathBuf,

    /// sysfs directory holding `virtual_size`, `stride`, `bits_per_pixel`,
    /// and optionally `modes` and `pan`.
    pub sysfs_dir: PathBuf,

    /// Density to report for this display.
    pub density_dpi: u32,
}

impl Default for FramebufferDevice {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            sysfs_dir: PathBuf::from(DEFAULT_SYSFS_DIR),
            density_dpi: DEFAULT_DENSITY_DPI,
        }
    }
}

impl FramebufferDevice {
    /// Read the current geometry.
    pub fn info(&self) -> CaptureResult<FramebufferInfo> {
        FramebufferInfo::read(&self.sysfs_dir)
    }

    /// Returns true if the device and its attributes are present.
    pub fn is_present(&self) -> bool {
        self.device.exists() && self.sysfs_dir.is_dir()
    }
}

impl DisplayService for FramebufferDevice {
    fn primary_metrics(&self) -> CaptureResult<DisplayMetrics> {
        let info = self
            .info()
            .map_err(|e| CaptureError::DisplayUnavailable(e.to_string()))?;
        Ok(DisplayMetrics::new(info.width, info.height, self.density_dpi))
    }
}

/// Framebuffer geometry.
///
/// The virtual area can be larger than what is shown, e.g. two pages on a
/// double-buffered framebuffer. `width` and `height` describe the visible
/// mode and `y_offset` the first visible row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferInfo {
    /// Visible width in pixels.
    pub width: u32,

    /// Visible height in pixels.
    pub height: u32,

    /// Height of the whole virtual area in rows.
    pub virtual_height: u32,

    /// First visible row within the virtual area.
    pub y_offset: u32,

    /// Bits per pixel.
    pub bits_per_pixel: u32,

    /// Bytes per row, including alignment padding.
    pub stride: u32,
}

impl FramebufferInfo {
    /// Read geometry from a sysfs directory.
    pub fn read(sysfs_dir: &Path) -> CaptureResult<Self> {
        let attr = |name: &str| fs::read_to_string(sysfs_dir.join(name));
        let mut info = Self::parse(
            &attr("virtual_size")?,
            &attr("bits_per_pixel")?,
            &attr("stride")?,
        )?;
        if let Ok(modes) = attr("modes") {
            info = info.with_mode(&modes);
        }
        if let Ok(pan) = attr("pan") {
            info = info.with_pan(&pan);
        }
        debug!(?info, dir = %sysfs_dir.display(), "Read framebuffer geometry");
        Ok(info)
    }

    /// Parse the raw sysfs attribute values.
    ///
    /// The whole virtual area is taken as visible until refined by
    /// [`FramebufferInfo::with_mode`].
    pub fn parse(virtual_size: &str, bits_per_pixel: &str, stride: &str) -> CaptureResult<Self> {
        let (width, height) = virtual_size
            .trim()
            .split_once(',')
            .ok_or_else(|| invalid("virtual_size", virtual_size))?;

        let info = Self {
            width: parse_u32("virtual_size", width)?,
            height: parse_u32("virtual_size", height)?,
            virtual_height: parse_u32("virtual_size", height)?,
            y_offset: 0,
            bits_per_pixel: parse_u32("bits_per_pixel", bits_per_pixel)?,
            stride: parse_u32("stride", stride)?,
        };

        if info.bits_per_pixel != 32 {
            return Err(CaptureError::ServiceUnavailable(format!(
                "unsupported framebuffer depth: {} bits per pixel",
                info.bits_per_pixel
            )));
        }

        Ok(info)
    }

    /// Narrow to the current video mode, the first line of the `modes`
    /// attribute (e.g. `U:1920x1080p-60`).
    ///
    /// Modes that do not fit the virtual area are ignored.
    pub fn with_mode(self, modes: &str) -> Self {
        let Some((width, height)) = modes.lines().next().and_then(parse_mode) else {
            debug!(modes = modes.trim(), "No usable framebuffer mode");
            return self;
        };

        if width == 0 || height == 0 || width > self.width || height > self.virtual_height {
            debug!(width, height, "Framebuffer mode outside virtual area, ignored");
            return self;
        }

        Self {
            width,
            height,
            ..self
        }
    }

    /// Apply the panning offset from the `pan` attribute (`x,y`).
    pub fn with_pan(self, pan: &str) -> Self {
        let y_offset = pan
            .trim()
            .split_once(',')
            .and_then(|(_, y)| y.trim().parse::<u32>().ok());

        match y_offset {
            Some(y) if y.checked_add(self.height).is_some_and(|end| end <= self.virtual_height) => {
                Self {
                    y_offset: y,
                    ..self
                }
            }
            _ => self,
        }
    }

    /// Bytes between horizontally adjacent pixels.
    pub fn pixel_stride(&self) -> u32 {
        self.bits_per_pixel / 8
    }

    /// Bytes to read for one visible frame.
    pub fn frame_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Device offset of the first visible row.
    pub fn frame_offset(&self) -> u64 {
        u64::from(self.stride) * u64::from(self.y_offset)
    }
}

/// `U:1920x1080p-60` → `(1920, 1080)`.
fn parse_mode(line: &str) -> Option<(u32, u32)> {
    let (_, mode) = line.trim().split_once(':')?;
    let (width, rest) = mode.split_once('x')?;
    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some((width.parse().ok()?, rest[..digits].parse().ok()?))
}

fn parse_u32(attribute: &'static str, value: &str) -> CaptureResult<u32> {
    value.trim().parse().map_err(|_| invalid(attribute, value))
}

fn invalid(attribute: &'static str, value: &str) -> CaptureError {
    CaptureError::DisplayUnavailable(format!(
        "malformed framebuffer {attribute}: {:?}",
        value.trim()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sysfs_values() {
        let info = FramebufferInfo::parse("1920,1080\n", "32\n", "7680\n").unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.pixel_stride(), 4);
        assert_eq!(info.frame_len(), 7680 * 1080);
    }

    #[test]
    fn test_double_buffered_uses_visible_page() {
        let info = FramebufferInfo::parse("1920,2160\n", "32\n", "7680\n")
            .unwrap()
            .with_mode("U:1920x1080p-60\n")
            .with_pan("0,1080\n");

        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.virtual_height, 2160);
        assert_eq!(info.frame_len(), 7680 * 1080);
        assert_eq!(info.frame_offset(), 7680 * 1080);
    }

    #[test]
    fn test_unusable_mode_and_pan_are_ignored() {
        let base = FramebufferInfo::parse("800,480", "32", "3200").unwrap();
        assert_eq!(base.with_mode("garbage"), base);
        assert_eq!(base.with_mode("U:1024x768p-60"), base);
        assert_eq!(base.with_pan("0,100"), base);
        assert_eq!(base.with_mode("S:640x480p-60").width, 640);
    }

    #[test]
    fn test_parse_rejects_malformed_size() {
        assert!(matches!(
            FramebufferInfo::parse("1920x1080", "32", "7680"),
            Err(CaptureError::DisplayUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_rejects_16_bit_framebuffer() {
        assert!(matches!(
            FramebufferInfo::parse("800,480", "16", "1600"),
            Err(CaptureError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_sysfs_reports_display_unavailable() {
        let device = FramebufferDevice {
            sysfs_dir: PathBuf::from("/nonexistent/graphics/fb9"),
            ..Default::default()
        };
        assert!(matches!(
            device.primary_metrics(),
            Err(CaptureError::DisplayUnavailable(_))
        ));
    }
}
