//! PNG encoding and screenshot naming.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use tracing::debug;

use crate::error::StoreError;
use crate::StoreResult;

/// MIME type recorded for stored screenshots.
pub const PNG_MIME_TYPE: &str = "image/png";

/// Encoder quality, on a 0-100 scale. PNG is lossless at any setting.
pub const PNG_QUALITY: u8 = 100;

/// Screenshot file name for `timestamp`: `Screenshot_<yyyyMMdd_HHmmss>.png`.
pub fn screenshot_file_name<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("Screenshot_{}.png", timestamp.format("%Y%m%d_%H%M%S"))
}

fn compression_for(quality: u8) -> CompressionType {
    match quality {
        0..=33 => CompressionType::Fast,
        34..=66 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encode an RGBA image as PNG.
pub fn encode_png(image: &RgbaImage) -> StoreResult<Vec<u8>> {
    let (width, height) = image.dimensions();
    let mut png = Vec::new();

    PngEncoder::new_with_quality(&mut png, compression_for(PNG_QUALITY), FilterType::Adaptive)
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| StoreError::Encode(e.to_string()))?;

    debug!(width, height, bytes = png.len(), "Encoded PNG");
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::{ImageFormat, Rgba};

    #[test]
    fn test_file_name_format() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            screenshot_file_name(&timestamp),
            "Screenshot_20240305_140709.png"
        );
    }

    #[test]
    fn test_png_is_lossless() {
        let image = RgbaImage::from_fn(5, 3, |x, y| Rgba([x as u8 * 40, y as u8 * 80, 7, 255]));
        let png = encode_png(&image).unwrap();

        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_max_quality_uses_best_compression() {
        assert!(matches!(compression_for(PNG_QUALITY), CompressionType::Best));
        assert!(matches!(compression_for(0), CompressionType::Fast));
    }
}
