//! Raw frame types and stride-aware decoding.

use bytes::Bytes;
use image::{imageops, RgbaImage};
use tracing::{debug, trace};

use crate::error::CaptureError;
use crate::CaptureResult;

/// Bytes of colour data per pixel in a 32-bit RGBA frame.
pub const BYTES_PER_PIXEL: u32 = 4;

/// A raw frame as delivered by the pixel sink.
///
/// Rows may be longer than `width * pixel_stride`; the surplus is
/// alignment padding and is not part of the image.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Pixel data, row after row.
    pub buffer: Bytes,

    /// Distance in bytes between horizontally adjacent pixels.
    pub pixel_stride: u32,

    /// Distance in bytes between vertically adjacent pixels.
    pub row_stride: u32,
}

impl RawFrame {
    /// Create a new raw frame.
    pub fn new(buffer: Bytes, pixel_stride: u32, row_stride: u32) -> Self {
        Self {
            buffer,
            pixel_stride,
            row_stride,
        }
    }

    /// Padding bytes at the end of each row for an image `width` pixels wide.
    pub fn row_padding(&self, width: u32) -> Option<u32> {
        self.row_stride
            .checked_sub(self.pixel_stride.checked_mul(width)?)
    }

    /// Smallest buffer able to hold `height` rows of `width` pixels.
    ///
    /// The last row does not need its padding.
    pub fn min_buffer_len(&self, width: u32, height: u32) -> Option<usize> {
        let content = (self.pixel_stride as usize).checked_mul(width as usize)?;
        let leading_rows = (self.row_stride as usize).checked_mul(height.checked_sub(1)? as usize)?;
        leading_rows.checked_add(content)
    }
}

/// Decode a raw frame into an exact `target_width × target_height` image.
///
/// The frame is first copied into a working image wide enough to hold the
/// row padding, then cropped back to the requested size so no padding
/// column survives.
pub fn decode(frame: &RawFrame, target_width: u32, target_height: u32) -> CaptureResult<RgbaImage> {
    if target_width == 0 || target_height == 0 {
        return Err(CaptureError::InvalidDimensions {
            width: target_width,
            height: target_height,
        });
    }

    let pixel_stride = frame.pixel_stride;
    if pixel_stride == 0 {
        return Err(CaptureError::Decode("pixel stride is zero".into()));
    }
    if pixel_stride < BYTES_PER_PIXEL {
        return Err(CaptureError::Decode(format!(
            "pixel stride {pixel_stride} cannot hold a 32-bit RGBA pixel"
        )));
    }

    let row_padding = frame.row_padding(target_width).ok_or_else(|| {
        CaptureError::Decode(format!(
            "row stride {} is shorter than {} pixels of stride {}",
            frame.row_stride, target_width, pixel_stride
        ))
    })?;

    let required = frame
        .min_buffer_len(target_width, target_height)
        .ok_or_else(|| CaptureError::Decode("stride arithmetic overflows".into()))?;
    if frame.buffer.len() < required {
        return Err(CaptureError::Decode(format!(
            "buffer holds {} bytes, stride layout needs {}",
            frame.buffer.len(),
            required
        )));
    }

    let padded_width = target_width + row_padding / pixel_stride;
    debug!(
        target_width,
        target_height,
        padded_width,
        row_padding,
        pixel_stride,
        "Decoding frame"
    );

    let mut working = RgbaImage::new(padded_width, target_height);
    let row_stride = frame.row_stride as usize;
    let pixel_stride = pixel_stride as usize;
    let bpp = BYTES_PER_PIXEL as usize;

    for (x, y, pixel) in working.enumerate_pixels_mut() {
        let offset = y as usize * row_stride + x as usize * pixel_stride;
        // Padding of the last row may lie past the end of the buffer.
        if let Some(src) = frame.buffer.get(offset..offset + bpp) {
            pixel.0.copy_from_slice(src);
        }
    }

    let cropped = imageops::crop_imm(&working, 0, 0, target_width, target_height).to_image();
    trace!(bytes = cropped.len(), "Frame decoded");

    Ok(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAD: [u8; 4] = [0xEE, 0x00, 0xEE, 0x11];

    /// Build a frame whose pixels encode their own coordinates and whose
    /// padding bytes are filled with a marker.
    fn patterned_frame(width: u32, height: u32, pixel_stride: u32, row_stride: u32) -> RawFrame {
        let mut buffer = vec![0u8; (row_stride * height) as usize];
        for y in 0..height {
            let row = (y * row_stride) as usize;
            for chunk in buffer[row..row + row_stride as usize].chunks_mut(4) {
                let n = chunk.len();
                chunk.copy_from_slice(&PAD[..n]);
            }
            for x in 0..width {
                let at = row + (x * pixel_stride) as usize;
                buffer[at..at + 4].copy_from_slice(&[x as u8, y as u8, (x >> 8) as u8, 0xFF]);
            }
        }
        RawFrame::new(Bytes::from(buffer), pixel_stride, row_stride)
    }

    #[test]
    fn test_decode_strips_stride_padding() {
        let frame = patterned_frame(1080, 2340, 4, 4 * 1088);
        let image = decode(&frame, 1080, 2340).unwrap();

        assert_eq!(image.dimensions(), (1080, 2340));
        assert!(image.pixels().all(|p| p.0 != PAD));
        assert_eq!(image.get_pixel(1079, 2339).0, [1079u32 as u8, 2339u32 as u8, 4, 0xFF]);
    }

    #[test]
    fn test_decode_without_padding() {
        let frame = patterned_frame(16, 9, 4, 64);
        let image = decode(&frame, 16, 9).unwrap();
        assert_eq!(image.dimensions(), (16, 9));
        assert_eq!(image.get_pixel(3, 2).0, [3, 2, 0, 0xFF]);
    }

    #[test]
    fn test_output_dimensions_match_target_for_any_valid_strides() {
        for (width, height) in [(1, 1), (7, 3), (33, 5)] {
            for pixel_stride in [4, 5, 8] {
                for extra in [0, 1, 3, 4, 17, 64] {
                    let row_stride = pixel_stride * width + extra;
                    let frame = patterned_frame(width, height, pixel_stride, row_stride);
                    let image = decode(&frame, width, height).unwrap();
                    assert_eq!(image.dimensions(), (width, height));
                    assert_eq!(image.get_pixel(width - 1, height - 1).0[3], 0xFF);
                }
            }
        }
    }

    #[test]
    fn test_short_last_row_is_accepted() {
        let full = patterned_frame(10, 4, 4, 48);
        let min = full.min_buffer_len(10, 4).unwrap();
        let frame = RawFrame::new(full.buffer.slice(..min), 4, 48);

        let image = decode(&frame, 10, 4).unwrap();
        assert_eq!(image.dimensions(), (10, 4));
        assert_eq!(image.get_pixel(9, 3).0, [9, 3, 0, 0xFF]);
    }

    #[test]
    fn test_zero_pixel_stride_is_rejected() {
        let frame = RawFrame::new(Bytes::from(vec![0u8; 64]), 0, 16);
        assert!(matches!(decode(&frame, 4, 4), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn test_row_stride_shorter_than_row_is_rejected() {
        let frame = RawFrame::new(Bytes::from(vec![0u8; 256]), 4, 12);
        assert!(matches!(decode(&frame, 4, 4), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let frame = patterned_frame(8, 8, 4, 32);
        let truncated = RawFrame::new(frame.buffer.slice(..100), 4, 32);
        assert!(matches!(
            decode(&truncated, 8, 8),
            Err(CaptureError::Decode(_))
        ));
    }

    #[test]
    fn test_zero_target_is_rejected() {
        let frame = patterned_frame(4, 4, 4, 16);
        assert!(matches!(
            decode(&frame, 0, 4),
            Err(CaptureError::InvalidDimensions { .. })
        ));
    }
}
