//! Shared types for the capture → encode pipeline.
//!
//! These are transient in-memory representations passed between stages.
//! Nothing here is serialised onto the wire; the wire carries only the
//! encoded image bytes inside an [`Envelope`](crate::envelope::Envelope).

use std::time::Instant;

use serde::{Deserialize, Serialize};

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (OS capture default).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

// ── CaptureRegion ────────────────────────────────────────────────

/// Rectangle of the source image to capture, fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub const fn new(top: u32, left: u32, width: u32, height: u32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Whether the region is non-empty and lies inside a `w` × `h` image.
    pub fn fits_within(&self, w: u32, h: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.left.checked_add(self.width).is_some_and(|r| r <= w)
            && self.top.checked_add(self.height).is_some_and(|b| b <= h)
    }
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self::new(160, 160, 160, 135)
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed capture of the configured region.
///
/// The `data` buffer holds `height` rows of `stride` bytes each.
/// `stride` may exceed `width * bytes_per_pixel` when the capture API
/// pads rows.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row pitch in **bytes**.
    pub stride: u32,
    pub format: PixelFormat,
    /// Raw pixel data, `stride * height` bytes.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// Tightly packed frame (no row padding). A width whose row does not
    /// fit in a `u32` stride saturates and fails [`validate`](Self::validate).
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width.saturating_mul(format.bytes_per_pixel() as u32),
            format,
            data,
            timestamp: Instant::now(),
        }
    }

    /// Bytes the bitmap is expected to occupy.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Bytes in one row of pixels, excluding padding.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Returns a row slice (including possible padding bytes).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        let end = start + self.stride as usize;
        &self.data[start..end]
    }

    /// Check that dimensions, stride and buffer length agree.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("empty frame {}x{}", self.width, self.height));
        }
        if (self.stride as usize) < self.row_len() {
            return Err(format!(
                "stride {} shorter than row of {} bytes",
                self.stride,
                self.row_len()
            ));
        }
        if self.data.len() < self.byte_len() {
            return Err(format!(
                "buffer holds {} bytes, {}x{} with stride {} needs {}",
                self.data.len(),
                self.width,
                self.height,
                self.stride,
                self.byte_len()
            ));
        }
        Ok(())
    }
}
