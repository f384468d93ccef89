//! Image encoder for captured frames.
//!
//! Converts a [`RawFrame`] into a self-contained PNG or JPEG byte stream
//! that any standard decoder can read:
//!
//! 1. Validate dimensions against the buffer.
//! 2. Repack rows into tight RGB8, dropping stride padding and alpha.
//! 3. Optionally resize to the configured target.
//! 4. Compress with the configured codec.
//!
//! Format, quality and target size are configuration, fixed for the life
//! of the encoder.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::pipeline::types::{PixelFormat, RawFrame};

// ── EncodeFormat ─────────────────────────────────────────────────

/// Container format of the transmitted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFormat {
    /// Lossless; the default.
    #[default]
    Png,
    /// Lossy, honours [`EncoderConfig::quality`].
    Jpeg,
}

impl EncodeFormat {
    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            EncodeFormat::Png => "png",
            EncodeFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            EncodeFormat::Png => image::ImageFormat::Png,
            EncodeFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

// ── EncoderConfig ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub format: EncodeFormat,
    /// JPEG quality 0..=100. Ignored for PNG.
    pub quality: u8,
    /// Output dimensions; `None` keeps the captured size.
    pub resize_to: Option<(u32, u32)>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: EncodeFormat::Png,
            quality: 80,
            resize_to: None,
        }
    }
}

// ── EncodedPayload ───────────────────────────────────────────────

/// A compressed image ready for framing.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub data: Bytes,
    pub format: EncodeFormat,
    /// Output width in pixels (after any resize).
    pub width: u32,
    /// Output height in pixels (after any resize).
    pub height: u32,
}

impl EncodedPayload {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Stateless PNG/JPEG encoder.
///
/// Cheap to clone, so the lifecycle can move a copy onto the blocking
/// pool for each frame.
#[derive(Debug, Clone, Default)]
pub struct FrameEncoder {
    config: EncoderConfig,
}

impl FrameEncoder {
    pub fn new(config: EncoderConfig) -> Result<Self, StreamError> {
        if config.quality > 100 {
            return Err(StreamError::InvalidConfig(format!(
                "quality {} outside 0..=100",
                config.quality
            )));
        }
        if let Some((w, h)) = config.resize_to {
            if w == 0 || h == 0 {
                return Err(StreamError::InvalidConfig(format!("resize target {w}x{h} is empty")));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode using the configured target size.
    pub fn encode(&self, raw: &RawFrame) -> Result<EncodedPayload, StreamError> {
        self.encode_with(raw, self.config.resize_to)
    }

    /// Encode, resizing to `target` first when given.
    pub fn encode_with(
        &self,
        raw: &RawFrame,
        target: Option<(u32, u32)>,
    ) -> Result<EncodedPayload, StreamError> {
        raw.validate().map_err(StreamError::Encode)?;

        let mut img = to_rgb(raw)?;
        if let Some((w, h)) = target {
            if w == 0 || h == 0 {
                return Err(StreamError::Encode(format!("resize target {w}x{h} is empty")));
            }
            if (w, h) != img.dimensions() {
                img = image::imageops::resize(&img, w, h, FilterType::Triangle);
            }
        }

        let (width, height) = img.dimensions();
        let mut buf = Cursor::new(Vec::with_capacity(raw.byte_len() / 4));
        match self.config.format {
            EncodeFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf))?,
            EncodeFormat::Jpeg => {
                let quality = self.config.quality.clamp(1, 100);
                img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?
            }
        }

        Ok(EncodedPayload {
            data: Bytes::from(buf.into_inner()),
            format: self.config.format,
            width,
            height,
        })
    }
}

/// Repack any supported pixel layout into tight RGB8.
fn to_rgb(raw: &RawFrame) -> Result<RgbImage, StreamError> {
    let bpp = raw.format.bytes_per_pixel();
    let mut rgb = Vec::with_capacity(raw.width as usize * raw.height as usize * 3);

    for y in 0..raw.height {
        let row = &raw.row(y)[..raw.row_len()];
        for px in row.chunks_exact(bpp) {
            match raw.format {
                PixelFormat::Bgra8 => rgb.extend_from_slice(&[px[2], px[1], px[0]]),
                PixelFormat::Rgba8 | PixelFormat::Rgb8 => rgb.extend_from_slice(&px[..3]),
            }
        }
    }

    RgbImage::from_raw(raw.width, raw.height, rgb)
        .ok_or_else(|| StreamError::Encode("pixel buffer does not match dimensions".into()))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn bgra_frame(w: u32, h: u32) -> RawFrame {
        let mut data = Vec::new();
        for _ in 0..w * h {
            data.extend_from_slice(&[10, 20, 30, 255]);
        }
        RawFrame::packed(w, h, PixelFormat::Bgra8, data)
    }

    #[test]
    fn png_decodes_to_same_size() {
        let enc = FrameEncoder::default();
        let out = enc.encode(&bgra_frame(160, 160)).unwrap();

        assert_eq!(out.format, EncodeFormat::Png);
        assert_eq!((out.width, out.height), (160, 160));
        assert_eq!(image::guess_format(&out.data).unwrap(), image::ImageFormat::Png);

        let img = image::load_from_memory(&out.data).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (160, 160));
        // BGRA (10, 20, 30) becomes RGB (30, 20, 10).
        assert_eq!(img.get_pixel(5, 5).0, [30, 20, 10]);
    }

    #[test]
    fn jpeg_with_resize() {
        let enc = FrameEncoder::new(EncoderConfig {
            format: EncodeFormat::Jpeg,
            quality: 60,
            resize_to: Some((64, 36)),
        })
        .unwrap();
        let out = enc.encode(&bgra_frame(160, 135)).unwrap();

        assert_eq!((out.width, out.height), (64, 36));
        let img = image::load_from_memory_with_format(&out.data, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (64, 36));
    }

    #[test]
    fn per_call_target_overrides_config() {
        let enc = FrameEncoder::default();
        let out = enc.encode_with(&bgra_frame(32, 32), Some((8, 4))).unwrap();
        assert_eq!((out.width, out.height), (8, 4));
    }

    #[test]
    fn padded_stride_is_dropped() {
        let mut data = vec![0u8; 3 * 16];
        for y in 0..3 {
            for x in 0..2 {
                let o = y * 16 + x * 4;
                data[o..o + 4].copy_from_slice(&[0, 0, 200, 255]);
            }
        }
        let raw = RawFrame {
            width: 2,
            height: 3,
            stride: 16,
            format: PixelFormat::Bgra8,
            data,
            timestamp: Instant::now(),
        };
        let out = FrameEncoder::default().encode(&raw).unwrap();
        let img = image::load_from_memory(&out.data).unwrap().to_rgb8();
        assert!(img.pixels().all(|p| p.0 == [200, 0, 0]));
    }

    #[test]
    fn malformed_frame_is_encode_error() {
        let mut raw = bgra_frame(4, 4);
        raw.data.truncate(10);
        let err = FrameEncoder::default().encode(&raw).unwrap_err();
        assert_eq!(err.kind(), "EncodeError");

        let empty = RawFrame::packed(0, 0, PixelFormat::Rgb8, Vec::new());
        assert!(FrameEncoder::default().encode(&empty).is_err());
    }

    #[test]
    fn config_is_validated() {
        let bad_quality = EncoderConfig {
            quality: 101,
            ..Default::default()
        };
        assert!(FrameEncoder::new(bad_quality).is_err());

        let bad_size = EncoderConfig {
            resize_to: Some((0, 10)),
            ..Default::default()
        };
        assert!(FrameEncoder::new(bad_size).is_err());
    }
}
