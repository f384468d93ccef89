//! Frame sources.
//!
//! A [`FrameSource`] produces one [`RawFrame`] of the session's capture
//! region per call. The region is fixed when the source is opened.
//!
//! | Source          | Backend                                         |
//! |-----------------|-------------------------------------------------|
//! | [`ScreenSource`]  | Primary display via `scrap` (feature `screen`)  |
//! | [`CameraSource`]  | Webcam via `nokhwa` (feature `camera`)          |
//! | [`FileSource`]    | Image file, decoded on every capture            |
//! | [`PatternSource`] | Synthetic gradient, no external dependency      |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StreamError;
use crate::pipeline::types::{CaptureRegion, PixelFormat, RawFrame};

// ── FrameSource ──────────────────────────────────────────────────

/// Acquires raw frames from an external capture service.
///
/// Implementations do not need to be `Send`: some platform capturers are
/// bound to the thread that created them.
pub trait FrameSource {
    /// Capture the next frame of the configured region.
    fn capture(&mut self) -> Result<RawFrame, StreamError>;

    /// The region this source was opened with.
    fn region(&self) -> CaptureRegion;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        (**self).capture()
    }

    fn region(&self) -> CaptureRegion {
        (**self).region()
    }
}

/// Which backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Screen,
    Camera,
    File,
    Pattern,
}

/// Backend-independent parameters for [`open_source`].
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub region: CaptureRegion,
    /// Required for [`SourceKind::File`].
    pub file: Option<PathBuf>,
    /// Device index for [`SourceKind::Camera`].
    pub camera_index: u32,
    /// How long the screen source waits for the compositor.
    pub timeout: Duration,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            region: CaptureRegion::default(),
            file: None,
            camera_index: 0,
            timeout: Duration::from_millis(100),
        }
    }
}

/// Open a boxed source of the requested kind.
pub fn open_source(
    kind: SourceKind,
    options: &SourceOptions,
) -> Result<Box<dyn FrameSource>, StreamError> {
    let region = options.region;
    match kind {
        SourceKind::Screen => Ok(Box::new(ScreenSource::open(region, options.timeout)?)),
        SourceKind::Camera => Ok(Box::new(CameraSource::open(region, options.camera_index)?)),
        SourceKind::File => {
            let path = options.file.as_deref().ok_or_else(|| {
                StreamError::InvalidConfig("file source needs a path".into())
            })?;
            Ok(Box::new(FileSource::open(path, region)?))
        }
        SourceKind::Pattern => Ok(Box::new(PatternSource::new(region)?)),
    }
}

/// Copy `region` out of a `src_stride`-pitched buffer into a packed one.
fn crop(src: &[u8], src_stride: usize, bpp: usize, region: CaptureRegion) -> Vec<u8> {
    let row_len = region.width as usize * bpp;
    let x_off = region.left as usize * bpp;
    let mut out = Vec::with_capacity(row_len * region.height as usize);
    for y in region.top..region.top + region.height {
        let start = y as usize * src_stride + x_off;
        out.extend_from_slice(&src[start..start + row_len]);
    }
    out
}

// ── ScreenSource ─────────────────────────────────────────────────

/// Primary-display capturer.
///
/// Grabs the whole display through `scrap` and crops it to the region.
/// `scrap` reports `WouldBlock` until the compositor has a new frame; the
/// source retries until `timeout` and then fails with
/// [`StreamError::CaptureUnavailable`].
pub struct ScreenSource {
    region: CaptureRegion,
    #[cfg_attr(not(feature = "screen"), allow(dead_code))]
    timeout: Duration,
    #[cfg(feature = "screen")]
    capturer: scrap::Capturer,
}

#[cfg(feature = "screen")]
impl ScreenSource {
    /// Open the primary display and check the region fits on it.
    pub fn open(region: CaptureRegion, timeout: Duration) -> Result<Self, StreamError> {
        let display = scrap::Display::primary()
            .map_err(|e| StreamError::CaptureUnavailable(format!("no primary display: {e}")))?;
        let capturer = scrap::Capturer::new(display)
            .map_err(|e| StreamError::CaptureUnavailable(format!("cannot start capturer: {e}")))?;

        let (w, h) = (capturer.width() as u32, capturer.height() as u32);
        if !region.fits_within(w, h) {
            return Err(StreamError::CaptureUnavailable(format!(
                "region {region:?} outside {w}x{h} display"
            )));
        }
        debug!("screen source opened on {w}x{h} display");

        Ok(Self {
            region,
            timeout,
            capturer,
        })
    }
}

#[cfg(feature = "screen")]
impl FrameSource for ScreenSource {
    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        use std::time::Instant;

        let deadline = Instant::now() + self.timeout;
        let height = self.capturer.height();
        let region = self.region;

        loop {
            match self.capturer.frame() {
                Ok(frame) => {
                    let stride = frame.len() / height.max(1);
                    let data = crop(&frame, stride, PixelFormat::Bgra8.bytes_per_pixel(), region);
                    return Ok(RawFrame::packed(
                        region.width,
                        region.height,
                        PixelFormat::Bgra8,
                        data,
                    ));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    return Err(StreamError::CaptureUnavailable(format!("screen grab failed: {e}")));
                }
            }

            if Instant::now() >= deadline {
                return Err(StreamError::CaptureUnavailable(format!(
                    "no frame from compositor within {:?}",
                    self.timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

// ── Screen stub ──────────────────────────────────────────────────

#[cfg(not(feature = "screen"))]
impl ScreenSource {
    /// Screen capture needs the `screen` feature.
    pub fn open(_region: CaptureRegion, _timeout: Duration) -> Result<Self, StreamError> {
        Err(StreamError::CaptureUnavailable(
            "screen capture not compiled in (enable the `screen` feature)".into(),
        ))
    }
}

#[cfg(not(feature = "screen"))]
impl FrameSource for ScreenSource {
    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        Err(StreamError::CaptureUnavailable("Not supported in this build".into()))
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

// ── CameraSource ─────────────────────────────────────────────────

/// Webcam capturer.
///
/// Frames are decoded to RGB by `nokhwa` and cropped to the region.
pub struct CameraSource {
    region: CaptureRegion,
    #[cfg(feature = "camera")]
    camera: nokhwa::Camera,
}

#[cfg(feature = "camera")]
impl CameraSource {
    /// Open camera `index` and start its stream.
    pub fn open(region: CaptureRegion, index: u32) -> Result<Self, StreamError> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = nokhwa::Camera::new(CameraIndex::Index(index), format)
            .map_err(|e| StreamError::CaptureUnavailable(format!("camera {index}: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| StreamError::CaptureUnavailable(format!("camera {index} stream: {e}")))?;

        let res = camera.resolution();
        if !region.fits_within(res.width(), res.height()) {
            return Err(StreamError::CaptureUnavailable(format!(
                "region {region:?} outside {}x{} camera frame",
                res.width(),
                res.height()
            )));
        }
        debug!("camera {index} opened at {}x{}", res.width(), res.height());

        Ok(Self { region, camera })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        use nokhwa::pixel_format::RgbFormat;

        let buffer = self
            .camera
            .frame()
            .map_err(|e| StreamError::CaptureUnavailable(format!("camera grab failed: {e}")))?;
        let img = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| StreamError::CaptureUnavailable(format!("camera frame: {e}")))?;

        let (w, h) = (img.width(), img.height());
        if !self.region.fits_within(w, h) {
            return Err(StreamError::CaptureUnavailable(format!(
                "region {:?} outside {w}x{h} camera frame",
                self.region
            )));
        }

        let bpp = PixelFormat::Rgb8.bytes_per_pixel();
        let data = crop(img.as_raw(), w as usize * bpp, bpp, self.region);
        Ok(RawFrame::packed(
            self.region.width,
            self.region.height,
            PixelFormat::Rgb8,
            data,
        ))
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

#[cfg(not(feature = "camera"))]
impl CameraSource {
    /// Camera capture needs the `camera` feature.
    pub fn open(_region: CaptureRegion, _index: u32) -> Result<Self, StreamError> {
        Err(StreamError::CaptureUnavailable(
            "camera capture not compiled in (enable the `camera` feature)".into(),
        ))
    }
}

#[cfg(not(feature = "camera"))]
impl FrameSource for CameraSource {
    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        Err(StreamError::CaptureUnavailable("Not supported in this build".into()))
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

// ── FileSource ───────────────────────────────────────────────────

/// Reads the region out of an image file on every capture, so external
/// tools can overwrite the file between ticks.
pub struct FileSource {
    path: PathBuf,
    region: CaptureRegion,
}

impl FileSource {
    /// Open `path` and verify it decodes and contains the region.
    pub fn open(path: impl Into<PathBuf>, region: CaptureRegion) -> Result<Self, StreamError> {
        let mut source = Self {
            path: path.into(),
            region,
        };
        source.capture()?;
        debug!("file source opened on {}", source.path.display());
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FileSource {
    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        let img = image::open(&self.path)
            .map_err(|e| {
                StreamError::CaptureUnavailable(format!("cannot read {}: {e}", self.path.display()))
            })?
            .to_rgba8();

        let (w, h) = img.dimensions();
        if !self.region.fits_within(w, h) {
            return Err(StreamError::CaptureUnavailable(format!(
                "region {:?} outside {w}x{h} image {}",
                self.region,
                self.path.display()
            )));
        }

        let bpp = PixelFormat::Rgba8.bytes_per_pixel();
        let data = crop(img.as_raw(), w as usize * bpp, bpp, self.region);
        Ok(RawFrame::packed(
            self.region.width,
            self.region.height,
            PixelFormat::Rgba8,
            data,
        ))
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

// ── PatternSource ────────────────────────────────────────────────

/// Synthetic BGRA gradient that scrolls one pixel per capture.
#[derive(Debug, Clone)]
pub struct PatternSource {
    region: CaptureRegion,
    tick: u32,
}

impl PatternSource {
    pub fn new(region: CaptureRegion) -> Result<Self, StreamError> {
        if region.width == 0 || region.height == 0 {
            return Err(StreamError::CaptureUnavailable(format!(
                "empty capture region {region:?}"
            )));
        }
        Ok(Self { region, tick: 0 })
    }

    /// Number of frames produced so far.
    pub fn ticks(&self) -> u32 {
        self.tick
    }
}

impl FrameSource for PatternSource {
    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        let (w, h) = (self.region.width, self.region.height);
        let mut data = Vec::with_capacity(w as usize * h as usize * 4);
        for y in 0..h {
            for x in 0..w {
                let shifted = x.wrapping_add(self.tick);
                data.extend_from_slice(&[
                    (shifted % 256) as u8,
                    (y % 256) as u8,
                    ((shifted ^ y) % 256) as u8,
                    0xFF,
                ]);
            }
        }
        self.tick = self.tick.wrapping_add(1);
        Ok(RawFrame::packed(w, h, PixelFormat::Bgra8, data))
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_takes_inner_rectangle() {
        // 4x3 image, 1 byte per pixel, value = y * 10 + x.
        let src: Vec<u8> = (0..3).flat_map(|y| (0..4).map(move |x| y * 10 + x)).collect();
        let out = crop(&src, 4, 1, CaptureRegion::new(1, 1, 2, 2));
        assert_eq!(out, vec![11, 12, 21, 22]);
    }

    #[test]
    fn pattern_source_matches_region() {
        let mut src = PatternSource::new(CaptureRegion::new(0, 0, 16, 8)).unwrap();
        let a = src.capture().unwrap();
        let b = src.capture().unwrap();
        assert_eq!((a.width, a.height), (16, 8));
        assert_eq!(a.data.len(), 16 * 8 * 4);
        assert!(a.validate().is_ok());
        assert_ne!(a.data, b.data);
        assert_eq!(src.ticks(), 2);
    }

    #[test]
    fn pattern_source_rejects_empty_region() {
        let err = PatternSource::new(CaptureRegion::new(0, 0, 0, 8)).unwrap_err();
        assert!(matches!(err, StreamError::CaptureUnavailable(_)));
    }

    #[test]
    fn file_source_crops_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.png");
        let img = image::RgbaImage::from_fn(32, 24, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        img.save(&path).unwrap();

        let mut src = FileSource::open(&path, CaptureRegion::new(4, 8, 10, 6)).unwrap();
        let frame = src.capture().unwrap();
        assert_eq!((frame.width, frame.height), (10, 6));
        assert_eq!(frame.format, PixelFormat::Rgba8);
        // First pixel is (x = 8, y = 4).
        assert_eq!(&frame.data[..4], &[8, 4, 0, 255]);
    }

    #[test]
    fn file_source_rejects_region_outside_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        image::RgbaImage::new(8, 8).save(&path).unwrap();

        let err = FileSource::open(&path, CaptureRegion::new(0, 0, 16, 16))
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::CaptureUnavailable(_)));
    }

    #[test]
    fn missing_file_is_capture_unavailable() {
        let err = FileSource::open("/definitely/not/here.png", CaptureRegion::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "CaptureUnavailable");
    }

    #[test]
    fn file_kind_needs_path() {
        let err = open_source(SourceKind::File, &SourceOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::InvalidConfig(_)));
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn camera_without_feature_is_unavailable() {
        let options = SourceOptions {
            region: CaptureRegion::new(0, 0, 8, 8),
            ..Default::default()
        };
        let err = open_source(SourceKind::Camera, &options).err().unwrap();
        assert_eq!(err.kind(), "CaptureUnavailable");
    }
}
