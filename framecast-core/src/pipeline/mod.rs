//! # Capture pipeline
//!
//! Producer-side stages, leaves first:
//!
//! ```text
//! FrameSource ──► FrameEncoder ──► frame() ──► StreamSender
//!      ▲                                            │
//!      └────────────────── Pacer ◄──────────────────┘
//! ```
//!
//! | Module       | Purpose                                              |
//! |------------- |------------------------------------------------------|
//! | `types`      | Raw frame, pixel format, capture region               |
//! | `capture`    | Screen / file / pattern frame sources                 |
//! | `encoder`    | PNG / JPEG encoding with optional resize              |
//! | `pacer`      | Fixed-delay or deadline frame pacing                  |
//! | `throughput` | Rolling frame and byte rate for status lines          |
//! | `client`     | Connect → stream → close lifecycle                    |

pub mod capture;
pub mod client;
pub mod encoder;
pub mod pacer;
pub mod throughput;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use capture::{
    CameraSource, FileSource, FrameSource, PatternSource, ScreenSource, SourceKind, SourceOptions,
    open_source,
};
pub use client::{SessionReport, StopCause, StreamClient, StreamConfig};
pub use encoder::{EncodeFormat, EncodedPayload, EncoderConfig, FrameEncoder};
pub use pacer::{Pacer, PacingMode};
pub use throughput::ThroughputMeter;
pub use types::{CaptureRegion, PixelFormat, RawFrame};
