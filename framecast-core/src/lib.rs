//! # framecast-core
//!
//! Streams successive screen captures to a single consumer over one TCP
//! connection, each image wrapped in a 4-byte big-endian length prefix.
//!
//! This crate contains:
//! - **Envelope**: the length-prefixed wire unit and its validation
//! - **Codec**: `EnvelopeCodec` for framed TCP I/O via `tokio_util`
//! - **Pipeline**: frame sources, PNG/JPEG encoder, pacer, `StreamClient`
//! - **Network**: connection setup, `StreamSender`, `FrameReceiver`
//! - **State**: the `StreamState` lifecycle machine
//! - **Shutdown**: interrupt / end-of-input stop requests
//! - **Error**: `StreamError`, a typed `thiserror`-based error enum

pub mod codec;
pub mod envelope;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod shutdown;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{DEFAULT_MAX_FRAME_SIZE, EnvelopeCodec};
pub use envelope::{Envelope, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE, decode_envelope, frame};
pub use error::StreamError;
pub use network::{ConnectionInfo, FrameReceiver, StreamSender};
pub use pipeline::{
    CameraSource, CaptureRegion, EncodeFormat, EncodedPayload, EncoderConfig, FileSource,
    FrameEncoder, FrameSource, Pacer, PacingMode, PatternSource, PixelFormat, RawFrame,
    ScreenSource, SessionReport, SourceKind, SourceOptions, StopCause, StreamClient, StreamConfig,
    ThroughputMeter, open_source,
};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, StopRequest};
pub use state::StreamState;
