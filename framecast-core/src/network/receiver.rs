//! Consuming side of the stream.
//!
//! Reads envelopes off any `AsyncRead` and yields their payloads in the
//! order they were sent.

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::trace;

use crate::codec::EnvelopeCodec;
use crate::error::StreamError;
use crate::pipeline::throughput::ThroughputMeter;

pub struct FrameReceiver<R> {
    frames: FramedRead<R, EnvelopeCodec>,
    meter: ThroughputMeter,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, EnvelopeCodec::new())
    }

    pub fn with_codec(reader: R, codec: EnvelopeCodec) -> Self {
        Self {
            frames: FramedRead::new(reader, codec),
            meter: ThroughputMeter::new(),
        }
    }

    /// Next payload, or `None` when the peer closed on a frame boundary.
    ///
    /// A stream that ends inside a frame is a transport error.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, StreamError> {
        match self.frames.next().await {
            Some(Ok(payload)) => {
                self.meter.record(payload.len() as u64);
                trace!("received {} byte payload", payload.len());
                Ok(Some(payload))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    pub fn frames_received(&self) -> u64 {
        self.meter.total_frames()
    }

    /// Payload bytes received, excluding prefixes.
    pub fn bytes_received(&self) -> u64 {
        self.meter.total_bytes()
    }

    /// Recent arrival rate.
    pub fn frames_per_sec(&self) -> f64 {
        self.meter.frames_per_sec()
    }

    pub fn into_inner(self) -> R {
        self.frames.into_inner()
    }
}
