//! Single-writer envelope sender.
//!
//! [`StreamSender`] owns the connection exclusively. Each [`send`] writes
//! one whole envelope and flushes it before returning. A write that fails
//! part-way leaves the receiver unable to find the next frame boundary, so
//! any failure poisons the sender: every later `send` is refused without
//! touching the stream.
//!
//! [`send`]: StreamSender::send

use std::time::Duration;

use bytes::Buf;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::envelope::Envelope;
use crate::error::StreamError;
use crate::network::connection::{self, ConnectionInfo};
use crate::pipeline::throughput::ThroughputMeter;

pub struct StreamSender<W = TcpStream> {
    /// `None` once closed.
    writer: Option<W>,
    peer: String,
    failed: bool,
    send_timeout: Option<Duration>,
    meter: ThroughputMeter,
}

impl StreamSender<TcpStream> {
    /// Open the connection to `info`.
    pub async fn connect(info: &ConnectionInfo, timeout: Duration) -> Result<Self, StreamError> {
        let stream = connection::open_stream(info, timeout).await?;
        Ok(Self::new(stream, info.to_string()))
    }
}

impl<W: AsyncWrite + Unpin> StreamSender<W> {
    /// Wrap an already-open byte stream.
    pub fn new(writer: W, peer: impl Into<String>) -> Self {
        Self {
            writer: Some(writer),
            peer: peer.into(),
            failed: false,
            send_timeout: None,
            meter: ThroughputMeter::new(),
        }
    }

    /// Bound each `send`; expiry is a fatal transport error.
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether a previous write failed. A failed sender never writes again.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    pub fn frames_sent(&self) -> u64 {
        self.meter.total_frames()
    }

    /// Payload and header bytes written.
    pub fn bytes_sent(&self) -> u64 {
        self.meter.total_bytes()
    }

    /// Recent throughput in bytes/second.
    pub fn bytes_per_sec(&self) -> u64 {
        self.meter.bytes_per_sec()
    }

    /// Write one envelope in full.
    ///
    /// Not cancel-safe: dropping the future mid-write desynchronises the
    /// stream. Callers must let it run to completion.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), StreamError> {
        if self.failed {
            return Err(StreamError::transport(
                std::io::ErrorKind::BrokenPipe,
                format!("connection to {} already failed", self.peer),
            ));
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(StreamError::transport(
                std::io::ErrorKind::NotConnected,
                format!("connection to {} is closed", self.peer),
            ));
        };

        let write = async {
            let mut wire = envelope.header().as_slice().chain(envelope.payload().clone());
            writer.write_all_buf(&mut wire).await?;
            writer.flush().await
        };

        let result = match self.send_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(r) => r,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("send exceeded {limit:?}"),
                )),
            },
            None => write.await,
        };

        if let Err(e) = result {
            self.failed = true;
            warn!("write to {} failed, stream is desynchronised: {e}", self.peer);
            return Err(StreamError::Transport(e));
        }

        self.meter.record(envelope.wire_len() as u64);
        trace!("sent {} byte envelope to {}", envelope.wire_len(), self.peer);
        Ok(())
    }

    /// Release the connection. Idempotent; shutdown errors are logged, not
    /// returned.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("shutdown of {} reported: {e}", self.peer);
            }
            debug!("connection to {} closed", self.peer);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    /// Accepts `budget` bytes, then fails every write.
    pub(crate) struct FaultyWriter {
        pub written: Vec<u8>,
        pub budget: usize,
        pub write_calls: Arc<AtomicUsize>,
        pub shutdowns: Arc<AtomicUsize>,
    }

    impl FaultyWriter {
        pub(crate) fn new(budget: usize) -> Self {
            Self {
                written: Vec::new(),
                budget,
                write_calls: Arc::new(AtomicUsize::new(0)),
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl AsyncWrite for FaultyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            let room = self.budget - self.written.len().min(self.budget);
            if room == 0 {
                return Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "simulated reset",
                )));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn writes_prefix_then_payload() {
        let mock = tokio_test::io::Builder::new()
            .write(&[0, 0, 0, 3])
            .write(b"abc")
            .build();
        let mut sender = StreamSender::new(mock, "mock");
        sender.send(&Envelope::new(b"abc".to_vec()).unwrap()).await.unwrap();
        assert_eq!(sender.frames_sent(), 1);
        assert_eq!(sender.bytes_sent(), 7);
    }

    #[tokio::test]
    async fn partial_write_poisons_sender() {
        let writer = FaultyWriter::new(6);
        let calls = writer.write_calls.clone();
        let mut sender = StreamSender::new(writer, "faulty");

        let env = Envelope::new(vec![0xAB; 16]).unwrap();
        let err = sender.send(&env).await.unwrap_err();
        assert!(matches!(err, StreamError::Transport(_)));
        assert!(sender.is_failed());

        let calls_after_failure = calls.load(Ordering::SeqCst);
        let err = sender.send(&env).await.unwrap_err();
        assert_eq!(err.kind(), "TransportError");
        assert_eq!(calls.load(Ordering::SeqCst), calls_after_failure);
        assert_eq!(sender.frames_sent(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let writer = FaultyWriter::new(1024);
        let shutdowns = writer.shutdowns.clone();
        let mut sender = StreamSender::new(writer, "w");

        sender.close().await;
        sender.close().await;
        assert!(sender.is_closed());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        let err = sender.send(&Envelope::new(vec![1]).unwrap()).await.unwrap_err();
        assert!(matches!(err, StreamError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn send_timeout_is_transport_error() {
        // Never finishes writing.
        let (client, _server) = tokio::io::duplex(8);
        let mut sender =
            StreamSender::new(client, "slow").with_send_timeout(Some(Duration::from_millis(100)));

        let err = sender
            .send(&Envelope::new(vec![0u8; 1024]).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Transport(ref e) if e.kind() == std::io::ErrorKind::TimedOut));
        assert!(sender.is_failed());
    }
}
