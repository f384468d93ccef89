//! Producer-side stream orchestrator.
//!
//! Drives the full pipeline over one owned connection:
//!
//! 1. [`FrameSource`] captures the region.
//! 2. [`FrameEncoder`] compresses it (on the blocking pool).
//! 3. [`frame`] wraps it in a length prefix.
//! 4. [`StreamSender`] writes the envelope in full.
//! 5. [`Pacer`] waits for the next cycle.
//!
//! The loop runs until a stop is requested or any stage fails. Either way
//! the connection is closed exactly once before [`run`] returns.
//!
//! [`run`]: StreamClient::run

use std::fmt;
use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::envelope::frame;
use crate::error::StreamError;
use crate::network::connection::ConnectionInfo;
use crate::network::sender::StreamSender;
use crate::pipeline::capture::FrameSource;
use crate::pipeline::encoder::{EncoderConfig, FrameEncoder};
use crate::pipeline::pacer::{PacingMode, Pacer};
use crate::shutdown::{ShutdownSignal, StopRequest};
use crate::state::StreamState;

// ── StreamConfig ─────────────────────────────────────────────────

/// Session parameters, fixed once the client is built.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Target frames per second (> 0).
    pub target_fps: f64,
    pub pacing: PacingMode,
    pub encoder: EncoderConfig,
    /// Bound on name resolution and each connect attempt.
    pub connect_timeout: Duration,
    /// Bound on each envelope write; `None` waits indefinitely.
    pub send_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            pacing: PacingMode::Deadline,
            encoder: EncoderConfig::default(),
            connect_timeout: Duration::from_secs(5),
            send_timeout: None,
        }
    }
}

// ── StopCause / SessionReport ────────────────────────────────────

/// Why a session left the `Streaming` state.
#[derive(Debug)]
pub enum StopCause {
    Interrupted,
    EndOfInput,
    Failed(StreamError),
}

impl StopCause {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&StreamError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StopRequest> for StopCause {
    fn from(request: StopRequest) -> Self {
        match request {
            StopRequest::Interrupt => Self::Interrupted,
            StopRequest::EndOfInput => Self::EndOfInput,
        }
    }
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => write!(f, "stopped by user"),
            Self::EndOfInput => write!(f, "stopped at end of input"),
            Self::Failed(e) => write!(f, "{} ({e})", e.kind()),
        }
    }
}

/// Outcome of [`StreamClient::run`].
#[derive(Debug)]
pub struct SessionReport {
    pub frames_sent: u64,
    /// Wire bytes, prefixes included.
    pub bytes_sent: u64,
    pub duration: Duration,
    pub cause: StopCause,
}

// ── StreamClient ─────────────────────────────────────────────────

pub struct StreamClient<S, W = TcpStream> {
    source: S,
    encoder: FrameEncoder,
    pacer: Pacer,
    sender: Option<StreamSender<W>>,
    state: StreamState,
    config: StreamConfig,
}

impl<S: FrameSource> StreamClient<S, TcpStream> {
    /// Build a disconnected client. Validates the configuration.
    pub fn new(source: S, config: StreamConfig) -> Result<Self, StreamError> {
        Ok(Self {
            encoder: FrameEncoder::new(config.encoder.clone())?,
            pacer: Pacer::new(config.target_fps, config.pacing)?,
            source,
            sender: None,
            state: StreamState::Disconnected,
            config,
        })
    }

    /// Open the connection. `Disconnected → Connected`.
    pub async fn connect(&mut self, info: &ConnectionInfo) -> Result<(), StreamError> {
        if !matches!(self.state, StreamState::Disconnected) {
            return Err(StreamError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            ));
        }
        let sender = StreamSender::connect(info, self.config.connect_timeout)
            .await?
            .with_send_timeout(self.config.send_timeout);
        self.sender = Some(sender);
        self.state.connected()
    }
}

impl<S: FrameSource, W: AsyncWrite + Unpin> StreamClient<S, W> {
    /// Build a client around an already-connected sender. Starts in
    /// `Connected`.
    pub fn with_sender(
        source: S,
        config: StreamConfig,
        sender: StreamSender<W>,
    ) -> Result<Self, StreamError> {
        let mut state = StreamState::Disconnected;
        state.connected()?;
        Ok(Self {
            encoder: FrameEncoder::new(config.encoder.clone())?,
            pacer: Pacer::new(config.target_fps, config.pacing)?,
            source,
            sender: Some(sender.with_send_timeout(config.send_timeout)),
            state,
            config,
        })
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Stream until stopped or failed, then release the connection.
    ///
    /// `Connected → Streaming → Closing → Closed`. The close step runs on
    /// every exit path.
    pub async fn run(&mut self, mut shutdown: ShutdownSignal) -> SessionReport {
        let started = Instant::now();

        let cause = match self.state.begin_streaming() {
            Ok(()) => {
                let region = self.source.region();
                info!(
                    "streaming {}x{} region at {} fps ({:?} pacing, {:?})",
                    region.width,
                    region.height,
                    self.config.target_fps,
                    self.pacer.mode(),
                    self.encoder.config().format,
                );
                self.pacer.reset();
                self.stream_loop(&mut shutdown).await
            }
            Err(e) => StopCause::Failed(e),
        };

        let (frames_sent, bytes_sent) = self
            .sender
            .as_ref()
            .map(|s| (s.frames_sent(), s.bytes_sent()))
            .unwrap_or_default();

        self.release().await;

        match &cause {
            StopCause::Failed(e) => warn!("stream ended: {cause}; {frames_sent} frames sent: {e:?}"),
            _ => info!("stream ended: {cause}; {frames_sent} frames sent"),
        }

        SessionReport {
            frames_sent,
            bytes_sent,
            duration: started.elapsed(),
            cause,
        }
    }

    /// `Closing → Closed`, if a connection is held.
    async fn release(&mut self) {
        if self.state.begin_close().is_err() {
            return;
        }
        if let Some(sender) = self.sender.as_mut() {
            sender.close().await;
        }
        self.sender = None;
        if let Err(e) = self.state.finish_close() {
            debug!("close transition: {e}");
        }
    }

    async fn stream_loop(&mut self, shutdown: &mut ShutdownSignal) -> StopCause {
        let mut last_report = Instant::now();

        loop {
            if let Some(request) = shutdown.current() {
                return request.into();
            }

            // 1. Capture.
            let raw = match self.source.capture() {
                Ok(f) => f,
                Err(e) => return StopCause::Failed(e),
            };

            // 2. Encode. A cycle that has captured a frame runs to the end;
            //    stop requests are honoured at the pacing step.
            let encoder = self.encoder.clone();
            let payload = match tokio::task::spawn_blocking(move || encoder.encode(&raw)).await {
                Ok(Ok(p)) => p,
                Ok(Err(e)) => return StopCause::Failed(e),
                Err(e) => {
                    return StopCause::Failed(StreamError::Encode(format!(
                        "encoder task failed: {e}"
                    )));
                }
            };

            // 3. Frame.
            let envelope = match frame(payload) {
                Ok(env) => env,
                Err(e) => return StopCause::Failed(e),
            };

            // 4. Send. Never raced against the stop signal so an envelope
            //    is either fully written or the connection is failed.
            let Some(sender) = self.sender.as_mut() else {
                return StopCause::Failed(StreamError::ProtocolViolation(
                    "streaming without a connection",
                ));
            };
            if let Err(e) = sender.send(&envelope).await {
                return StopCause::Failed(e);
            }

            if last_report.elapsed() >= Duration::from_secs(1) {
                debug!(
                    "{} frames sent, {} B/s",
                    sender.frames_sent(),
                    sender.bytes_per_sec()
                );
                last_report = Instant::now();
            }

            // 5. Pace.
            tokio::select! {
                biased;
                request = shutdown.requested() => return request.into(),
                _ = self.pacer.wait() => {}
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
