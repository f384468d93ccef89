//! Receiver service.
//!
//! Accepts producers one at a time. Each session reads frames until the
//! producer disconnects or the stream turns out to be malformed; the
//! service then goes back to accepting. A stop request ends the current
//! session and the accept loop.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use framecast_core::{EnvelopeCodec, FrameReceiver, ShutdownSignal, StopRequest, StreamError};

use crate::config::ReceiverConfig;

// ── FrameStats ───────────────────────────────────────────────────

/// Counters across every session served.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub sessions: u64,
    pub frames: u64,
    /// Payload bytes, prefixes excluded.
    pub bytes: u64,
    /// Payloads that did not decode as an image.
    pub rejected: u64,
    first_frame: Option<Instant>,
    last_frame: Option<Instant>,
}

impl FrameStats {
    fn record(&mut self, len: usize) {
        let now = Instant::now();
        self.frames += 1;
        self.bytes += len as u64;
        self.first_frame.get_or_insert(now);
        self.last_frame = Some(now);
    }

    /// Mean arrival rate between the first and last frame.
    pub fn fps(&self) -> f64 {
        match (self.first_frame, self.last_frame) {
            (Some(first), Some(last)) if self.frames > 1 && last > first => {
                (self.frames - 1) as f64 / last.duration_since(first).as_secs_f64()
            }
            _ => 0.0,
        }
    }
}

// ── ImageInfo ────────────────────────────────────────────────────

/// What a payload decoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: image::ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Decode `payload` fully and report its format and size.
pub fn inspect(payload: &[u8]) -> Result<ImageInfo, StreamError> {
    let format = image::guess_format(payload)?;
    let img = image::load_from_memory_with_format(payload, format)?;
    Ok(ImageInfo {
        format,
        width: img.width(),
        height: img.height(),
    })
}

/// File extension for a payload, from its magic bytes.
fn extension_for(payload: &[u8]) -> &'static str {
    image::guess_format(payload)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin")
}

/// `frame-NNNNNN.<ext>` inside `dir`.
pub fn frame_path(dir: &Path, index: u64, ext: &str) -> PathBuf {
    dir.join(format!("frame-{index:06}.{ext}"))
}

// ── ReceiverService ──────────────────────────────────────────────

pub struct ReceiverService {
    config: ReceiverConfig,
    listener: TcpListener,
    output_dir: Option<PathBuf>,
    stats: FrameStats,
}

impl ReceiverService {
    /// Validate the configuration, create the output directory and bind.
    pub async fn bind(config: ReceiverConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let output_dir = config.output_dir();
        if let Some(dir) = &output_dir {
            tokio::fs::create_dir_all(dir).await?;
        }
        let listener = TcpListener::bind(config.listen_addr()).await?;
        info!("framecast receiver listening on {}", listener.local_addr()?);
        Ok(Self {
            config,
            listener,
            output_dir,
            stats: FrameStats::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, StreamError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Serve producers until `shutdown` fires (or, with `once`, until the
    /// first producer leaves).
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<FrameStats, StreamError> {
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                request = shutdown.requested() => {
                    info!("{}", stop_message(request));
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("accept error: {e}");
                        continue;
                    }
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!("set_nodelay on {peer}: {e}");
            }
            info!("producer connected from {peer}");
            self.stats.sessions += 1;

            let before = self.stats.frames;
            let stopped = self.serve(stream, peer, &mut shutdown).await;
            info!(
                "session with {peer} ended after {} frames",
                self.stats.frames - before
            );

            if stopped || self.config.network.once {
                break;
            }
        }

        info!(
            "received {} frames ({} bytes, {} rejected) over {} sessions, {:.1} fps",
            self.stats.frames,
            self.stats.bytes,
            self.stats.rejected,
            self.stats.sessions,
            self.stats.fps()
        );
        Ok(self.stats)
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Read one producer to the end. Returns `true` if a stop request
    /// interrupted the session.
    async fn serve(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: &mut ShutdownSignal,
    ) -> bool {
        let codec = EnvelopeCodec::with_max_frame_size(self.config.network.max_frame_bytes);
        let mut frames = FrameReceiver::with_codec(stream, codec);
        let mut last_report = Instant::now();

        loop {
            let next = tokio::select! {
                biased;
                request = shutdown.requested() => {
                    info!("{}", stop_message(request));
                    return true;
                }
                next = frames.next_frame() => next,
            };

            match next {
                Ok(Some(payload)) => {
                    if let Err(e) = self.handle_frame(&payload).await {
                        error!("cannot store frame from {peer}: {e}");
                        return false;
                    }
                }
                Ok(None) => return false,
                Err(e) => {
                    warn!("stream from {peer} failed: {}: {e}", e.kind());
                    return false;
                }
            }

            if last_report.elapsed() >= Duration::from_secs(1) {
                debug!(
                    "{peer}: {} frames, {:.1} fps",
                    frames.frames_received(),
                    frames.frames_per_sec()
                );
                last_report = Instant::now();
            }
        }
    }

    async fn handle_frame(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        let index = self.stats.frames;
        self.stats.record(payload.len());

        if self.config.output.verify_images {
            match inspect(payload) {
                Ok(info) => debug!(
                    "frame {index}: {:?} {}x{}, {} bytes",
                    info.format,
                    info.width,
                    info.height,
                    payload.len()
                ),
                Err(e) => {
                    self.stats.rejected += 1;
                    warn!("frame {index} is not a valid image: {e}");
                }
            }
        }

        if let Some(dir) = &self.output_dir {
            let path = frame_path(dir, index, extension_for(payload));
            tokio::fs::write(&path, payload).await?;
        }
        Ok(())
    }
}

fn stop_message(request: StopRequest) -> &'static str {
    match request {
        StopRequest::Interrupt => "interrupted, shutting down",
        StopRequest::EndOfInput => "end of input, shutting down",
    }
}

// ── Tests ────────────────────────────────────────────────────────
