//! Sender session wiring.
//!
//! Turns a [`SenderConfig`] into a connected [`StreamClient`] and drives it
//! until a stop is requested or the stream fails.

use std::io::BufRead;

use tracing::{debug, info, warn};

use framecast_core::{
    SessionReport, ShutdownSignal, ShutdownTrigger, StreamClient, StreamError, open_source,
};

use crate::config::SenderConfig;

// ── SenderService ────────────────────────────────────────────────

/// One producer session.
pub struct SenderService {
    config: SenderConfig,
}

impl SenderService {
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Open the source, connect, and stream until `shutdown` fires or a
    /// stage fails.
    ///
    /// Errors before streaming starts (bad configuration, unavailable
    /// source, failed connect) are returned directly. Once streaming, the
    /// outcome is carried by the report's stop cause.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<SessionReport, StreamError> {
        let stream_config = self.config.to_stream_config()?;
        let options = self.config.source_options();
        let source = open_source(self.config.capture.source, &options)?;
        debug!(
            "opened {:?} source for {:?}",
            self.config.capture.source, options.region
        );

        let info = self.config.connection_info();
        let mut client = StreamClient::new(source, stream_config)?;
        info!("connecting to {info}");
        client.connect(&info).await?;

        Ok(client.run(shutdown).await)
    }
}

// ── Control input ────────────────────────────────────────────────

/// Read `input` until end-of-file, then request an end-of-input stop.
///
/// Blocking; run it on its own thread. Lines are discarded and a read error
/// is treated like end-of-file.
pub fn stop_at_eof<R: BufRead>(input: R, trigger: ShutdownTrigger) {
    for line in input.lines() {
        if let Err(e) = line {
            warn!("control input error: {e}");
            break;
        }
    }
    if trigger.end_of_input() {
        info!("control input closed, stopping");
    }
}

// ── Tests ────────────────────────────────────────────────────────
