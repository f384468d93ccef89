//! framecast sender: entry point.
//!
//! ```text
//! framecast-sender                         Stream with framecast-sender.toml
//! framecast-sender --config <path>         Load a custom config TOML
//! framecast-sender --host 10.0.0.2 -p 9000 Override the receiver address
//! framecast-sender --fps 10                Override the frame rate
//! framecast-sender --gen-config            Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framecast_core::{StopCause, shutdown};
use framecast_sender::config::SenderConfig;
use framecast_sender::service::{SenderService, stop_at_eof};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-sender", about = "Stream a screen region as length-prefixed frames")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-sender.toml")]
    config: PathBuf,

    /// Receiver host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Receiver port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Target frames per second (overrides config).
    #[arg(long)]
    fps: Option<f64>,

    /// Stop cleanly when standard input is closed.
    #[arg(long)]
    stop_on_eof: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SenderConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(fps) = cli.fps {
        config.stream.fps = fps;
    }
    config.stream.stop_on_stdin_eof |= cli.stop_on_eof;

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("receiver: {}", config.connection_info());
    info!("capture: {:?} {:?}", config.capture.source, config.region());
    info!("target FPS: {} ({:?})", config.stream.fps, config.stream.pacing);

    let (trigger, signal) = shutdown::channel();

    // Ctrl-C handler.
    let ctrl_c = trigger.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && ctrl_c.interrupt() {
            info!("Ctrl-C received, shutting down");
        }
    });

    // Stdin is read on a plain thread so a pending read never holds up
    // runtime shutdown.
    if config.stream.stop_on_stdin_eof {
        let eof = trigger.clone();
        std::thread::spawn(move || stop_at_eof(std::io::stdin().lock(), eof));
    }

    let service = SenderService::new(config);
    let report = match service.run(signal).await {
        Ok(report) => report,
        Err(e) => {
            error!("{}: {e}", e.kind());
            return Err(e.into());
        }
    };

    let secs = report.duration.as_secs_f64();
    let fps = if secs > 0.0 {
        report.frames_sent as f64 / secs
    } else {
        0.0
    };
    match report.cause {
        StopCause::Failed(e) => {
            error!(
                "stream failed after {} frames: {}: {e}",
                report.frames_sent,
                e.kind()
            );
            Err(e.into())
        }
        cause => {
            info!(
                "{cause}: {} frames, {} bytes in {secs:.1}s ({fps:.1} fps)",
                report.frames_sent, report.bytes_sent
            );
            Ok(())
        }
    }
}
