//! framecast receiver: entry point.
//!
//! ```text
//! framecast-receiver                     Listen with defaults
//! framecast-receiver --config <path>     Use custom config TOML
//! framecast-receiver --out frames/       Write every frame to a directory
//! framecast-receiver --gen-config        Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_core::shutdown;
use framecast_receiver::config::ReceiverConfig;
use framecast_receiver::service::ReceiverService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-receiver", about = "Receive and store framecast streams")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-receiver.toml")]
    config: PathBuf,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Output directory for received frames (overrides config).
    #[arg(short, long)]
    out: Option<String>,

    /// Exit after the first producer disconnects.
    #[arg(long)]
    once: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ReceiverConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ReceiverConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(dir) = cli.out {
        config.output.dir = dir;
    }
    config.network.once |= cli.once;

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-receiver v{}", env!("CARGO_PKG_VERSION"));
    if let Some(dir) = config.output_dir() {
        info!("writing frames to {}", dir.display());
    }

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.interrupt();
        }
    });

    let service = ReceiverService::bind(config).await?;
    service.run(signal).await?;

    Ok(())
}
