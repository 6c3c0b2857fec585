use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use livecap_app::{SessionConfig, SessionRunner};
use livecap_stt::NullStt;
use livecap_subtitle::{PassthroughTranslator, SegmenterConfig};

#[derive(Parser, Debug)]
#[command(name = "livecap", about = "Live caption pipeline consumer")]
struct Cli {
    /// Directory holding the transport stream and session marker
    #[arg(long, default_value = "livecap-session")]
    transport_dir: PathBuf,

    /// Transport poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Segmentation tick interval in milliseconds
    #[arg(long, default_value_t = 200)]
    tick_ms: u64,

    /// Hard ceiling on uncommitted transcript length, in characters
    #[arg(long, default_value_t = 100)]
    max_segment_chars: usize,

    /// Write everything delivered to the speech engine to this WAV file
    #[arg(long)]
    debug_wav: Option<PathBuf>,

    /// Keep polling even after the producer clears the session marker
    #[arg(long, default_value_t = false)]
    stay_alive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = SessionConfig {
        transport_dir: cli.transport_dir,
        poll_interval: Duration::from_millis(cli.poll_ms),
        tick_interval: Duration::from_millis(cli.tick_ms),
        segmenter: SegmenterConfig {
            max_segment_chars: cli.max_segment_chars,
            ..SegmenterConfig::default()
        },
        debug_wav: cli.debug_wav,
        exit_when_inactive: !cli.stay_alive,
    };

    // A real recognizer/translator plug in through the same traits; the
    // defaults let the audio path run standalone (pair with --debug-wav).
    let runner = SessionRunner::new(
        cfg,
        Box::new(NullStt::new()),
        Arc::new(PassthroughTranslator),
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = runner.run(shutdown_rx).await?;
    for segment in &summary.history {
        info!(
            target: "session",
            id = segment.id,
            original = %segment.original_text,
            translated = %segment.translated_text,
            "segment"
        );
    }
    Ok(())
}
