//! Replay a sonar packet log headlessly and report playback progress.

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sonar_waterfall::{ColorPolicy, PlaybackState, UpdateRate, Waterfall, WaterfallConfig};

#[derive(Parser)]
#[command(name = "waterfall_replay")]
#[command(about = "Scroll a sonar packet log through the waterfall engine")]
struct Cli {
    /// Packet log to replay
    log: PathBuf,

    /// YAML configuration file; unset fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Columns advanced per tick
    #[arg(long)]
    speed: Option<usize>,

    /// Columns per frame
    #[arg(long)]
    width: Option<usize>,

    /// Use the dynamic gain policy with this gain (0-100)
    #[arg(long)]
    gain: Option<f32>,

    /// Progress step to start from
    #[arg(long)]
    seek: Option<u32>,

    /// Progress reports per second
    #[arg(long, default_value_t = 2)]
    progress_hz: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            WaterfallConfig::from_yaml_str(&yaml)?
        }
        None => WaterfallConfig::default(),
    };
    if let Some(speed) = cli.speed {
        config.speed = speed;
    }
    if let Some(width) = cli.width {
        config.window_width = width;
    }
    if let Some(gain) = cli.gain {
        config.color = ColorPolicy::DynamicGain { gain };
    }

    let session = Waterfall::open(&cli.log, config)
        .await
        .with_context(|| format!("opening {}", cli.log.display()))?;
    if let Some(step) = cli.seek {
        session.seek(step);
    }

    let granularity = session.config().progress_granularity;
    let mut progress = session.progress_updates(UpdateRate::Max(cli.progress_hz));
    tokio::spawn(async move {
        while let Some(step) = progress.next().await {
            info!("Progress {}/{}", step, granularity);
        }
    });

    let mut status = session.status_updates();
    tokio::spawn(async move {
        while let Some(event) = status.next().await {
            info!("{}", event);
        }
    });

    let frames = session.frames();
    let mut count = 0u64;
    while let Some(frame) = frames.next_frame().await {
        count += 1;
        if frame.height == 0 {
            warn!("Frame {} carries no samples", frame.tick);
        }
    }

    let state = session.wait_finished().await;
    info!("Consumed {} frames, playback {}", count, state);
    if state != PlaybackState::Finished {
        anyhow::bail!("playback ended {}", state);
    }
    Ok(())
}
