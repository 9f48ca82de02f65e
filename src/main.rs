use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mocap_pipeline::capture::{LandmarkDetector, VideoImage};
use mocap_pipeline::config::{ConfigStore, PipelineConfig};
use mocap_pipeline::events::{EventBus, PipelineEvent};
use mocap_pipeline::landmarks::{FrameSequence, LandmarkFrame};
use mocap_pipeline::pipeline::PipelineController;
use mocap_pipeline::{AppError, Result};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Motion-capture frame pipeline command line arguments
#[derive(Parser, Debug)]
#[command(name = "mocap-pipeline")]
#[command(version, about = "Record and replay holistic landmark sequences", long_about = None)]
struct CliArgs {
    /// Configuration file (created with defaults if missing)
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of a sequence file
    Inspect {
        /// Sequence file (JSON array of frames)
        file: PathBuf,
    },
    /// Replay a sequence file through the pipeline
    Replay {
        /// Sequence file (JSON array of frames)
        file: PathBuf,

        /// Speed multiplier (0.1 - 2.0)
        #[arg(short = 's', long)]
        speed: Option<f64>,

        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short = 't', long, value_name = "N")]
        seconds: Option<u64>,
    },
}

/// Stands in for the holistic model; the CLI only replays recorded data
struct OfflineDetector;

#[async_trait]
impl LandmarkDetector for OfflineDetector {
    fn name(&self) -> &str {
        "offline"
    }

    async fn detect(&self, _image: &VideoImage) -> Result<LandmarkFrame> {
        Err(AppError::DetectionFailure(
            "no landmark detector attached to the command line tool".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    let config = match args.config {
        Some(ref path) => {
            let store = ConfigStore::open(path).await?;
            tracing::info!("Using configuration {}", store.path().display());
            (*store.get()).clone()
        }
        None => PipelineConfig::default(),
    };

    match args.command {
        Command::Inspect { file } => inspect(&file).await,
        Command::Replay {
            file,
            speed,
            seconds,
        } => replay(&config, &file, speed, seconds).await,
    }
}

async fn inspect(file: &Path) -> anyhow::Result<()> {
    let sequence = FrameSequence::load(file).await?;
    let summary = sequence.summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn replay(
    config: &PipelineConfig,
    file: &Path,
    speed: Option<f64>,
    seconds: Option<u64>,
) -> anyhow::Result<()> {
    let events = Arc::new(EventBus::new());
    let controller = PipelineController::new(config, Arc::new(OfflineDetector), events.clone());

    let published = Arc::new(AtomicU64::new(0));
    {
        let published = published.clone();
        controller.set_consumer(Some(Arc::new(move |frame: &LandmarkFrame| {
            published.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Frame with {} landmarks", frame.landmark_count());
        })));
    }

    let mut rx = events.subscribe();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let PipelineEvent::PlaybackProgress {
                frame,
                total_frames,
                has_face,
                has_pose,
                has_left_hand,
                has_right_hand,
            } = event
            {
                tracing::info!(
                    "Frame {}/{} (face: {}, pose: {}, left hand: {}, right hand: {})",
                    frame,
                    total_frames,
                    has_face,
                    has_pose,
                    has_left_hand,
                    has_right_hand
                );
            }
        }
    });

    controller.load_sequence_file(file).await?;
    if let Some(speed) = speed {
        controller.set_playback_speed(speed);
    }
    controller.toggle_playback();

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    match seconds {
        Some(secs) => {
            tokio::select! {
                _ = shutdown_signal => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => shutdown_signal.await,
    }

    let status = controller.status();
    controller.clear();
    reporter.abort();

    tracing::info!(
        "Replay stopped at frame {}/{} after {} publishes",
        status.cursor.unwrap_or(0),
        status.total_frames.unwrap_or(0),
        published.load(Ordering::Relaxed)
    );
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "mocap_pipeline=error",
        LogLevel::Warn => "mocap_pipeline=warn",
        LogLevel::Info => "mocap_pipeline=info",
        LogLevel::Verbose => "mocap_pipeline=info,mocap_pipeline::pipeline=debug",
        LogLevel::Debug => "mocap_pipeline=debug",
        LogLevel::Trace => "mocap_pipeline=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
