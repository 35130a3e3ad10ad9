//! `vessay` command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vessay_models::VideoId;
use vessay_pipeline::{
    full_run, step_for, FsArtifactStore, Orchestrator, PipelineConfig, PipelineError, RunDir, StepContext,
    StepName,
};

#[derive(Parser)]
#[command(name = "vessay")]
#[command(about = "Turn a video into an illustrated essay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding one sub-directory per video
    #[arg(long, env = "VESSAY_RUNS_DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// Re-run steps even if their artifact exists
    #[arg(long, global = true)]
    force: bool,

    /// Netscape cookies file for yt-dlp
    #[arg(long, env = "VESSAY_COOKIES", global = true)]
    cookies: Option<PathBuf>,
}

#[derive(Args, Default)]
struct FrameArgs {
    /// Seconds between sampled frames
    #[arg(long)]
    interval: Option<u32>,

    /// Maximum fingerprint distance for near-duplicate frames
    #[arg(long)]
    hamming_threshold: Option<u32>,

    /// Minimum relevance value (1-5) for a frame to be kept
    #[arg(long)]
    min_value: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline
    Run {
        /// Video URL or id
        video: String,

        /// Also score the essay against the transcript
        #[arg(long)]
        score: bool,

        /// Link images from frames/kept/ instead of embedding them
        #[arg(long)]
        no_embed: bool,

        #[command(flatten)]
        frames: FrameArgs,
    },

    /// Fetch the transcript
    Transcript { video: String },

    /// Detect and remove sponsor segments
    SponsorFilter { video: String },

    /// Write the essay from the transcript
    Essay { video: String },

    /// Download the source video
    Download { video: String },

    /// Sample, deduplicate and classify frames
    ExtractFrames {
        video: String,

        #[command(flatten)]
        frames: FrameArgs,
    },

    /// Place kept frames into the essay as figures
    PlaceImages {
        video: String,

        /// Link images from frames/kept/ instead of embedding them
        #[arg(long)]
        no_embed: bool,
    },

    /// Score the essay against the transcript
    Score { video: String },
}

impl Commands {
    fn video(&self) -> &str {
        match self {
            Commands::Run { video, .. }
            | Commands::Transcript { video }
            | Commands::SponsorFilter { video }
            | Commands::Essay { video }
            | Commands::Download { video }
            | Commands::ExtractFrames { video, .. }
            | Commands::PlaceImages { video, .. }
            | Commands::Score { video } => video,
        }
    }

    /// Commands that start from the video itself record run metadata.
    fn records_metadata(&self) -> bool {
        matches!(
            self,
            Commands::Run { .. } | Commands::Transcript { .. } | Commands::Download { .. }
        )
    }

    fn apply(&self, config: &mut PipelineConfig) {
        let (frames, no_embed) = match self {
            Commands::Run { frames, no_embed, .. } => (Some(frames), *no_embed),
            Commands::ExtractFrames { frames, .. } => (Some(frames), false),
            Commands::PlaceImages { no_embed, .. } => (None, *no_embed),
            _ => (None, false),
        };

        if no_embed {
            config.embed_images = false;
        }
        if let Some(frames) = frames {
            if let Some(interval) = frames.interval {
                config.selection.interval_secs = interval;
            }
            if let Some(threshold) = frames.hamming_threshold {
                config.selection.hamming_threshold = threshold;
            }
            if let Some(min_value) = frames.min_value {
                config.selection.filter.min_value = min_value;
            }
        }
    }

    fn single_step(&self) -> Option<StepName> {
        match self {
            Commands::Run { .. } => None,
            Commands::Transcript { .. } => Some(StepName::Transcript),
            Commands::SponsorFilter { .. } => Some(StepName::SponsorFilter),
            Commands::Essay { .. } => Some(StepName::Essay),
            Commands::Download { .. } => Some(StepName::Download),
            Commands::ExtractFrames { .. } => Some(StepName::ExtractFrames),
            Commands::PlaceImages { .. } => Some(StepName::PlaceImages),
            Commands::Score { .. } => Some(StepName::Score),
        }
    }
}

fn init_tracing() {
    // Colored output for terminals, JSON lines when LOG_FORMAT=json
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vessay=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::from_env();
    if let Some(dir) = cli.output_dir.clone() {
        config.runs_dir = dir;
    }
    if cli.cookies.is_some() {
        config.cookies = cli.cookies.clone();
    }
    cli.command.apply(&mut config);

    let video_id = VideoId::parse(cli.command.video())?;
    let run_dir = RunDir::new(&config.runs_dir, video_id);
    run_dir.ensure().await?;
    if cli.command.records_metadata() {
        run_dir.record_metadata(cli.command.video()).await?;
    }

    info!(
        video_id = %run_dir.video_id(),
        run_dir = %run_dir.root().display(),
        force = cli.force,
        "Starting"
    );

    let score = matches!(cli.command, Commands::Run { score: true, .. });
    let single = cli.command.single_step();

    let ctx = Arc::new(StepContext::from_config(config));
    let steps = match single {
        Some(name) => vec![step_for(name, &ctx)],
        None => full_run(&ctx, score),
    };

    let orchestrator = Orchestrator::new(Arc::new(FsArtifactStore)).with_force(cli.force);
    let report = orchestrator.run(&run_dir, &steps).await?;

    info!(
        executed = report.executed().len(),
        skipped = report.skipped().len(),
        run_dir = %run_dir.root().display(),
        "Done"
    );
    if single.is_none() {
        println!("{}", run_dir.essay_final().display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PipelineError>().and_then(|p| p.failed_step()) {
                Some(step) => error!(step = %step, "Run stopped: {:#}", e),
                None => error!("Run failed: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
