// src/main.rs

use anyhow::{Context, Result};
use assembly_motion::batch::{find_video_files, BatchReport, VideoSummary, DEFAULT_MIN_VIDEO_BYTES};
use assembly_motion::instructions::{InstructionAnalysis, InstructionDocument};
use assembly_motion::video_processor::VideoReader;
use assembly_motion::{AnalysisEngine, EngineConfig, InstructionStep, StreamAnalysis};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "assembly-motion")]
#[command(about = "Workstation activity analysis for assembly recordings")]
#[command(version)]
struct Cli {
    /// YAML or JSON file of flat tuning keys
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single recording
    Analyze {
        video: PathBuf,

        /// Instruction deck JSON to compare activity against
        #[arg(short = 'i', long = "instructions")]
        instructions: Option<PathBuf>,

        /// Print the comparison report as markdown instead of JSON
        #[arg(short = 'm', long = "markdown", requires = "instructions")]
        markdown: bool,
    },

    /// Analyze every substantial recording in a directory
    Batch {
        dir: PathBuf,

        #[arg(short = 'i', long = "instructions")]
        instructions: PathBuf,

        #[arg(long = "max-videos", default_value_t = 10)]
        max_videos: usize,

        /// Recordings at or below this size are skipped
        #[arg(long = "min-size-mb")]
        min_size_mb: Option<f64>,

        #[arg(short = 'm', long = "markdown")]
        markdown: bool,
    },

    /// Extract steps, parts and tests from an instruction deck
    Instructions {
        file: PathBuf,

        /// Print an assembly checklist as markdown instead of JSON
        #[arg(long = "checklist")]
        checklist: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("assembly_motion=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            video,
            instructions,
            markdown,
        } => {
            let steps = match &instructions {
                Some(path) => Some(load_instructions(path)?.assembly_steps),
                None => None,
            };
            let analysis = analyze_video(&video, &config, steps.as_deref())?;

            match (&analysis.comparison, markdown) {
                (Some(report), true) => print!("{}", report.to_markdown()),
                _ => println!("{}", serde_json::to_string_pretty(&analysis)?),
            }
        }

        Commands::Batch {
            dir,
            instructions,
            max_videos,
            min_size_mb,
            markdown,
        } => {
            let steps = load_instructions(&instructions)?.assembly_steps;
            let min_bytes = min_size_mb
                .map(|mb| (mb * 1024.0 * 1024.0) as u64)
                .unwrap_or(DEFAULT_MIN_VIDEO_BYTES);
            let videos = find_video_files(&dir, min_bytes, max_videos)?;
            if videos.is_empty() {
                warn!("No recordings to analyze in {}", dir.display());
            }

            let mut summaries = Vec::with_capacity(videos.len());
            for (idx, path) in videos.iter().enumerate() {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                info!("[{}/{}] {}", idx + 1, videos.len(), name);

                let summary = match analyze_video(path, &config, Some(&steps)) {
                    Ok(analysis) => VideoSummary::analyzed(
                        name,
                        analysis.duration_secs,
                        analysis.activity_periods.len(),
                        steps.len(),
                    ),
                    Err(e) => {
                        error!("Failed to analyze {}: {:#}", name, e);
                        VideoSummary::failed(name, format!("{:#}", e))
                    }
                };
                summaries.push(summary);
            }

            let report = BatchReport::analyze(summaries);
            if markdown {
                print!("{}", report.to_markdown());
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Commands::Instructions { file, checklist } => {
            let analysis = load_instructions(&file)?;
            if checklist {
                print!("{}", analysis.checklist_markdown());
            } else {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            }
        }
    }

    Ok(())
}

fn load_instructions(path: &Path) -> Result<InstructionAnalysis> {
    Ok(InstructionDocument::load(path)?.analyze())
}

fn analyze_video(
    path: &Path,
    config: &EngineConfig,
    steps: Option<&[InstructionStep]>,
) -> Result<StreamAnalysis> {
    let mut reader = VideoReader::open(path)?;
    let mut engine = AnalysisEngine::new(config.clone(), reader.info())
        .with_context(|| format!("cannot analyze {}", path.display()))?;

    engine
        .process_stream(|| reader.read_frame())
        .with_context(|| format!("analysis of {} aborted", path.display()))?;

    Ok(engine.finalize(steps))
}
