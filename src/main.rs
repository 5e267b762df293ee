use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use chartlevels::detection::preprocessing;
use chartlevels::{ChartDetector, ChartPipeline, DetectionStrategy, ExtractedTradeLevels, OcrsEngine, PipelineConfig};

#[derive(Parser)]
#[command(name = "chartlevels")]
#[command(about = "Read entry, stop-loss and take-profit levels from chart screenshots")]
struct Cli {
    /// Path to the chart screenshot
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// JSON file overriding pipeline parameters
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding text-detection.rten and text-recognition.rten
    /// (defaults to ~/.cache/ocrs)
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    /// Annotation detector to use
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Stop after detection and print the boxes (no OCR models needed)
    #[arg(long)]
    detect_only: bool,

    /// Print the internal levels record instead of the order-ticket shape
    #[arg(long)]
    raw: bool,

    /// Abort after this many milliseconds
    #[arg(long, value_name = "N")]
    timeout_ms: Option<u64>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Strategy {
    MarkerBoxes,
    PriceAxis,
}

impl From<Strategy> for DetectionStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::MarkerBoxes => DetectionStrategy::MarkerBoxes,
            Strategy::PriceAxis => DetectionStrategy::PriceAxis,
        }
    }
}

fn load_config(args: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config.detector.strategy = strategy.into();
    }
    if args.timeout_ms.is_some() {
        config.timeout_ms = args.timeout_ms;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    chartlevels::logging::init(args.verbose)?;

    let config = load_config(&args)?;
    tracing::debug!(image = %args.image_path.display(), strategy = ?config.detector.strategy, "loading image");

    let bytes = std::fs::read(&args.image_path)
        .with_context(|| format!("failed to read {}", args.image_path.display()))?;

    if args.detect_only {
        let mut detector = ChartDetector::new().with_config(config)?;
        if let Some(dir) = args.debug_out {
            detector = detector.with_debug(dir)?;
        }
        let decoded = preprocessing::decode(&bytes)?;
        let detections = detector.detect(&decoded)?;
        println!("{}", serde_json::to_string_pretty(&detections)?);
        return Ok(());
    }

    let engine = match &args.models_dir {
        Some(dir) => OcrsEngine::from_model_dir(dir)?,
        None => OcrsEngine::from_cache_dir()?,
    };

    let mut pipeline = ChartPipeline::new(engine).with_config(config)?;
    if let Some(dir) = args.debug_out {
        pipeline = pipeline.with_debug(dir)?;
    }

    let levels = pipeline
        .run_until_cancelled(&bytes, tokio::signal::ctrl_c())
        .await
        .with_context(|| format!("failed to read levels from {}", args.image_path.display()))?;

    let output = if args.raw {
        serde_json::to_string_pretty(&levels)?
    } else {
        serde_json::to_string_pretty(&ExtractedTradeLevels::from(levels))?
    };
    println!("{output}");

    Ok(())
}
