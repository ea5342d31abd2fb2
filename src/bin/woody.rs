use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use woody_detect::data::FsAccess;
use woody_detect::{DetectionPipeline, ModelConfig};

const CONFIG_FILE: &str = "config.json";

/// Detect furniture and wood types in an image.
#[derive(Parser, Debug)]
#[command(name = "woody", version, about)]
struct Args {
    /// Image to analyse
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the annotated image [default: <input>_annotated.png]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum confidence for a detection to be reported
    #[arg(short, long)]
    confidence: Option<f32>,

    /// JSON model configuration [default: <config dir>/woody/config.json when present]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local ONNX model, overrides `weights_path` from the config
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Write the detections as JSON to this file
    #[arg(long)]
    json: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<ModelConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(FsAccess::Config.file_or_local(CONFIG_FILE)).filter(|p| p.is_file()),
    };

    let mut config = match path {
        Some(path) => {
            tracing::info!("Reading configuration from {}", path.display());
            ModelConfig::from_json_file(&path)
                .with_context(|| format!("invalid configuration {}", path.display()))?
        }
        None => ModelConfig::default(),
    };

    if let Some(model) = &args.model {
        config = config.with_weights_path(model);
    }
    Ok(config)
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    input.with_file_name(format!("{stem}_annotated.png"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::debug!("\n{config}");

    let image = image::open(&args.input)
        .with_context(|| format!("cannot read image {}", args.input.display()))?
        .into_rgb8();

    let pipeline = DetectionPipeline::from_config(&config)?;
    pipeline.get_model().context("model unavailable")?;

    let threshold = args.confidence.unwrap_or(config.default_confidence);
    let (annotated, detections) = pipeline.detect(&image, threshold)?;

    let output = args.output.clone().unwrap_or_else(|| default_output(&args.input));
    annotated
        .save(&output)
        .with_context(|| format!("cannot write {}", output.display()))?;

    let summary = detections.summary();
    match summary.mean_confidence {
        Some(mean) => println!("{} objects detected, average confidence {:.1}%", summary.count, mean * 100.0),
        None => println!("No objects detected. Try lowering the confidence threshold."),
    }
    for (label, count) in &summary.per_label {
        println!("  {label}: {count}");
    }
    println!("Annotated image written to {}", output.display());

    if let Some(json) = &args.json {
        let file = std::fs::File::create(json)
            .with_context(|| format!("cannot create {}", json.display()))?;
        serde_json::to_writer_pretty(file, &detections)?;
        println!("Detections written to {}", json.display());
    }

    Ok(())
}
