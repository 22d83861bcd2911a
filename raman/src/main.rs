use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use raman::config::AnalysisConfig;
use raman::{analyze_single_image, process_batch};

/// Particle analysis for Raman microscopy images: a batch pass over a folder
/// followed by a detailed report on one image.
#[derive(Debug, Parser)]
#[command(name = "raman", version, about)]
struct Args {
    /// Folder with the raw images.
    #[arg(long, default_value = "results/focus_stacking")]
    raw_folder: PathBuf,

    /// Folder receiving all outputs.
    #[arg(long, default_value = "results/batch_processing")]
    results_folder: PathBuf,

    /// Skip PNG rendering in the detailed report.
    #[arg(long)]
    no_plots: bool,

    /// Index of the image that gets the detailed report. Out of range falls back to 0.
    #[arg(long, default_value_t = 0)]
    single_index: usize,

    /// Only run the detailed report.
    #[arg(long)]
    skip_batch: bool,

    /// Image extension to pick up from the raw folder.
    #[arg(long, default_value = "jpg")]
    extension: String,

    /// YAML or JSON analysis config. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    common::log_setup::setup_logging(&args.log_level, Path::new("logs"), "raman")
        .context("Failed to set up logging")?;

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if args.no_plots {
        config.report.render_plots = false;
    }
    config.validate();

    let images = common::file_utils::files_with_extensions(&args.raw_folder, &[&args.extension])
        .with_context(|| format!("Failed to list {}", args.raw_folder.display()))?;
    if images.is_empty() {
        tracing::warn!(
            folder = %args.raw_folder.display(),
            extension = %args.extension,
            "no images found"
        );
        return Ok(());
    }
    tracing::info!(count = images.len(), folder = %args.raw_folder.display(), "found images");
    for (index, image) in images.iter().enumerate() {
        tracing::info!(index, image = %image.display());
    }

    std::fs::create_dir_all(&args.results_folder)
        .with_context(|| format!("Failed to create {}", args.results_folder.display()))?;

    if !args.skip_batch {
        let summary = process_batch(&images, &args.results_folder, &config)?;
        tracing::info!(
            processed = summary.records.len(),
            errors = summary.error_count(),
            "batch done"
        );
    }

    let index = if args.single_index < images.len() {
        args.single_index
    } else {
        tracing::warn!(
            requested = args.single_index,
            available = images.len(),
            "single index out of range, using 0"
        );
        0
    };
    let image = &images[index];
    match analyze_single_image(image, &args.results_folder, &config)
        .with_context(|| format!("Detailed analysis of {} failed", image.display()))?
    {
        Some(analysis) => tracing::info!(
            output = %analysis.output_dir.display(),
            "detailed report written"
        ),
        None => tracing::warn!(image = %image.display(), "no detailed report"),
    }

    Ok(())
}
