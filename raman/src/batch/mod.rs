//! Batch stage: runs the analysis over a list of images one at a time,
//! writes per-image outputs and a summary CSV. A failing image becomes a row
//! of the summary and never stops the batch.


use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::image_io::load_image;
use crate::pipeline::{analyze_frame, classify, PipelineError};
use crate::report::{write_json, ImageStats};
use crate::table::ParticleTable;

pub const BATCH_SUMMARY_CSV: &str = "batch_summary.csv";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to create results folder '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write batch summary '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchStatus {
    Success,
    TooFewParticles,
    LoadError,
    Error,
}

/// One row of `batch_summary.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub image: String,
    pub status: BatchStatus,
    /// Error text for failed images, empty otherwise.
    pub message: String,
    pub particles: Option<usize>,
    pub clusters: Option<usize>,
    pub time_s: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub records: Vec<BatchRecord>,
    pub total_time_s: f64,
}

impl BatchSummary {
    pub fn count(&self, status: BatchStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Load failures and analysis errors together.
    pub fn error_count(&self) -> usize {
        self.count(BatchStatus::LoadError) + self.count(BatchStatus::Error)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), BatchError> {
        let csv_error = |source| BatchError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        for record in &self.records {
            writer.serialize(record).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_csv(path: &Path) -> Result<Vec<BatchRecord>, BatchError> {
        let mut reader = csv::Reader::from_path(path).map_err(|source| BatchError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        reader
            .deserialize()
            .collect::<Result<Vec<BatchRecord>, _>>()
            .map_err(|source| BatchError::Csv {
                path: path.to_path_buf(),
                source,
            })
    }

    fn log(&self) {
        let n = self.records.len().max(1);
        tracing::info!(
            success = self.count(BatchStatus::Success),
            warnings = self.count(BatchStatus::TooFewParticles),
            errors = self.error_count(),
            images = self.records.len(),
            total_s = self.total_time_s,
            per_image_s = self.total_time_s / n as f64,
            "batch summary"
        );
    }
}

/// Outcome of one image that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageOutcome {
    Analyzed { particles: usize, clusters: usize },
    TooFewParticles { particles: usize },
}

/// Analyzes one image and writes `<stem>/<stem>_particles.csv` and
/// `<stem>/<stem>_stats.json` under `results_folder`.
fn process_image(
    image_path: &Path,
    results_folder: &Path,
    config: &AnalysisConfig,
) -> Result<ImageOutcome, PipelineError> {
    let image = load_image(image_path)?;

    let stem = common::file_utils::file_stem(image_path);
    let image_dir = results_folder.join(&stem);
    std::fs::create_dir_all(&image_dir).map_err(|source| PipelineError::Io {
        path: image_dir.clone(),
        source,
    })?;

    let frame = analyze_frame(&image.gray, config);
    let particles = frame.particles.len();
    if particles < config.min_particles {
        return Ok(ImageOutcome::TooFewParticles { particles });
    }

    let classification = classify(&frame.particles, &config.clustering)?;
    let mut table = ParticleTable::from_particles(&frame.particles);
    classification.apply_to(&mut table);
    table.write_csv(&image_dir.join(format!("{stem}_particles.csv")))?;

    let image_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| stem.clone());
    let stats = ImageStats::new(
        &image_name,
        &frame.segmentation,
        &table,
        classification.combined.k,
    );
    write_json(&stats, &image_dir.join(format!("{stem}_stats.json")))?;

    Ok(ImageOutcome::Analyzed {
        particles,
        clusters: classification.combined.k,
    })
}

/// Processes `images` in order and writes `batch_summary.csv` into
/// `results_folder`. Only failing to create the folder or to write the
/// summary is an error.
pub fn process_batch(
    images: &[PathBuf],
    results_folder: &Path,
    config: &AnalysisConfig,
) -> Result<BatchSummary, BatchError> {
    config.validate();
    std::fs::create_dir_all(results_folder).map_err(|source| BatchError::Io {
        path: results_folder.to_path_buf(),
        source,
    })?;

    let start = Instant::now();
    let mut summary = BatchSummary::default();

    for (index, path) in images.iter().enumerate() {
        let image = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(image = %image, index = index + 1, total = images.len(), "processing");

        let image_start = Instant::now();
        let outcome = process_image(path, results_folder, config);
        let time_s = image_start.elapsed().as_secs_f64();

        let record = match outcome {
            Ok(ImageOutcome::Analyzed {
                particles,
                clusters,
            }) => {
                tracing::info!(image = %image, particles, clusters, time_s, "success");
                BatchRecord {
                    image,
                    status: BatchStatus::Success,
                    message: String::new(),
                    particles: Some(particles),
                    clusters: Some(clusters),
                    time_s,
                }
            }
            Ok(ImageOutcome::TooFewParticles { particles }) => {
                tracing::warn!(image = %image, particles, "too few particles");
                BatchRecord {
                    image,
                    status: BatchStatus::TooFewParticles,
                    message: String::new(),
                    particles: Some(particles),
                    clusters: None,
                    time_s,
                }
            }
            Err(err) => {
                let status = match err {
                    PipelineError::Load(_) => BatchStatus::LoadError,
                    _ => BatchStatus::Error,
                };
                tracing::error!(image = %image, %status, error = %err, "image failed");
                BatchRecord {
                    image,
                    status,
                    message: err.to_string(),
                    particles: None,
                    clusters: None,
                    time_s,
                }
            }
        };
        summary.records.push(record);
    }

    summary.total_time_s = start.elapsed().as_secs_f64();
    summary.log();
    summary.write_csv(&results_folder.join(BATCH_SUMMARY_CSV))?;
    Ok(summary)
}
