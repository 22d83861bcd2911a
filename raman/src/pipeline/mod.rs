//! Per-image analysis: segmentation, detection and scoring, followed by
//! clustering, physical typing, PCA and the balanced-zone search.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::GrayImage;
use thiserror::Error;

use crate::clustering::{
    classify_particles, cluster_combined, cluster_secondary, interpret_clusters, particle_labels,
    ClusterError, ClusterInterpretation, CombinedClustering, PhysicalType, SecondaryClustering,
};
use crate::config::{AnalysisConfig, ClusteringConfig};
use crate::detection::{detect_all, Detection};
use crate::image_io::{load_image, ImageLoadError, LoadedImage};
use crate::pca::{project, PcaProjection};
use crate::quality::{compute_quality, QualityMetrics};
use crate::report::{self, ReportError};
use crate::scoring::{score_particles, Particle};
use crate::segmentation::{segment, Segmentation};
use crate::table::{ParticleTable, TableError};
use crate::zone::{find_balanced_zone, ClusteredPoint, ZoneSearch};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] ImageLoadError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Failed to create '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============================================================================
// Frame analysis
// ============================================================================

/// Segmentation, detection and scored particles of one image.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub segmentation: Segmentation,
    pub detection: Detection,
    /// Bright band first, then mid, then dark.
    pub particles: Vec<Particle>,
}

pub fn analyze_frame(gray: &GrayImage, config: &AnalysisConfig) -> FrameAnalysis {
    let segmentation = segment(gray, &config.segmentation);
    let detection = detect_all(&segmentation, &config.detection);
    for band in &detection.bands {
        tracing::info!(
            band = %band.band,
            pixels = segmentation.pixel_count(band.band),
            particles = band.particles.len(),
            "band detection"
        );
    }
    let particles = score_particles(&detection.particles());

    FrameAnalysis {
        segmentation,
        detection,
        particles,
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Cluster labels, their interpretation and physical types for one image.
#[derive(Debug, Clone)]
pub struct Classification {
    pub combined: CombinedClustering,
    pub interpretations: BTreeMap<usize, ClusterInterpretation>,
    /// Interpretation label of each particle's cluster.
    pub cluster_names: Vec<String>,
    pub types: Vec<PhysicalType>,
    /// `None` when the 3D clustering could not run on this table.
    pub secondary: Option<SecondaryClustering>,
}

impl Classification {
    pub fn apply_to(&self, table: &mut ParticleTable) {
        table.assign_combined(&self.combined.labels, &self.cluster_names);
        table.assign_types(&self.types);
        if let Some(secondary) = &self.secondary {
            table.assign_secondary(&secondary.labels);
        }
    }
}

/// Runs the combined clustering, its interpretation, the secondary 3D
/// clustering and the physical classifier.
///
/// Only the combined clustering is fatal; a degenerate 3D table is logged and
/// skipped.
pub fn classify(
    particles: &[Particle],
    config: &ClusteringConfig,
) -> Result<Classification, ClusterError> {
    let combined = cluster_combined(particles, config)?;
    let interpretations = interpret_clusters(particles, &combined.labels, combined.k);
    let cluster_names = particle_labels(&combined.labels, &interpretations);
    for interpretation in interpretations.values() {
        tracing::debug!(
            cluster = interpretation.cluster,
            count = interpretation.count,
            label = %interpretation.label(),
            "cluster interpretation"
        );
    }

    let secondary = match cluster_secondary(particles, config) {
        Ok(secondary) => Some(secondary),
        Err(err) => {
            tracing::warn!(%err, "skipping secondary 3D clustering");
            None
        }
    };

    Ok(Classification {
        combined,
        interpretations,
        cluster_names,
        types: classify_particles(particles),
        secondary,
    })
}

// ============================================================================
// Detailed single-image analysis
// ============================================================================

/// Everything computed for the detailed report of one image.
#[derive(Debug, Clone)]
pub struct DetailedAnalysis {
    /// File name of the analyzed image.
    pub image_name: String,
    pub image: LoadedImage,
    pub quality: QualityMetrics,
    pub frame: FrameAnalysis,
    pub table: ParticleTable,
    pub classification: Classification,
    pub pca: Option<PcaProjection>,
    pub zone: ZoneSearch,
    pub output_dir: PathBuf,
}

/// Directory of the detailed report for `image_path`.
pub fn single_analysis_dir(results_folder: &Path, image_path: &Path) -> PathBuf {
    results_folder
        .join(common::file_utils::file_stem(image_path))
        .join("single_analysis")
}

/// Runs the full analysis of one image and writes its report under
/// `<results>/<stem>/single_analysis/`.
///
/// Returns `Ok(None)` when fewer than `min_particles` particles are detected.
pub fn analyze_single_image(
    image_path: &Path,
    results_folder: &Path,
    config: &AnalysisConfig,
) -> Result<Option<DetailedAnalysis>, PipelineError> {
    config.validate();
    let start = Instant::now();

    let image = load_image(image_path)?;
    let image_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!(image = %image_name, width = image.width(), height = image.height(), "detailed analysis");

    let quality = compute_quality(&image.gray);
    quality.log();

    let frame = analyze_frame(&image.gray, config);
    if frame.particles.len() < config.min_particles {
        tracing::warn!(
            image = %image_name,
            particles = frame.particles.len(),
            required = config.min_particles,
            "too few particles for the detailed analysis"
        );
        return Ok(None);
    }

    let classification = classify(&frame.particles, &config.clustering)?;
    let mut table = ParticleTable::from_particles(&frame.particles);
    classification.apply_to(&mut table);

    let pca = match project(&frame.particles) {
        Ok(pca) => {
            table.assign_pca(&pca.coordinates);
            Some(pca)
        }
        Err(err) => {
            tracing::warn!(%err, "skipping PCA");
            None
        }
    };

    let points = ClusteredPoint::from_particles(&frame.particles, &classification.combined.labels);
    let zone = find_balanced_zone(&points, image.width(), image.height(), &config.zone);

    let analysis = DetailedAnalysis {
        image_name,
        output_dir: single_analysis_dir(results_folder, image_path),
        image,
        quality,
        frame,
        table,
        classification,
        pca,
        zone,
    };

    report::write_report(&analysis, &config.report)?;
    report::log_final_report(&analysis.table);
    tracing::info!(
        image = %analysis.image_name,
        elapsed_s = start.elapsed().as_secs_f64(),
        "detailed analysis done"
    );

    Ok(Some(analysis))
}
