//! JSON summaries: per-image stats (batch and detailed path) and the
//! detailed analysis summary.

use std::collections::BTreeMap;
use std::path::Path;

use common::FileFormat;
use serde::{Deserialize, Serialize};

use super::ReportError;
use crate::clustering::{ClusterInterpretation, KCandidate};
use crate::pipeline::DetailedAnalysis;
use crate::quality::QualityMetrics;
use crate::segmentation::{Band, Segmentation};
use crate::table::ParticleTable;
use crate::zone::ZoneWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationStats {
    pub bright_pixels: usize,
    pub mid_pixels: usize,
    pub dark_pixels: usize,
    pub thresh1: u8,
    pub thresh2: u8,
}

impl From<&Segmentation> for SegmentationStats {
    fn from(segmentation: &Segmentation) -> Self {
        Self {
            bright_pixels: segmentation.pixel_count(Band::Bright),
            mid_pixels: segmentation.pixel_count(Band::Mid),
            dark_pixels: segmentation.pixel_count(Band::Dark),
            thresh1: segmentation.thresh1,
            thresh2: segmentation.thresh2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleCounts {
    pub total: usize,
    pub bright: usize,
    pub mid: usize,
    pub dark: usize,
}

impl From<&ParticleTable> for ParticleCounts {
    fn from(table: &ParticleTable) -> Self {
        let counts = table.band_counts();
        let count = |band| counts.get(&band).copied().unwrap_or(0);
        Self {
            total: table.len(),
            bright: count(Band::Bright),
            mid: count(Band::Mid),
            dark: count(Band::Dark),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub n_clusters: usize,
    pub distribution: BTreeMap<usize, usize>,
}

/// `<stem>_stats.json` of the batch stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStats {
    pub image_name: String,
    pub dimensions: Dimensions,
    pub segmentation: SegmentationStats,
    pub particles: ParticleCounts,
    pub clustering: ClusterStats,
}

impl ImageStats {
    /// `table` must carry combined cluster labels.
    pub fn new(
        image_name: &str,
        segmentation: &Segmentation,
        table: &ParticleTable,
        n_clusters: usize,
    ) -> Self {
        Self {
            image_name: image_name.to_string(),
            dimensions: Dimensions {
                width: segmentation.width() as u32,
                height: segmentation.height() as u32,
            },
            segmentation: segmentation.into(),
            particles: table.into(),
            clustering: ClusterStats {
                n_clusters,
                distribution: table.cluster_distribution(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStats {
    pub best: ZoneWindow,
    /// Absent for the full-image fallback.
    pub score: Option<f64>,
    pub fallback: bool,
    pub feasible_candidates: usize,
}

/// `analysis_summary.json` of the detailed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub image: ImageStats,
    pub quality: QualityMetrics,
    pub k_searched: bool,
    pub k_candidates: Vec<KCandidate>,
    pub cluster_labels: BTreeMap<usize, ClusterInterpretation>,
    pub n_3d_clusters: Option<usize>,
    pub physical_types: BTreeMap<String, usize>,
    pub zone: ZoneStats,
    pub pca_explained_variance: Option<[f64; 3]>,
}

impl From<&DetailedAnalysis> for AnalysisSummary {
    fn from(analysis: &DetailedAnalysis) -> Self {
        let classification = &analysis.classification;
        Self {
            image: ImageStats::new(
                &analysis.image_name,
                &analysis.frame.segmentation,
                &analysis.table,
                classification.combined.k,
            ),
            quality: analysis.quality,
            k_searched: classification.combined.searched(),
            k_candidates: classification.combined.candidates.clone(),
            cluster_labels: classification.interpretations.clone(),
            n_3d_clusters: classification.secondary.as_ref().map(|s| s.k),
            physical_types: analysis
                .table
                .type_counts()
                .into_iter()
                .map(|(kind, count)| (kind.to_string(), count))
                .collect(),
            zone: ZoneStats {
                best: analysis.zone.best.clone(),
                score: analysis.zone.best_score,
                fallback: analysis.zone.is_fallback(),
                feasible_candidates: analysis.zone.candidates.len(),
            },
            pca_explained_variance: analysis.pca.as_ref().map(|p| p.explained_variance_ratio),
        }
    }
}

/// Writes any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ReportError> {
    let text = common::serialize(value, FileFormat::Json).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
