//! Configuration for the analysis pipeline.
//!
//! Every struct has defaults matching the reference analysis and a
//! `validate()` that panics on inconsistent values. Configs can be loaded from
//! YAML or JSON; missing fields fall back to their defaults.

use std::path::{Path, PathBuf};

use common::{FileExtensionError, FileFormat, SerdeFormatError};
use serde::{Deserialize, Serialize};


// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unsupported config format '{path}': {source}")]
    Format {
        path: PathBuf,
        source: FileExtensionError,
    },
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: SerdeFormatError,
    },
}

// ============================================================================
// Segmentation
// ============================================================================

/// Contrast equalization and band thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Values below this are dark (Type 3).
    pub thresh1: u8,
    /// Values at or above this are bright (Type 1).
    pub thresh2: u8,
    /// CLAHE clip limit, relative to the mean histogram bin height.
    pub clip_limit: f32,
    /// CLAHE tiles per axis.
    pub tile_grid: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            thresh1: 85,
            thresh2: 170,
            clip_limit: 2.5,
            tile_grid: 8,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) {
        assert!(
            self.thresh1 <= self.thresh2,
            "thresh1 ({}) must not exceed thresh2 ({})",
            self.thresh1,
            self.thresh2
        );
        assert!(
            self.clip_limit >= 0.0,
            "clip_limit must be non-negative, got {}",
            self.clip_limit
        );
        assert!(self.tile_grid > 0, "tile_grid must be positive");
    }
}

// ============================================================================
// Detection
// ============================================================================

/// Connectivity used for region labeling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Only horizontal and vertical neighbors are connected.
    Four,
    /// Diagonal neighbors are connected too. Matches 8-connected boundary
    /// tracing, so every labeled region has a single outer contour.
    #[default]
    Eight,
}

impl Connectivity {
    /// Connectivity of the background when the foreground uses `self`.
    pub fn dual(self) -> Self {
        match self {
            Connectivity::Four => Connectivity::Eight,
            Connectivity::Eight => Connectivity::Four,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Regions with fewer pixels are discarded.
    pub min_area: usize,
    /// Side of the square structuring element used for opening. 0 or 1 disables it.
    pub opening_size: usize,
    pub connectivity: Connectivity,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_area: 5,
            opening_size: 2,
            connectivity: Connectivity::Eight,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) {
        assert!(self.min_area >= 1, "min_area must be at least 1");
        assert!(
            self.opening_size <= 15,
            "opening_size must be <= 15, got {}",
            self.opening_size
        );
    }
}

// ============================================================================
// Clustering
// ============================================================================

/// Restart count and iteration cap of one k-means phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansEffort {
    pub restarts: usize,
    pub max_iter: usize,
}

impl KMeansEffort {
    pub const fn new(restarts: usize, max_iter: usize) -> Self {
        Self { restarts, max_iter }
    }

    pub fn validate(&self) {
        assert!(self.restarts >= 1, "k-means needs at least one restart");
        assert!(self.max_iter >= 1, "k-means needs at least one iteration");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Weights applied after standardization to
    /// [size, circularity, aspect ratio, solidity, intensity].
    pub feature_weights: [f64; 5],
    /// Minimum particle count for the k search; below it `fallback_k` is used.
    pub search_min_particles: usize,
    pub k_min: usize,
    pub k_max: usize,
    /// `k = clamp(n / fallback_divisor, fallback_k_min, fallback_k_max)`.
    pub fallback_divisor: usize,
    pub fallback_k_min: usize,
    pub fallback_k_max: usize,
    /// Weight of the silhouette in the selection score; inertia gets the rest.
    pub silhouette_weight: f64,
    pub seed: u64,
    /// Relative convergence tolerance on centroid shift.
    pub tolerance: f64,
    pub search: KMeansEffort,
    pub refine: KMeansEffort,
    /// Secondary 3D clustering: `k = clamp(n / secondary_divisor, secondary_k_min, secondary_k_max)`.
    pub secondary_divisor: usize,
    pub secondary_k_min: usize,
    pub secondary_k_max: usize,
    pub secondary: KMeansEffort,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            feature_weights: [1.3, 1.0, 0.9, 1.0, 1.4],
            search_min_particles: 12,
            k_min: 6,
            k_max: 10,
            fallback_divisor: 10,
            fallback_k_min: 6,
            fallback_k_max: 9,
            silhouette_weight: 0.7,
            seed: 42,
            tolerance: 1e-4,
            search: KMeansEffort::new(50, 500),
            refine: KMeansEffort::new(100, 800),
            secondary_divisor: 15,
            secondary_k_min: 7,
            secondary_k_max: 10,
            secondary: KMeansEffort::new(80, 600),
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) {
        assert!(
            self.feature_weights.iter().all(|w| *w > 0.0),
            "feature weights must be positive, got {:?}",
            self.feature_weights
        );
        assert!(
            2 <= self.k_min && self.k_min <= self.k_max,
            "k range must satisfy 2 <= k_min <= k_max, got {}..={}",
            self.k_min,
            self.k_max
        );
        assert!(
            1 <= self.fallback_k_min && self.fallback_k_min <= self.fallback_k_max,
            "fallback k range is empty: {}..={}",
            self.fallback_k_min,
            self.fallback_k_max
        );
        assert!(
            1 <= self.secondary_k_min && self.secondary_k_min <= self.secondary_k_max,
            "secondary k range is empty: {}..={}",
            self.secondary_k_min,
            self.secondary_k_max
        );
        assert!(self.fallback_divisor > 0, "fallback_divisor must be positive");
        assert!(self.secondary_divisor > 0, "secondary_divisor must be positive");
        assert!(
            (0.0..=1.0).contains(&self.silhouette_weight),
            "silhouette_weight must be in [0, 1], got {}",
            self.silhouette_weight
        );
        assert!(self.tolerance >= 0.0, "tolerance must be non-negative");
        self.search.validate();
        self.refine.validate();
        self.secondary.validate();
    }
}

// ============================================================================
// Balanced zone
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Square window sides in pixels, scanned in this order.
    pub window_sizes: Vec<usize>,
    pub step: usize,
    pub similarity_weight: f64,
    pub balance_weight: f64,
    pub coverage_weight: f64,
    /// Penalty is `exp(-penalty_scale / (min_count + 1))`.
    pub penalty_scale: f64,
    /// A window needs at least this many particles per global cluster.
    pub min_particles_per_cluster: usize,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            window_sizes: vec![300, 400, 500, 600, 700, 800],
            step: 50,
            similarity_weight: 0.3,
            balance_weight: 0.5,
            coverage_weight: 0.2,
            penalty_scale: 5.0,
            min_particles_per_cluster: 2,
        }
    }
}

impl ZoneConfig {
    pub fn validate(&self) {
        assert!(self.step > 0, "zone step must be positive");
        assert!(
            self.window_sizes.iter().all(|s| *s > 0),
            "window sizes must be positive, got {:?}",
            self.window_sizes
        );
        assert!(
            self.similarity_weight >= 0.0
                && self.balance_weight >= 0.0
                && self.coverage_weight >= 0.0,
            "zone score weights must be non-negative"
        );
        assert!(self.penalty_scale >= 0.0, "penalty_scale must be non-negative");
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub render_plots: bool,
    /// Gaussian sigma of the particle density map.
    pub density_sigma: f32,
    /// Radius of the per-particle splat in parametric heatmaps.
    pub splat_radius: usize,
    pub splat_sigma: f32,
    /// Smoothing applied to the accumulated splats.
    pub splat_smoothing_sigma: f32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            render_plots: true,
            density_sigma: 15.0,
            splat_radius: 30,
            splat_sigma: 15.0,
            splat_smoothing_sigma: 10.0,
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) {
        assert!(self.density_sigma > 0.0, "density_sigma must be positive");
        assert!(self.splat_sigma > 0.0, "splat_sigma must be positive");
        assert!(
            self.splat_smoothing_sigma > 0.0,
            "splat_smoothing_sigma must be positive"
        );
    }
}

// ============================================================================
// Top-level
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub segmentation: SegmentationConfig,
    pub detection: DetectionConfig,
    pub clustering: ClusteringConfig,
    pub zone: ZoneConfig,
    pub report: ReportConfig,
    /// Images with fewer particles skip clustering entirely.
    pub min_particles: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            detection: DetectionConfig::default(),
            clustering: ClusteringConfig::default(),
            zone: ZoneConfig::default(),
            report: ReportConfig::default(),
            min_particles: 5,
        }
    }
}

impl AnalysisConfig {
    /// # Panics
    /// Panics with a descriptive message when any section is inconsistent.
    pub fn validate(&self) {
        self.segmentation.validate();
        self.detection.validate();
        self.clustering.validate();
        self.zone.validate();
        self.report.validate();
        assert!(self.min_particles >= 1, "min_particles must be at least 1");
    }

    /// Loads a YAML or JSON config, chosen by file extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = FileFormat::from_file_name(&path.to_string_lossy()).map_err(|source| {
            ConfigError::Format {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            common::deserialize(&text, format).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "loaded analysis config");
        Ok(config)
    }
}
