//! Which named metric stands for "size", "shape" and "intensity" in a table.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::table::ParticleRecord;

/// A numeric column of the particle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum Metric {
    #[strum(serialize = "Size_Score")]
    SizeScore,
    #[strum(serialize = "Area_px2")]
    Area,
    #[strum(serialize = "Shape_Score")]
    ShapeScore,
    #[strum(serialize = "Circularity")]
    Circularity,
    #[strum(serialize = "Intensity_Score")]
    IntensityScore,
    #[strum(serialize = "MeanIntensity")]
    MeanIntensity,
    #[strum(serialize = "Solidity")]
    Solidity,
    #[strum(serialize = "AspectRatio")]
    AspectRatio,
    #[strum(serialize = "Perimeter_px")]
    Perimeter,
}

impl Metric {
    /// Value of this metric for a record; `None` when a score column is absent.
    pub fn value(self, record: &ParticleRecord) -> Option<f64> {
        match self {
            Metric::SizeScore => record.size_score,
            Metric::Area => Some(record.area),
            Metric::ShapeScore => record.shape_score,
            Metric::Circularity => Some(record.circularity),
            Metric::IntensityScore => record.intensity_score,
            Metric::MeanIntensity => Some(record.mean_intensity),
            Metric::Solidity => Some(record.solidity),
            Metric::AspectRatio => Some(record.aspect_ratio),
            Metric::Perimeter => Some(record.perimeter),
        }
    }
}

/// Resolved metric for each role, fixed once per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricColumns {
    pub size: Metric,
    pub shape: Metric,
    pub intensity: Metric,
}

impl Default for MetricColumns {
    fn default() -> Self {
        Self {
            size: Metric::SizeScore,
            shape: Metric::ShapeScore,
            intensity: Metric::IntensityScore,
        }
    }
}

impl MetricColumns {
    /// Uses the score columns when every record has them, the raw feature
    /// (area, circularity, mean intensity) otherwise.
    pub fn resolve(records: &[ParticleRecord]) -> Self {
        let pick = |score: Metric, raw: Metric| {
            if records.iter().all(|r| score.value(r).is_some()) {
                score
            } else {
                raw
            }
        };
        Self {
            size: pick(Metric::SizeScore, Metric::Area),
            shape: pick(Metric::ShapeScore, Metric::Circularity),
            intensity: pick(Metric::IntensityScore, Metric::MeanIntensity),
        }
    }

    /// Values of a metric over records; absent values read as 0.
    pub fn column(metric: Metric, records: &[ParticleRecord]) -> Vec<f64> {
        records
            .iter()
            .map(|r| metric.value(r).unwrap_or(0.0))
            .collect()
    }
}
