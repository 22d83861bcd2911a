//! Descriptive labels for combined clusters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::scoring::Particle;

/// Label given to particles whose cluster has no interpretation.
pub const UNCLASSIFIED_LABEL: &str = "Unclassified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum SizeClass {
    VerySmall,
    Small,
    Medium,
    Large,
    VeryLarge,
}

impl SizeClass {
    pub fn from_mean(size: f64) -> Self {
        if size < 50.0 {
            Self::VerySmall
        } else if size < 150.0 {
            Self::Small
        } else if size < 400.0 {
            Self::Medium
        } else if size < 1000.0 {
            Self::Large
        } else {
            Self::VeryLarge
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ShapeClass {
    Spherical,
    Compact,
    Irregular,
    Intermediate,
}

impl ShapeClass {
    pub fn from_mean(circularity: f64) -> Self {
        if circularity > 0.75 {
            Self::Spherical
        } else if circularity > 0.6 {
            Self::Compact
        } else if circularity < 0.4 {
            Self::Irregular
        } else {
            Self::Intermediate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum IntensityClass {
    Dark,
    Gray,
    Bright,
}

impl IntensityClass {
    pub fn from_mean(intensity: f64) -> Self {
        if intensity < 90.0 {
            Self::Dark
        } else if intensity < 160.0 {
            Self::Gray
        } else {
            Self::Bright
        }
    }
}

/// Mean scores of one cluster and their bucketed classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInterpretation {
    pub cluster: usize,
    pub count: usize,
    pub mean_size: f64,
    pub mean_circularity: f64,
    pub mean_intensity: f64,
    pub size: SizeClass,
    pub shape: ShapeClass,
    pub intensity: IntensityClass,
}

impl ClusterInterpretation {
    pub fn from_means(
        cluster: usize,
        count: usize,
        mean_size: f64,
        mean_circularity: f64,
        mean_intensity: f64,
    ) -> Self {
        Self {
            cluster,
            count,
            mean_size,
            mean_circularity,
            mean_intensity,
            size: SizeClass::from_mean(mean_size),
            shape: ShapeClass::from_mean(mean_circularity),
            intensity: IntensityClass::from_mean(mean_intensity),
        }
    }

    /// `{intensity}_{size}_{shape}`, e.g. `Gray_Medium_Compact`.
    pub fn label(&self) -> String {
        format!("{}_{}_{}", self.intensity, self.size, self.shape)
    }
}

/// Interprets clusters `0..k`. Clusters without members are absent.
pub fn interpret_clusters(
    particles: &[Particle],
    labels: &[usize],
    k: usize,
) -> BTreeMap<usize, ClusterInterpretation> {
    debug_assert_eq!(particles.len(), labels.len());

    let mut sums = vec![(0usize, 0.0f64, 0.0f64, 0.0f64); k];
    for (p, &label) in particles.iter().zip(labels) {
        if label >= k {
            continue;
        }
        let entry = &mut sums[label];
        entry.0 += 1;
        entry.1 += p.scores.size;
        entry.2 += p.features.circularity;
        entry.3 += p.scores.intensity;
    }

    sums.into_iter()
        .enumerate()
        .filter(|(_, (count, ..))| *count > 0)
        .map(|(cluster, (count, size, circ, intensity))| {
            let n = count as f64;
            (
                cluster,
                ClusterInterpretation::from_means(cluster, count, size / n, circ / n, intensity / n),
            )
        })
        .collect()
}

/// Per-particle label strings; particles of uninterpreted clusters get
/// [`UNCLASSIFIED_LABEL`].
pub fn particle_labels(
    labels: &[usize],
    interpretations: &BTreeMap<usize, ClusterInterpretation>,
) -> Vec<String> {
    labels
        .iter()
        .map(|label| {
            interpretations
                .get(label)
                .map(ClusterInterpretation::label)
                .unwrap_or_else(|| UNCLASSIFIED_LABEL.to_string())
        })
        .collect()
}
