//! Composite size, shape and intensity scores.

mod metrics;


use crate::detection::ParticleFeatures;

pub use metrics::{Metric, MetricColumns};

pub const SHAPE_CIRCULARITY_WEIGHT: f64 = 0.4;
pub const SHAPE_SOLIDITY_WEIGHT: f64 = 0.4;
pub const SHAPE_ELONGATION_WEIGHT: f64 = 0.2;

/// Derived per-particle scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    /// Same as the pixel area.
    pub size: f64,
    /// `0.4·circularity + 0.4·solidity + 0.2/(1 + aspect_ratio)`.
    pub shape: f64,
    /// Same as the mean intensity.
    pub intensity: f64,
}

/// A detected particle together with its scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub features: ParticleFeatures,
    pub scores: Scores,
}

pub fn compute_scores(features: &ParticleFeatures) -> Scores {
    Scores {
        size: features.area,
        shape: SHAPE_CIRCULARITY_WEIGHT * features.circularity
            + SHAPE_SOLIDITY_WEIGHT * features.solidity
            + SHAPE_ELONGATION_WEIGHT * (1.0 / (1.0 + features.aspect_ratio)),
        intensity: features.mean_intensity,
    }
}

pub fn score_particle(features: ParticleFeatures) -> Particle {
    Particle {
        scores: compute_scores(&features),
        features,
    }
}

pub fn score_particles(features: &[ParticleFeatures]) -> Vec<Particle> {
    features.iter().copied().map(score_particle).collect()
}
