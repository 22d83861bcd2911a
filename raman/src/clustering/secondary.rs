//! Secondary clustering over (normalized size, shape score, intensity / 255).

use super::kmeans::{KMeans, Samples};
use super::ClusterError;
use crate::config::ClusteringConfig;
use crate::scoring::Particle;

#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryClustering {
    pub k: usize,
    pub labels: Vec<usize>,
    /// The clustered feature vectors, one per particle.
    pub features: Vec<[f64; 3]>,
}

/// Size is min-max normalized (constant sizes → 0), shape is the shape score
/// as-is, intensity is divided by 255.
pub fn secondary_features(particles: &[Particle]) -> Vec<[f64; 3]> {
    let sizes: Vec<f64> = particles.iter().map(|p| p.scores.size).collect();
    let sizes = crate::math::min_max_normalize(&sizes);
    particles
        .iter()
        .zip(sizes)
        .map(|(p, size)| [size, p.scores.shape, p.scores.intensity / 255.0])
        .collect()
}

pub fn cluster_secondary(
    particles: &[Particle],
    config: &ClusteringConfig,
) -> Result<SecondaryClustering, ClusterError> {
    let n = particles.len();
    let k = (n / config.secondary_divisor).clamp(config.secondary_k_min, config.secondary_k_max);
    let features = secondary_features(particles);

    let fit = KMeans::new(k, config.secondary, config.tolerance, config.seed)
        .fit(&Samples::from_rows(&features))?;

    tracing::debug!(particles = n, k, inertia = fit.inertia, "secondary 3D clustering");

    Ok(SecondaryClustering {
        k,
        labels: fit.labels,
        features,
    })
}
