//! Primary clustering over five standardized, weighted features.
//!
//! When there are enough particles, k is searched in `k_min..=min(k_max, n-1)`
//! with moderate effort and scored by silhouette and inverted normalized
//! inertia; the chosen k is then refit with more restarts and iterations.

use serde::{Deserialize, Serialize};

use super::kmeans::{KMeans, Samples};
use super::silhouette::silhouette_score;
use super::ClusterError;
use crate::config::ClusteringConfig;
use crate::scoring::Particle;

/// Search diagnostics for one candidate k.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KCandidate {
    pub k: usize,
    pub silhouette: f64,
    pub inertia: f64,
    /// `1 - (inertia - min) / (max - min)`; 0 for all candidates when equal.
    pub normalized_inertia: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedClustering {
    pub k: usize,
    /// Dense labels in `0..k`, one per particle.
    pub labels: Vec<usize>,
    pub inertia: f64,
    /// Empty when k came from the small-count rule.
    pub candidates: Vec<KCandidate>,
}

impl CombinedClustering {
    pub fn searched(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn best_candidate(&self) -> Option<&KCandidate> {
        self.candidates.iter().find(|c| c.k == self.k)
    }
}

/// Standardizes [size, circularity, aspect ratio, solidity, intensity] to zero
/// mean and unit population variance, then multiplies by the feature weights.
/// Constant columns become 0.
pub fn combined_features(particles: &[Particle], weights: &[f64; 5]) -> Samples {
    let mut rows: Vec<[f64; 5]> = particles
        .iter()
        .map(|p| {
            [
                p.scores.size,
                p.features.circularity,
                p.features.aspect_ratio,
                p.features.solidity,
                p.scores.intensity,
            ]
        })
        .collect();
    standardize(&mut rows);
    for row in rows.iter_mut() {
        for (v, w) in row.iter_mut().zip(weights) {
            *v *= w;
        }
    }
    Samples::from_rows(&rows)
}

pub(crate) fn standardize<const D: usize>(rows: &mut [[f64; D]]) {
    for d in 0..D {
        let column: Vec<f64> = rows.iter().map(|r| r[d]).collect();
        let constant = crate::math::min_max(&column).map_or(true, |(lo, hi)| lo == hi);
        let mean = crate::math::mean(&column);
        let std = crate::math::std_dev(&column);
        for row in rows.iter_mut() {
            row[d] = if constant || std <= 0.0 {
                0.0
            } else {
                (row[d] - mean) / std
            };
        }
    }
}

/// Runs the primary clustering.
///
/// Fails with [`ClusterError::Degenerate`] when fewer distinct feature vectors
/// exist than the k being fit.
pub fn cluster_combined(
    particles: &[Particle],
    config: &ClusteringConfig,
) -> Result<CombinedClustering, ClusterError> {
    config.validate();
    let n = particles.len();
    let samples = combined_features(particles, &config.feature_weights);

    let k_max = config.k_max.min(n.saturating_sub(1));
    let (k, candidates) = if n >= config.search_min_particles && config.k_min <= k_max {
        let candidates = search_k(&samples, config, config.k_min..=k_max)?;
        let best = best_candidate(&candidates);
        (best.k, candidates)
    } else {
        let k = (n / config.fallback_divisor).clamp(config.fallback_k_min, config.fallback_k_max);
        tracing::debug!(n, k, "too few particles for k search, using fixed k");
        (k, Vec::new())
    };

    let fit = KMeans::new(k, config.refine, config.tolerance, config.seed).fit(&samples)?;

    tracing::info!(
        particles = n,
        k,
        searched = !candidates.is_empty(),
        inertia = fit.inertia,
        "combined clustering"
    );

    Ok(CombinedClustering {
        k,
        labels: fit.labels,
        inertia: fit.inertia,
        candidates,
    })
}

fn search_k(
    samples: &Samples,
    config: &ClusteringConfig,
    range: std::ops::RangeInclusive<usize>,
) -> Result<Vec<KCandidate>, ClusterError> {
    let mut candidates = Vec::new();
    for k in range {
        let fit = KMeans::new(k, config.search, config.tolerance, config.seed).fit(samples)?;
        let silhouette = silhouette_score(samples, &fit.labels)?;
        tracing::debug!(k, silhouette, inertia = fit.inertia, "k candidate");
        candidates.push(KCandidate {
            k,
            silhouette,
            inertia: fit.inertia,
            normalized_inertia: 0.0,
            score: 0.0,
        });
    }

    let inertias: Vec<f64> = candidates.iter().map(|c| c.inertia).collect();
    let (lo, hi) = crate::math::min_max(&inertias).unwrap_or((0.0, 0.0));
    let inertia_weight = 1.0 - config.silhouette_weight;
    for c in candidates.iter_mut() {
        c.normalized_inertia = if hi > lo {
            1.0 - (c.inertia - lo) / (hi - lo)
        } else {
            0.0
        };
        c.score = config.silhouette_weight * c.silhouette + inertia_weight * c.normalized_inertia;
    }

    Ok(candidates)
}

/// Highest score; the smallest k wins ties.
fn best_candidate(candidates: &[KCandidate]) -> &KCandidate {
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.score > best.score {
            best = c;
        }
    }
    best
}
