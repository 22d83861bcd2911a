//! Principal component projection of the particle features.
//!
//! Six features (size, circularity, aspect ratio, solidity, intensity score,
//! perimeter) are standardized and projected onto the three leading
//! eigenvectors of their covariance matrix.


use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clustering::standardize;
use crate::scoring::Particle;

pub const PCA_FEATURES: usize = 6;
pub const PCA_COMPONENTS: usize = 3;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PcaError {
    #[error("PCA needs at least 2 particles, got {0}")]
    TooFewSamples(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaProjection {
    /// `[PC1, PC2, PC3]` per particle.
    pub coordinates: Vec<[f64; PCA_COMPONENTS]>,
    /// Share of the total variance carried by each component.
    pub explained_variance_ratio: [f64; PCA_COMPONENTS],
    /// Unit loading vectors; the largest-magnitude loading is positive.
    pub components: [[f64; PCA_FEATURES]; PCA_COMPONENTS],
}

fn pca_rows(particles: &[Particle]) -> Vec<[f64; PCA_FEATURES]> {
    particles
        .iter()
        .map(|p| {
            [
                p.scores.size,
                p.features.circularity,
                p.features.aspect_ratio,
                p.features.solidity,
                p.scores.intensity,
                p.features.perimeter,
            ]
        })
        .collect()
}

pub fn project(particles: &[Particle]) -> Result<PcaProjection, PcaError> {
    let n = particles.len();
    if n < 2 {
        return Err(PcaError::TooFewSamples(n));
    }

    let mut rows = pca_rows(particles);
    standardize(&mut rows);
    let data = DMatrix::from_fn(n, PCA_FEATURES, |i, j| rows[i][j]);
    let covariance = data.transpose() * &data / (n - 1) as f64;

    let eigen = SymmetricEigen::new(covariance);
    // nalgebra does not order the eigenvalues.
    let mut order: Vec<usize> = (0..PCA_FEATURES).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]).then(a.cmp(&b)));

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    let mut explained_variance_ratio = [0.0; PCA_COMPONENTS];
    let mut components = [[0.0; PCA_FEATURES]; PCA_COMPONENTS];
    for (c, &index) in order.iter().take(PCA_COMPONENTS).enumerate() {
        let column = eigen.eigenvectors.column(index);
        let pivot = column
            .iter()
            .copied()
            .reduce(|a, b| if b.abs() > a.abs() { b } else { a })
            .unwrap_or(1.0);
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        for (d, v) in column.iter().enumerate() {
            components[c][d] = sign * v;
        }
        if total > 0.0 {
            explained_variance_ratio[c] = eigen.eigenvalues[index].max(0.0) / total;
        }
    }

    let coordinates = rows
        .iter()
        .map(|row| {
            let mut out = [0.0; PCA_COMPONENTS];
            for (o, axis) in out.iter_mut().zip(&components) {
                *o = row.iter().zip(axis).map(|(x, a)| x * a).sum();
            }
            out
        })
        .collect();

    tracing::debug!(?explained_variance_ratio, "PCA");

    Ok(PcaProjection {
        coordinates,
        explained_variance_ratio,
        components,
    })
}
