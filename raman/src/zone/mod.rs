//! Balanced-zone search.
//!
//! Slides square windows of several sizes over the image and scores each
//! window by how well its local cluster distribution matches the global one:
//!
//! `score = w_s·similarity + w_b·balance + w_c·(1 - penalty)`
//!
//! - similarity: `1 / (1 + W1(global, local))`
//! - balance: local Shannon entropy over `ln(k)`
//! - penalty: `exp(-scale / (min_count + 1))`, small when the rarest cluster
//!   is well represented
//!
//! A window is feasible when it holds at least `min_particles_per_cluster × k`
//! particles and every global cluster is present. With no feasible window the
//! search falls back to the full-image square at the origin.


use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ZoneConfig;
use crate::math::{shannon_entropy, wasserstein_1d};
use crate::scoring::Particle;

/// Particle centre with its combined-cluster label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusteredPoint {
    pub x: u32,
    pub y: u32,
    pub cluster: usize,
}

impl ClusteredPoint {
    pub fn from_particles(particles: &[Particle], labels: &[usize]) -> Vec<Self> {
        assert_eq!(particles.len(), labels.len(), "one label per particle");
        particles
            .iter()
            .zip(labels)
            .map(|(p, &cluster)| Self {
                x: p.features.center_x,
                y: p.features.center_y,
                cluster,
            })
            .collect()
    }
}

/// Square window with its member counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneWindow {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub n_particles: usize,
    /// Member count per cluster id.
    pub distribution: BTreeMap<usize, usize>,
}

impl ZoneWindow {
    /// Inclusive on both edges.
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        contains(self.x, self.y, self.size, x, y)
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.size / 2, self.y + self.size / 2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCandidate {
    pub window: ZoneWindow,
    pub score: f64,
    pub similarity: f64,
    pub balance: f64,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSearch {
    pub best: ZoneWindow,
    /// `None` when the full-image fallback was used.
    pub best_score: Option<f64>,
    /// Every feasible window, in scan order (size, then y, then x).
    pub candidates: Vec<ZoneCandidate>,
}

impl ZoneSearch {
    pub fn is_fallback(&self) -> bool {
        self.best_score.is_none()
    }
}

#[inline]
fn contains(x0: u32, y0: u32, size: u32, x: u32, y: u32) -> bool {
    let (x0, y0, size) = (x0 as u64, y0 as u64, size as u64);
    let (x, y) = (x as u64, y as u64);
    x >= x0 && x <= x0 + size && y >= y0 && y <= y0 + size
}

fn cluster_counts(points: impl Iterator<Item = usize>) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for cluster in points {
        *counts.entry(cluster).or_insert(0) += 1;
    }
    counts
}

fn fractions(counts: &BTreeMap<usize, usize>, total: usize) -> Vec<f64> {
    counts.values().map(|&c| c as f64 / total as f64).collect()
}

/// Window origins: `0, step, ...` while `origin + size <= extent`, so a window
/// flush with the far edge is scanned.
fn origins(extent: u32, size: u32, step: u32) -> Vec<u32> {
    match extent.checked_sub(size) {
        Some(last) => (0..=last).step_by(step as usize).collect(),
        None => Vec::new(),
    }
}

pub fn find_balanced_zone(
    points: &[ClusteredPoint],
    width: u32,
    height: u32,
    config: &ZoneConfig,
) -> ZoneSearch {
    config.validate();

    let global_counts = cluster_counts(points.iter().map(|p| p.cluster));
    let total_clusters = global_counts.len();

    let candidates = if total_clusters >= 2 {
        scan_windows(points, width, height, &global_counts, config)
    } else {
        tracing::debug!(total_clusters, "single cluster, no window can be balanced");
        Vec::new()
    };

    // First maximum in scan order.
    let best = candidates
        .iter()
        .reduce(|best, c| if c.score > best.score { c } else { best })
        .map(|c| (c.window.clone(), c.score));

    match best {
        Some((window, score)) => {
            tracing::info!(
                x = window.x,
                y = window.y,
                size = window.size,
                particles = window.n_particles,
                score,
                candidates = candidates.len(),
                "balanced zone"
            );
            ZoneSearch {
                best: window,
                best_score: Some(score),
                candidates,
            }
        }
        None => {
            tracing::info!(
                particles = points.len(),
                "no feasible window, using the full image"
            );
            ZoneSearch {
                best: ZoneWindow {
                    x: 0,
                    y: 0,
                    size: width.min(height),
                    n_particles: points.len(),
                    distribution: global_counts,
                },
                best_score: None,
                candidates,
            }
        }
    }
}

fn scan_windows(
    points: &[ClusteredPoint],
    width: u32,
    height: u32,
    global_counts: &BTreeMap<usize, usize>,
    config: &ZoneConfig,
) -> Vec<ZoneCandidate> {
    let step = u32::try_from(config.step).unwrap_or(u32::MAX);
    let positions: Vec<(u32, u32, u32)> = config
        .window_sizes
        .iter()
        .filter_map(|&size| u32::try_from(size).ok())
        .flat_map(|size| {
            origins(height, size, step).into_iter().flat_map(move |y| {
                origins(width, size, step)
                    .into_iter()
                    .map(move |x| (x, y, size))
            })
        })
        .collect();

    let global = fractions(global_counts, points.len());

    positions
        .into_par_iter()
        .filter_map(|(x, y, size)| score_window(points, x, y, size, global_counts, &global, config))
        .collect()
}

fn score_window(
    points: &[ClusteredPoint],
    x: u32,
    y: u32,
    size: u32,
    global_counts: &BTreeMap<usize, usize>,
    global: &[f64],
    config: &ZoneConfig,
) -> Option<ZoneCandidate> {
    let total_clusters = global_counts.len();
    let members: Vec<&ClusteredPoint> = points
        .iter()
        .filter(|p| contains(x, y, size, p.x, p.y))
        .collect();
    if members.len() < config.min_particles_per_cluster * total_clusters {
        return None;
    }

    let local_counts = cluster_counts(members.iter().map(|p| p.cluster));
    if local_counts.len() != total_clusters {
        return None;
    }

    let local = fractions(&local_counts, members.len());
    let similarity = 1.0 / (1.0 + wasserstein_1d(global, &local));
    let balance = shannon_entropy(&local) / (total_clusters as f64).ln();
    let min_count = local_counts.values().copied().min().unwrap_or(0);
    let penalty = (-config.penalty_scale / (min_count as f64 + 1.0)).exp();
    let score = config.similarity_weight * similarity
        + config.balance_weight * balance
        + config.coverage_weight * (1.0 - penalty);

    Some(ZoneCandidate {
        window: ZoneWindow {
            x,
            y,
            size,
            n_particles: members.len(),
            distribution: local_counts,
        },
        score,
        similarity,
        balance,
        penalty,
    })
}
