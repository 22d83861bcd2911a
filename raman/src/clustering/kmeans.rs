//! Lloyd's k-means with k-means++ seeding and parallel restarts.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::ClusterError;
use crate::config::KMeansEffort;

/// Row-major sample matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    data: Vec<f64>,
    dim: usize,
}

impl Samples {
    pub fn from_rows<const D: usize>(rows: &[[f64; D]]) -> Self {
        Self {
            data: rows.iter().flatten().copied().collect(),
            dim: D,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.dim.max(1))
    }

    /// Number of distinct rows (bitwise, with -0.0 folded into 0.0).
    pub fn distinct_rows(&self) -> usize {
        self.rows()
            .map(|row| {
                row.iter()
                    .map(|&v| if v == 0.0 { 0u64 } else { v.to_bits() })
                    .collect::<Vec<u64>>()
            })
            .collect::<HashSet<_>>()
            .len()
    }

    /// Population variance of each column, averaged.
    fn mean_column_variance(&self) -> f64 {
        let n = self.len();
        if n == 0 {
            return 0.0;
        }
        (0..self.dim)
            .map(|d| {
                let column: Vec<f64> = self.rows().map(|r| r[d]).collect();
                crate::math::variance(&column)
            })
            .sum::<f64>()
            / self.dim as f64
    }
}

#[inline]
pub(super) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Result of a k-means fit. Labels are dense in `0..k`.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances of samples to their centroid.
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeansFit {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// k-means parameters. Restart `r` is seeded with `seed + r`, so results are
/// reproducible regardless of thread scheduling.
#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    pub k: usize,
    pub effort: KMeansEffort,
    /// Relative tolerance: convergence when the total squared centroid shift
    /// drops below `tolerance × mean column variance`.
    pub tolerance: f64,
    pub seed: u64,
}

impl KMeans {
    pub fn new(k: usize, effort: KMeansEffort, tolerance: f64, seed: u64) -> Self {
        Self {
            k,
            effort,
            tolerance,
            seed,
        }
    }

    /// Runs all restarts and keeps the lowest-inertia fit (earliest on ties).
    pub fn fit(&self, samples: &Samples) -> Result<KMeansFit, ClusterError> {
        let n = samples.len();
        if self.k == 0 || n < self.k {
            return Err(ClusterError::TooFewSamples {
                samples: n,
                clusters: self.k,
            });
        }
        let distinct = samples.distinct_rows();
        if distinct < self.k {
            return Err(ClusterError::Degenerate {
                requested: self.k,
                distinct,
            });
        }

        let tolerance = self.tolerance * samples.mean_column_variance();
        let fits: Vec<KMeansFit> = (0..self.effort.restarts.max(1))
            .into_par_iter()
            .map(|restart| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(restart as u64));
                run_lloyd(samples, self.k, self.effort.max_iter, tolerance, &mut rng)
            })
            .collect();

        let best = fits
            .into_iter()
            .reduce(|best, fit| if fit.inertia < best.inertia { fit } else { best })
            .ok_or(ClusterError::TooFewSamples {
                samples: n,
                clusters: self.k,
            })?;

        tracing::trace!(
            k = self.k,
            inertia = best.inertia,
            iterations = best.iterations,
            "k-means fit"
        );
        Ok(best)
    }
}

fn run_lloyd(
    samples: &Samples,
    k: usize,
    max_iter: usize,
    tolerance: f64,
    rng: &mut ChaCha8Rng,
) -> KMeansFit {
    let n = samples.len();
    let mut centroids = kmeans_plus_plus(samples, k, rng);
    let mut labels = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        assign(samples, &centroids, &mut labels);
        let (mut updated, counts) = compute_centroids(samples, &labels, k);
        relocate_empty(samples, &labels, &centroids, &counts, &mut updated);

        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;
        if shift <= tolerance {
            break;
        }
    }

    assign(samples, &centroids, &mut labels);
    fill_empty_clusters(samples, k, &mut labels, &mut centroids);
    let inertia = (0..n)
        .map(|i| squared_distance(samples.row(i), &centroids[labels[i]]))
        .sum();

    KMeansFit {
        labels,
        centroids,
        inertia,
        iterations,
    }
}

/// k-means++ seeding: each next center is drawn with probability
/// proportional to its squared distance from the nearest chosen center.
fn kmeans_plus_plus(samples: &Samples, k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = samples.len();
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    centroids.push(samples.row(rng.random_range(0..n)).to_vec());

    let mut min_distances = vec![f64::MAX; n];
    while centroids.len() < k {
        let last = &centroids[centroids.len() - 1];
        for (i, d) in min_distances.iter_mut().enumerate() {
            *d = d.min(squared_distance(samples.row(i), last));
        }

        let total: f64 = min_distances.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = None;
            for (i, &d) in min_distances.iter().enumerate() {
                cumulative += d;
                if d > 0.0 && cumulative > target {
                    chosen = Some(i);
                    break;
                }
            }
            chosen.or_else(|| min_distances.iter().rposition(|&d| d > 0.0))
        } else {
            None
        };
        // All remaining mass is on chosen centers: take any unused point.
        let next = next
            .or_else(|| (0..n).find(|&i| !centroids.iter().any(|c| c.as_slice() == samples.row(i))))
            .unwrap_or(0);
        centroids.push(samples.row(next).to_vec());
    }

    centroids
}

fn assign(samples: &Samples, centroids: &[Vec<f64>], labels: &mut [usize]) {
    for (i, label) in labels.iter_mut().enumerate() {
        let row = samples.row(i);
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let d = squared_distance(row, centroid);
            if d < best_distance {
                best_distance = d;
                best = c;
            }
        }
        *label = best;
    }
}

fn compute_centroids(samples: &Samples, labels: &[usize], k: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
    let dim = samples.dim();
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];
    for (i, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(samples.row(i)) {
            *s += v;
        }
    }
    for (sum, &count) in sums.iter_mut().zip(&counts) {
        if count > 0 {
            for s in sum.iter_mut() {
                *s /= count as f64;
            }
        }
    }
    (sums, counts)
}

/// Moves each empty centroid onto the sample farthest from its current
/// centroid, using each sample at most once.
fn relocate_empty(
    samples: &Samples,
    labels: &[usize],
    previous: &[Vec<f64>],
    counts: &[usize],
    centroids: &mut [Vec<f64>],
) {
    let empty: Vec<usize> = (0..counts.len()).filter(|&c| counts[c] == 0).collect();
    if empty.is_empty() {
        return;
    }
    let mut order: Vec<(usize, f64)> = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| (i, squared_distance(samples.row(i), &previous[label])))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    for (&cluster, &(sample, _)) in empty.iter().zip(&order) {
        centroids[cluster] = samples.row(sample).to_vec();
    }
}

/// Guarantees every cluster owns at least one sample by moving the farthest
/// member of a multi-member cluster into each empty one.
fn fill_empty_clusters(
    samples: &Samples,
    k: usize,
    labels: &mut [usize],
    centroids: &mut Vec<Vec<f64>>,
) {
    let mut counts = vec![0usize; k];
    for &label in labels.iter() {
        counts[label] += 1;
    }
    if counts.iter().all(|&c| c > 0) {
        return;
    }

    for cluster in 0..k {
        if counts[cluster] > 0 {
            continue;
        }
        let donor = (0..labels.len())
            .filter(|&i| counts[labels[i]] > 1)
            .max_by(|&a, &b| {
                let da = squared_distance(samples.row(a), &centroids[labels[a]]);
                let db = squared_distance(samples.row(b), &centroids[labels[b]]);
                da.total_cmp(&db).then(b.cmp(&a))
            });
        if let Some(i) = donor {
            counts[labels[i]] -= 1;
            labels[i] = cluster;
            counts[cluster] = 1;
        }
    }

    *centroids = compute_centroids(samples, labels, k).0;
}
