//! Mean silhouette coefficient.

use rayon::prelude::*;

use super::kmeans::{squared_distance, Samples};
use super::ClusterError;

/// Mean silhouette over all samples, with Euclidean distances.
///
/// For sample `i` with mean intra-cluster distance `a` and smallest mean
/// distance to another cluster `b`: `s = (b - a) / max(a, b)`, and 0 for
/// members of singleton clusters. Needs between 2 and `n - 1` distinct labels.
pub fn silhouette_score(samples: &Samples, labels: &[usize]) -> Result<f64, ClusterError> {
    let n = samples.len();
    debug_assert_eq!(labels.len(), n);

    let k = labels.iter().max().map_or(0, |&m| m + 1);
    let mut counts = vec![0usize; k];
    for &label in labels {
        counts[label] += 1;
    }
    let distinct = counts.iter().filter(|&&c| c > 0).count();
    if distinct < 2 || distinct >= n {
        return Err(ClusterError::UndefinedSilhouette { labels: distinct });
    }

    // Collected before summing so the result does not depend on scheduling.
    let per_sample: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            if counts[own] <= 1 {
                return 0.0;
            }
            let mut sums = vec![0.0; k];
            let row = samples.row(i);
            for j in 0..n {
                if j != i {
                    sums[labels[j]] += squared_distance(row, samples.row(j)).sqrt();
                }
            }
            let a = sums[own] / (counts[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && counts[c] > 0)
                .map(|c| sums[c] / counts[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .collect();

    Ok(per_sample.iter().sum::<f64>() / n as f64)
}
