//! Small numeric helpers shared by the analysis stages.

mod bbox;


pub use bbox::Aabb;

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`). Returns 0.0 for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Min and max of a slice, `None` when empty.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Rescales values to [0, 1]. A constant input maps to all zeros.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let Some((lo, hi)) = min_max(values) else {
        return Vec::new();
    };
    let range = hi - lo;
    if range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - lo) / range).collect()
}

/// Shannon entropy in nats of a probability vector. Zero entries are skipped.
pub fn shannon_entropy(probabilities: &[f64]) -> f64 {
    probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum()
}

/// First Wasserstein distance between two equally-weighted empirical
/// distributions whose samples are the given values.
///
/// Integrates `|F_u - F_v|` over the merged sample support. Both slices must be
/// non-empty; an empty side yields 0.0.
pub fn wasserstein_1d(u: &[f64], v: &[f64]) -> f64 {
    if u.is_empty() || v.is_empty() {
        return 0.0;
    }

    let mut u_sorted = u.to_vec();
    let mut v_sorted = v.to_vec();
    u_sorted.sort_by(f64::total_cmp);
    v_sorted.sort_by(f64::total_cmp);

    let mut all: Vec<f64> = u_sorted.iter().chain(v_sorted.iter()).copied().collect();
    all.sort_by(f64::total_cmp);

    let mut distance = 0.0;
    let mut iu = 0;
    let mut iv = 0;
    for pair in all.windows(2) {
        let (x, next) = (pair[0], pair[1]);
        while iu < u_sorted.len() && u_sorted[iu] <= x {
            iu += 1;
        }
        while iv < v_sorted.len() && v_sorted[iv] <= x {
            iv += 1;
        }
        let cdf_u = iu as f64 / u_sorted.len() as f64;
        let cdf_v = iv as f64 / v_sorted.len() as f64;
        distance += (cdf_u - cdf_v).abs() * (next - x);
    }

    distance
}
