//! Image quality metrics of the raw grayscale image.


use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::math::{mean, shannon_entropy, std_dev, variance};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Standard deviation of the intensities.
    pub contrast: f64,
    pub dynamic_range: u8,
    pub min: u8,
    pub max: u8,
    /// Variance of the 4-neighbour Laplacian.
    pub sharpness: f64,
    /// `mean / std`, 0 for a constant image.
    pub snr: f64,
    /// Histogram entropy in nats.
    pub entropy: f64,
    /// `std / mean · 100`, 0 for an all-black image.
    pub coefficient_of_variation: f64,
}

impl QualityMetrics {
    pub fn log(&self) {
        tracing::info!(
            contrast = self.contrast,
            dynamic_range = self.dynamic_range,
            min = self.min,
            max = self.max,
            sharpness = self.sharpness,
            snr = self.snr,
            entropy = self.entropy,
            cv_percent = self.coefficient_of_variation,
            "image quality"
        );
    }
}

pub fn compute_quality(gray: &GrayImage) -> QualityMetrics {
    let values: Vec<f64> = gray.as_raw().iter().map(|&v| v as f64).collect();
    let m = mean(&values);
    let std = std_dev(&values);

    let (min, max) = gray
        .as_raw()
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let (min, max) = if values.is_empty() { (0, 0) } else { (min, max) };

    QualityMetrics {
        contrast: std,
        dynamic_range: max - min,
        min,
        max,
        sharpness: variance(&laplacian(gray)),
        snr: if std > 0.0 { m / std } else { 0.0 },
        entropy: histogram_entropy(gray),
        coefficient_of_variation: if m > 0.0 { std / m * 100.0 } else { 0.0 },
    }
}

/// Mirrors an index across the border without repeating the edge pixel
/// (`dcb|abcd|cba`).
#[inline]
fn reflect_101(i: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * (len - 1) - i;
    }
    i as usize
}

/// `[[0, 1, 0], [1, -4, 1], [0, 1, 0]]` with reflect-101 borders.
pub fn laplacian(gray: &GrayImage) -> Vec<f64> {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let raw = gray.as_raw();
    let at = |x: i64, y: i64| raw[reflect_101(y, h) * w as usize + reflect_101(x, w)] as f64;

    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            out.push(at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y));
        }
    }
    out
}

pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for &v in gray.as_raw() {
        hist[v as usize] += 1;
    }
    hist
}

fn histogram_entropy(gray: &GrayImage) -> f64 {
    let total = gray.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let probabilities: Vec<f64> = histogram(gray)
        .iter()
        .map(|&c| c as f64 / total as f64)
        .collect();
    shannon_entropy(&probabilities)
}
