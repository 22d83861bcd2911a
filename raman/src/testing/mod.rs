//! Test utilities shared across modules.

use image::{GrayImage, Luma};

use crate::detection::ParticleFeatures;
use crate::scoring::{score_particle, Particle};
use crate::segmentation::Band;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A scored particle with the given geometry. Perimeter follows from a circle
/// of the same area scaled so circularity matches.
pub fn particle(
    band: Band,
    area: f64,
    circularity: f64,
    aspect_ratio: f64,
    solidity: f64,
    mean_intensity: f64,
    center: (u32, u32),
) -> Particle {
    let perimeter = (4.0 * std::f64::consts::PI * area / circularity.max(1e-3)).sqrt();
    score_particle(ParticleFeatures {
        band,
        area,
        perimeter,
        circularity,
        aspect_ratio,
        solidity,
        mean_intensity,
        center_x: center.0,
        center_y: center.1,
    })
}

/// Draws filled disks `(cx, cy, radius, value)` on a uniform background.
pub fn disks_image(width: u32, height: u32, background: u8, disks: &[(i32, i32, i32, u8)]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as i32, y as i32);
        let value = disks
            .iter()
            .find(|&&(cx, cy, r, _)| (x - cx).pow(2) + (y - cy).pow(2) <= r * r)
            .map(|d| d.3)
            .unwrap_or(background);
        Luma([value])
    })
}

/// A 4×6 grid of disks with varied radii and two gray levels on a dark
/// background. Every disk has a distinct radius.
pub fn particle_field() -> GrayImage {
    let mut disks = Vec::new();
    for row in 0..4 {
        for col in 0..6 {
            let i = row * 6 + col;
            let radius = 4 + i;
            let value = if i % 2 == 0 { 130 } else { 235 };
            disks.push((40 + col * 70, 40 + row * 75, radius.min(28), value as u8));
        }
    }
    disks_image(440, 300, 25, &disks)
}
