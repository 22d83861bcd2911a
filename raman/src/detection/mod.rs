//! Particle detection: opening, connected regions, boundary geometry.
//!
//! Each band mask is opened to remove speckle, labeled into connected regions,
//! and every region large enough becomes one [`ParticleFeatures`] record plus
//! its traced boundary.

mod contour;
mod geometry;
mod labeling;
mod morphology;

#[cfg(test)]
mod tests;

use std::f64::consts::PI;

use glam::IVec2;
use image::GrayImage;
use rayon::prelude::*;

use crate::config::{Connectivity, DetectionConfig};
use crate::math::Aabb;
use crate::segmentation::{Band, Mask, Segmentation};

pub use contour::{compress_collinear, trace_outer_boundary};
pub use geometry::{closed_arc_length, convex_hull, polygon_centroid, signed_area};
pub use labeling::LabelMap;
pub use morphology::open_mask;

/// Added to the squared perimeter so degenerate regions don't divide by zero.
const CIRCULARITY_EPSILON: f64 = 1e-6;

/// Geometric and intensity features of one detected region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleFeatures {
    pub band: Band,
    /// Pixel count of the opened region.
    pub area: f64,
    /// Closed length of the traced outer boundary.
    pub perimeter: f64,
    /// `4π·area / perimeter²`.
    pub circularity: f64,
    /// Bounding box width / height.
    pub aspect_ratio: f64,
    /// Boundary polygon area / convex hull area.
    pub solidity: f64,
    /// Mean equalized intensity over the region's pixels.
    pub mean_intensity: f64,
    pub center_x: u32,
    pub center_y: u32,
}

/// Particles found in one band.
#[derive(Debug, Clone)]
pub struct BandDetection {
    pub band: Band,
    pub particles: Vec<ParticleFeatures>,
    /// Compressed outer boundary of each particle, same order as `particles`.
    pub contours: Vec<Vec<IVec2>>,
    /// Pixels belonging to surviving particles.
    pub footprint: Mask,
}

/// Detection results for all three bands, in `Band::ALL` order.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bands: Vec<BandDetection>,
}

impl Detection {
    pub fn band(&self, band: Band) -> Option<&BandDetection> {
        self.bands.iter().find(|b| b.band == band)
    }

    pub fn total(&self) -> usize {
        self.bands.iter().map(|b| b.particles.len()).sum()
    }

    /// All particles, bright first, then mid, then dark.
    pub fn particles(&self) -> Vec<ParticleFeatures> {
        self.bands
            .iter()
            .flat_map(|b| b.particles.iter().copied())
            .collect()
    }
}

/// Pixel statistics of one labeled region.
#[derive(Debug, Clone, Copy)]
struct Region {
    bbox: Aabb,
    /// First pixel in raster order.
    first: IVec2,
    area: usize,
    intensity_sum: u64,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            bbox: Aabb::empty(),
            first: IVec2::ZERO,
            area: 0,
            intensity_sum: 0,
        }
    }
}

/// Runs detection on every band of a segmentation.
pub fn detect_all(segmentation: &Segmentation, config: &DetectionConfig) -> Detection {
    let bands = Band::ALL
        .iter()
        .map(|&band| {
            detect_particles(
                segmentation.mask(band),
                &segmentation.equalized,
                band,
                config,
            )
        })
        .collect();
    Detection { bands }
}

/// Detects particles in one band mask.
///
/// # Arguments
/// * `mask` - Band mask (foreground = pixel belongs to the band)
/// * `equalized` - Equalized image the mask was derived from
/// * `band` - Band label attached to every particle
/// * `config` - Opening size, minimum area and connectivity
pub fn detect_particles(
    mask: &Mask,
    equalized: &GrayImage,
    band: Band,
    config: &DetectionConfig,
) -> BandDetection {
    config.validate();
    debug_assert_eq!(mask.width(), equalized.width() as usize);
    debug_assert_eq!(mask.height(), equalized.height() as usize);

    let width = mask.width();
    let height = mask.height();
    let opened = open_mask(mask, config.opening_size);

    // A mask covering the whole frame has no boundary between foreground and
    // background, so it holds no particle.
    if opened.is_full() || opened.count_ones() == 0 {
        tracing::debug!(%band, "no particle regions");
        return BandDetection {
            band,
            particles: Vec::new(),
            contours: Vec::new(),
            footprint: Mask::new(width, height),
        };
    }

    let labels = LabelMap::from_mask(&opened, config.connectivity);
    let regions = collect_regions(&labels, equalized);
    let nested = nested_regions(&opened, &regions, config.connectivity);

    let measured: Vec<Option<(ParticleFeatures, Vec<IVec2>)>> = regions
        .par_iter()
        .enumerate()
        .map(|(idx, region)| {
            if region.area < config.min_area || nested[idx] {
                return None;
            }
            let label = idx as u32 + 1;
            let boundary = trace_outer_boundary(&labels, label, region.first, region.area);
            let contour = compress_collinear(&boundary);
            Some((measure(band, region, &contour), contour))
        })
        .collect();

    let mut keep = vec![false; regions.len() + 1];
    let mut particles = Vec::new();
    let mut contours = Vec::new();
    for (idx, entry) in measured.into_iter().enumerate() {
        if let Some((features, contour)) = entry {
            keep[idx + 1] = true;
            particles.push(features);
            contours.push(contour);
        }
    }

    let footprint = Mask::from_vec(
        width,
        height,
        labels.labels().iter().map(|&l| keep[l as usize]).collect(),
    );

    tracing::debug!(
        %band,
        regions = regions.len(),
        nested = nested.iter().filter(|&&n| n).count(),
        particles = particles.len(),
        "detected particles"
    );

    BandDetection {
        band,
        particles,
        contours,
        footprint,
    }
}

fn collect_regions(labels: &LabelMap, equalized: &GrayImage) -> Vec<Region> {
    let mut regions = vec![Region::default(); labels.num_labels()];
    let width = labels.width();
    let pixels = equalized.as_raw();

    for (idx, &label) in labels.labels().iter().enumerate() {
        if label == 0 {
            continue;
        }
        let (x, y) = (idx % width, idx / width);
        let region = &mut regions[label as usize - 1];
        if region.area == 0 {
            region.first = IVec2::new(x as i32, y as i32);
        }
        region.area += 1;
        region.intensity_sum += pixels[idx] as u64;
        region.bbox.include(x, y);
    }

    regions
}

/// Flags regions lying inside a hole of another region of the same mask.
///
/// Only outermost regions become particles. The pixel left of a region's first
/// raster pixel is background; the region is nested when that background
/// component, labeled with the dual connectivity, never reaches the frame.
fn nested_regions(opened: &Mask, regions: &[Region], connectivity: Connectivity) -> Vec<bool> {
    let width = opened.width();
    let height = opened.height();
    let background = Mask::from_vec(
        width,
        height,
        opened.as_slice().iter().map(|&v| !v).collect(),
    );
    let holes = LabelMap::from_mask(&background, connectivity.dual());

    let mut reaches_frame = vec![false; holes.num_labels() + 1];
    for x in 0..width {
        reaches_frame[holes.get(x, 0) as usize] = true;
        reaches_frame[holes.get(x, height - 1) as usize] = true;
    }
    for y in 0..height {
        reaches_frame[holes.get(0, y) as usize] = true;
        reaches_frame[holes.get(width - 1, y) as usize] = true;
    }

    regions
        .iter()
        .map(|region| {
            let (x, y) = (region.first.x as usize, region.first.y as usize);
            x > 0 && !reaches_frame[holes.get(x - 1, y) as usize]
        })
        .collect()
}

fn measure(band: Band, region: &Region, contour: &[IVec2]) -> ParticleFeatures {
    let area = region.area as f64;
    let perimeter = closed_arc_length(contour);
    let circularity = 4.0 * PI * area / (perimeter * perimeter + CIRCULARITY_EPSILON);

    let aspect_ratio = region.bbox.width() as f64 / region.bbox.height() as f64;

    let polygon_area = signed_area(contour).abs();
    let hull_area = signed_area(&convex_hull(contour)).abs();
    let solidity = if hull_area > 0.0 {
        (polygon_area / hull_area).min(1.0)
    } else {
        0.0
    };

    let (center_x, center_y) = match polygon_centroid(contour) {
        Some(c) => (c.x.max(0.0) as u32, c.y.max(0.0) as u32),
        None => {
            let (cx, cy) = region.bbox.center();
            (cx as u32, cy as u32)
        }
    };

    ParticleFeatures {
        band,
        area,
        perimeter,
        circularity,
        aspect_ratio,
        solidity,
        mean_intensity: region.intensity_sum as f64 / area,
        center_x,
        center_y,
    }
}
