//! Raster renderings of the detailed report: colour-mapped heatmaps,
//! contour overlays, the PCA scatter and the balanced-zone frame.

use image::imageops::FilterType;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use rayon::prelude::*;

use super::tables::CrossTable;
use crate::detection::Detection;
use crate::segmentation::{Band, Segmentation};
use crate::zone::ZoneWindow;

// ============================================================================
// Colour maps
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Gray,
    Hot,
    Jet,
    Viridis,
    Plasma,
    YlOrRd,
    Blues,
    /// Blue (low) to red (high).
    RdYlBuReversed,
}

impl Colormap {
    /// Evenly spaced colour stops from 0 to 1.
    fn stops(self) -> &'static [[u8; 3]] {
        match self {
            Colormap::Gray => &[[0, 0, 0], [255, 255, 255]],
            Colormap::Hot => &[[11, 0, 0], [255, 0, 0], [255, 255, 0], [255, 255, 255]],
            Colormap::Jet => &[
                [0, 0, 127],
                [0, 0, 255],
                [0, 127, 255],
                [0, 255, 255],
                [127, 255, 127],
                [255, 255, 0],
                [255, 127, 0],
                [255, 0, 0],
                [127, 0, 0],
            ],
            Colormap::Viridis => &[
                [68, 1, 84],
                [72, 40, 120],
                [62, 74, 137],
                [49, 104, 142],
                [38, 130, 142],
                [31, 158, 137],
                [53, 183, 121],
                [109, 205, 89],
                [180, 222, 44],
                [253, 231, 37],
            ],
            Colormap::Plasma => &[
                [13, 8, 135],
                [84, 2, 163],
                [139, 10, 165],
                [185, 50, 137],
                [219, 92, 104],
                [244, 136, 73],
                [254, 188, 43],
                [240, 249, 33],
            ],
            Colormap::YlOrRd => &[
                [255, 255, 204],
                [255, 237, 160],
                [254, 217, 118],
                [254, 178, 76],
                [253, 141, 60],
                [252, 78, 42],
                [227, 26, 28],
                [189, 0, 38],
                [128, 0, 38],
            ],
            Colormap::Blues => &[
                [247, 251, 255],
                [222, 235, 247],
                [198, 219, 239],
                [158, 202, 225],
                [107, 174, 214],
                [66, 146, 198],
                [33, 113, 181],
                [8, 81, 156],
                [8, 48, 107],
            ],
            Colormap::RdYlBuReversed => &[
                [49, 54, 149],
                [69, 117, 180],
                [116, 173, 209],
                [171, 217, 233],
                [224, 243, 248],
                [255, 255, 191],
                [254, 224, 144],
                [253, 174, 97],
                [244, 109, 67],
                [215, 48, 39],
                [165, 0, 38],
            ],
        }
    }

    /// Colour at `t` in [0, 1]; values outside are clamped, NaN maps to 0.
    pub fn color(self, t: f32) -> Rgb<u8> {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let pos = t * (stops.len() - 1) as f32;
        let i = (pos.floor() as usize).min(stops.len() - 2);
        let frac = pos - i as f32;
        let (a, b) = (stops[i], stops[i + 1]);
        Rgb(std::array::from_fn(|c| {
            (a[c] as f32 + (b[c] as f32 - a[c] as f32) * frac).round() as u8
        }))
    }
}

/// Categorical colours for cluster ids.
const CLUSTER_PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

pub fn cluster_color(cluster: usize) -> Rgb<u8> {
    Rgb(CLUSTER_PALETTE[cluster % CLUSTER_PALETTE.len()])
}

pub fn band_color(band: Band) -> Rgb<u8> {
    match band {
        Band::Bright => Rgb([255, 0, 0]),
        Band::Mid => Rgb([0, 255, 0]),
        Band::Dark => Rgb([0, 0, 255]),
    }
}

/// Maps values to colours over `range`, or over the data range when `None`.
/// A flat field renders with the lowest colour.
pub fn colorize(
    values: &[f32],
    width: usize,
    height: usize,
    colormap: Colormap,
    range: Option<(f32, f32)>,
) -> RgbImage {
    assert_eq!(values.len(), width * height, "one value per pixel");
    let (lo, hi) = range.unwrap_or_else(|| {
        values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    });
    let span = hi - lo;
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let v = values[y as usize * width + x as usize];
        let t = if span > 0.0 { (v - lo) / span } else { 0.0 };
        colormap.color(t)
    })
}

pub fn gray_values(image: &GrayImage) -> Vec<f32> {
    image.as_raw().iter().map(|&v| v as f32).collect()
}

// ============================================================================
// Filters and maps
// ============================================================================

/// Mirror index with the edge sample repeated (`dcba|abcd|dcba`).
#[inline]
fn reflect(i: isize, len: usize) -> usize {
    let n = len as isize;
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

/// Normalized Gaussian kernel truncated at 4σ.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (4.0 * sigma + 0.5) as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Separable Gaussian blur with mirrored borders.
pub fn gaussian_blur(values: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    assert_eq!(values.len(), width * height, "one value per pixel");
    if sigma <= 0.0 || values.is_empty() {
        return values.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0f32; values.len()];
    horizontal
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let src = &values[y * width..(y + 1) * width];
            for (x, out) in row.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * src[reflect(x as isize + k as isize - radius, width)])
                    .sum();
            }
        });

    let mut out = vec![0.0f32; values.len()];
    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            *out = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    w * horizontal[reflect(y as isize + k as isize - radius, height) * width + x]
                })
                .sum();
        }
    });
    out
}

/// Count of particle pixels per location, smoothed with `sigma`.
pub fn density_map(detection: &Detection, width: usize, height: usize, sigma: f32) -> Vec<f32> {
    let mut density = vec![0.0f32; width * height];
    for band in &detection.bands {
        for (d, &set) in density.iter_mut().zip(band.footprint.as_slice()) {
            if set {
                *d += 1.0;
            }
        }
    }
    gaussian_blur(&density, width, height, sigma)
}

/// Sums a Gaussian splat of each `(x, y, value)` within `radius`, then
/// smooths the result.
pub fn splat_map(
    points: &[(u32, u32, f64)],
    width: usize,
    height: usize,
    radius: usize,
    sigma: f32,
    smoothing_sigma: f32,
) -> Vec<f32> {
    let mut map = vec![0.0f32; width * height];
    let r = radius as i64;
    let two_sigma_sq = 2.0 * sigma * sigma;
    for &(px, py, value) in points {
        let (px, py) = (px as i64, py as i64);
        let y_range = (py - r).max(0)..(py + r).min(height as i64);
        for yy in y_range {
            for xx in (px - r).max(0)..(px + r).min(width as i64) {
                let d2 = ((xx - px).pow(2) + (yy - py).pow(2)) as f32;
                if d2 < (r * r) as f32 {
                    map[yy as usize * width + xx as usize] +=
                        value as f32 * (-d2 / two_sigma_sq).exp();
                }
            }
        }
    }
    gaussian_blur(&map, width, height, smoothing_sigma)
}

/// Band code per pixel: dark 1, mid 2, bright 3.
pub fn band_codes(segmentation: &Segmentation) -> Vec<f32> {
    let mut codes = vec![0.0f32; segmentation.width() * segmentation.height()];
    for (band, code) in [(Band::Dark, 1.0), (Band::Mid, 2.0), (Band::Bright, 3.0)] {
        for (c, &set) in codes.iter_mut().zip(segmentation.mask(band).as_slice()) {
            if set {
                *c = code;
            }
        }
    }
    codes
}

// ============================================================================
// Composites and overlays
// ============================================================================

const PANEL_GAP: u32 = 10;

/// Panels side by side on white, top-aligned.
pub fn side_by_side(panels: &[RgbImage]) -> RgbImage {
    let width = panels.iter().map(|p| p.width()).sum::<u32>()
        + PANEL_GAP * panels.len().saturating_sub(1) as u32;
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut x0 = 0;
    for panel in panels {
        image::imageops::replace(&mut canvas, panel, x0 as i64, 0);
        x0 += panel.width() + PANEL_GAP;
    }
    canvas
}

/// Stacks rows of panels top to bottom, left aligned.
fn stacked(rows: &[RgbImage]) -> RgbImage {
    let width = rows.iter().map(|r| r.width()).max().unwrap_or(0);
    let height = rows.iter().map(|r| r.height()).sum::<u32>()
        + PANEL_GAP * rows.len().saturating_sub(1) as u32;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut y0 = 0;
    for row in rows {
        image::imageops::replace(&mut canvas, row, 0, y0 as i64);
        y0 += row.height() + PANEL_GAP;
    }
    canvas
}

/// Side of one table cell in [`pivot_heatmaps`].
const PIVOT_CELL: u32 = 40;

/// Renders each table as a block heatmap, two panels per row.
///
/// Every cell becomes a `PIVOT_CELL` square coloured over the table's own
/// value range. An empty table renders as one white cell.
pub fn pivot_heatmaps(panels: &[(&CrossTable, Colormap)]) -> RgbImage {
    let blocks: Vec<RgbImage> = panels
        .iter()
        .map(|&(table, colormap)| {
            let rows = table.cells.len();
            let cols = table.columns.len();
            if rows == 0 || cols == 0 {
                return RgbImage::from_pixel(PIVOT_CELL, PIVOT_CELL, Rgb([255, 255, 255]));
            }
            let values: Vec<f32> = table.cells.iter().flatten().map(|&v| v as f32).collect();
            let small = colorize(&values, cols, rows, colormap, None);
            image::imageops::resize(
                &small,
                cols as u32 * PIVOT_CELL,
                rows as u32 * PIVOT_CELL,
                FilterType::Nearest,
            )
        })
        .collect();
    let rows: Vec<RgbImage> = blocks.chunks(2).map(side_by_side).collect();
    stacked(&rows)
}

pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// Draws every particle boundary in its band colour.
pub fn contour_overlay(base: &RgbImage, detection: &Detection) -> RgbImage {
    let mut canvas = base.clone();
    for band in &detection.bands {
        let color = band_color(band.band);
        for contour in &band.contours {
            match contour.len() {
                0 => {}
                1 => {
                    let p = contour[0];
                    if p.x >= 0 && p.y >= 0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height() {
                        canvas.put_pixel(p.x as u32, p.y as u32, color);
                    }
                }
                n => {
                    for i in 0..n {
                        let (a, b) = (contour[i], contour[(i + 1) % n]);
                        draw_line_segment_mut(
                            &mut canvas,
                            (a.x as f32, a.y as f32),
                            (b.x as f32, b.y as f32),
                            color,
                        );
                    }
                }
            }
        }
    }
    canvas
}

const SCATTER_SIZE: u32 = 640;
const SCATTER_MARGIN: f64 = 40.0;

/// PC1 × PC2 scatter coloured by cluster, with the zero axes drawn in gray.
pub fn pca_scatter(coordinates: &[[f64; 3]], clusters: &[usize]) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(SCATTER_SIZE, SCATTER_SIZE, Rgb([255, 255, 255]));
    let bounds = |axis: usize| {
        coordinates.iter().fold((0.0f64, 0.0f64), |(lo, hi), c| {
            (lo.min(c[axis]), hi.max(c[axis]))
        })
    };
    let ((x_lo, x_hi), (y_lo, y_hi)) = (bounds(0), bounds(1));
    let extent = SCATTER_SIZE as f64 - 2.0 * SCATTER_MARGIN;
    let to_px = |v: f64, lo: f64, hi: f64| {
        if hi > lo {
            SCATTER_MARGIN + (v - lo) / (hi - lo) * extent
        } else {
            SCATTER_SIZE as f64 / 2.0
        }
    };

    let axis_color = Rgb([160, 160, 160]);
    let x0 = to_px(0.0, x_lo, x_hi) as f32;
    let y0 = (SCATTER_SIZE as f64 - to_px(0.0, y_lo, y_hi)) as f32;
    let (start, end) = (SCATTER_MARGIN as f32, (SCATTER_SIZE as f64 - SCATTER_MARGIN) as f32);
    draw_line_segment_mut(&mut canvas, (start, y0), (end, y0), axis_color);
    draw_line_segment_mut(&mut canvas, (x0, start), (x0, end), axis_color);

    for (c, &cluster) in coordinates.iter().zip(clusters) {
        let x = to_px(c[0], x_lo, x_hi).round() as i32;
        let y = (SCATTER_SIZE as f64 - to_px(c[1], y_lo, y_hi)).round() as i32;
        draw_filled_circle_mut(&mut canvas, (x, y), 3, cluster_color(cluster));
    }
    canvas
}

const ZONE_BORDER: u32 = 3;
/// Arm length and thickness of the centre cross.
const ZONE_MARKER: (u32, u32) = (25, 4);

/// Outlines the window and marks its centre with a cross.
pub fn zone_overlay(base: &RgbImage, window: &ZoneWindow) -> RgbImage {
    let mut canvas = base.clone();
    let color = Rgb([0, 255, 0]);
    for i in 0..ZONE_BORDER {
        let side = window.size.saturating_sub(2 * i);
        if side == 0 {
            break;
        }
        let rect = Rect::at((window.x + i) as i32, (window.y + i) as i32).of_size(side, side);
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
    let (cx, cy) = window.center();
    let (cx, cy) = (cx as i32, cy as i32);
    let (length, thickness) = ZONE_MARKER;
    let (reach, half) = ((length / 2) as i32, (thickness / 2) as i32);
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(cx - reach, cy - half).of_size(length, thickness),
        color,
    );
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(cx - half, cy - reach).of_size(thickness, length),
        color,
    );
    canvas
}
