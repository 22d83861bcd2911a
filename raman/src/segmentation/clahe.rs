//! Contrast-limited adaptive histogram equalization.
//!
//! The image is split into a `grid × grid` set of tiles. Each tile gets a
//! clipped, equalized lookup table; every output pixel is the bilinear blend
//! of the four nearest tile LUTs, evaluated at the pixel's input value.

use image::GrayImage;
use rayon::prelude::*;

const BINS: usize = 256;

/// Applies CLAHE with the given clip limit and tile grid.
///
/// A clip limit of 0 disables clipping (plain tiled equalization).
pub fn equalize_clahe(gray: &GrayImage, clip_limit: f32, grid: usize) -> GrayImage {
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tiles_x = grid.clamp(1, width);
    let tiles_y = grid.clamp(1, height);
    let x_bounds = tile_bounds(width, tiles_x);
    let y_bounds = tile_bounds(height, tiles_y);

    let src = gray.as_raw();
    let luts: Vec<[u8; BINS]> = (0..tiles_x * tiles_y)
        .into_par_iter()
        .map(|tile| {
            let tx = tile % tiles_x;
            let ty = tile / tiles_x;
            tile_lut(
                src,
                width,
                (x_bounds[tx], x_bounds[tx + 1]),
                (y_bounds[ty], y_bounds[ty + 1]),
                clip_limit,
            )
        })
        .collect();

    let columns = interpolation_weights(&x_bounds, width);
    let rows = interpolation_weights(&y_bounds, height);

    let mut out = vec![0u8; width * height];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let (ty0, ty1, wy) = rows[y];
            for (x, out_px) in out_row.iter_mut().enumerate() {
                let (tx0, tx1, wx) = columns[x];
                let v = src[y * width + x] as usize;
                let top = lerp(
                    luts[ty0 * tiles_x + tx0][v],
                    luts[ty0 * tiles_x + tx1][v],
                    wx,
                );
                let bottom = lerp(
                    luts[ty1 * tiles_x + tx0][v],
                    luts[ty1 * tiles_x + tx1][v],
                    wx,
                );
                let blended = top + (bottom - top) * wy;
                *out_px = blended.round().clamp(0.0, 255.0) as u8;
            }
        });

    GrayImage::from_raw(width as u32, height as u32, out)
        .unwrap_or_else(|| unreachable!("buffer sized from image dimensions"))
}

/// Tile edges `[0, len/n, 2·len/n, …, len]`.
fn tile_bounds(len: usize, tiles: usize) -> Vec<usize> {
    (0..=tiles).map(|i| i * len / tiles).collect()
}

/// For every coordinate: the two neighboring tile indices and the weight of
/// the second one. Outside the outermost tile centers the nearest tile is used.
fn interpolation_weights(bounds: &[usize], len: usize) -> Vec<(usize, usize, f32)> {
    let tiles = bounds.len() - 1;
    let centers: Vec<f32> = (0..tiles)
        .map(|i| (bounds[i] + bounds[i + 1]) as f32 / 2.0 - 0.5)
        .collect();
    let last = tiles - 1;

    (0..len)
        .map(|p| {
            let p = p as f32;
            if p <= centers[0] {
                return (0, 0, 0.0);
            }
            if p >= centers[last] {
                return (last, last, 0.0);
            }
            let i = centers.partition_point(|&c| c <= p) - 1;
            let span = centers[i + 1] - centers[i];
            (i, i + 1, (p - centers[i]) / span)
        })
        .collect()
}

fn tile_lut(
    src: &[u8],
    stride: usize,
    (x0, x1): (usize, usize),
    (y0, y1): (usize, usize),
    clip_limit: f32,
) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for &v in &src[y * stride + x0..y * stride + x1] {
            hist[v as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)) as u32;

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let batch = excess / BINS as u32;
        let residual = (excess % BINS as u32) as usize;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (BINS / residual).max(1);
            for bin in hist.iter_mut().step_by(step).take(residual) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; BINS];
    let mut cdf = 0u32;
    for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
        cdf += count;
        *entry = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[inline]
fn lerp(a: u8, b: u8, t: f32) -> f32 {
    a as f32 + (b as f32 - a as f32) * t
}
