//! Tests for particle detection.

#![allow(clippy::identity_op, clippy::erasing_op)]

use super::*;
use crate::config::{Connectivity, SegmentationConfig};
use crate::segmentation::segment;
use image::Luma;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn mask_from_rows(rows: &[&str]) -> Mask {
    let height = rows.len();
    let width = rows[0].len();
    Mask::from_fn(width, height, |x, y| rows[y].as_bytes()[x] == b'#')
}

fn flat_image(mask: &Mask, value: u8) -> GrayImage {
    GrayImage::from_pixel(mask.width() as u32, mask.height() as u32, Luma([value]))
}

fn no_opening() -> DetectionConfig {
    DetectionConfig {
        opening_size: 1,
        min_area: 1,
        ..Default::default()
    }
}

// ============================================================================
// Labeling
// ============================================================================

#[test]
fn empty_mask_has_no_labels() {
    let mask = Mask::new(4, 4);
    let labels = LabelMap::from_mask(&mask, Connectivity::Eight);
    assert_eq!(labels.num_labels(), 0);
    assert!(labels.labels().iter().all(|&l| l == 0));
}

#[test]
fn diagonal_pixels_depend_on_connectivity() {
    let mask = mask_from_rows(&["#..", ".#.", "..#"]);
    assert_eq!(LabelMap::from_mask(&mask, Connectivity::Four).num_labels(), 3);
    assert_eq!(LabelMap::from_mask(&mask, Connectivity::Eight).num_labels(), 1);
}

#[test]
fn u_shape_merges_into_one_label() {
    // Two arms that only meet on the last row.
    let mask = mask_from_rows(&["#...#", "#...#", "#####"]);
    let labels = LabelMap::from_mask(&mask, Connectivity::Four);
    assert_eq!(labels.num_labels(), 1);
    assert_eq!(labels[0 * 5 + 0], labels[0 * 5 + 4]);
}

#[test]
fn labels_follow_raster_order() {
    let mask = mask_from_rows(&["...#", "#...", "...."]);
    let labels = LabelMap::from_mask(&mask, Connectivity::Eight);
    assert_eq!(labels.num_labels(), 2);
    assert_eq!(labels.get(3, 0), 1);
    assert_eq!(labels.get(0, 1), 2);
}

// ============================================================================
// Opening
// ============================================================================

#[test]
fn opening_removes_isolated_pixels_and_thin_lines() {
    let mask = mask_from_rows(&[
        "#.......", "........", "..####..", "..####..", "........", "######..", "........",
    ]);
    let opened = open_mask(&mask, 2);
    assert!(!opened.get(0, 0));
    assert!(!opened.get(0, 5));
    assert_eq!(opened.count_ones(), 8);
    for y in 2..4 {
        for x in 2..6 {
            assert!(opened.get(x, y));
        }
    }
}

#[test]
fn opening_never_adds_pixels() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mask = Mask::from_fn(40, 30, |_, _| rng.random_bool(0.6));
    let opened = open_mask(&mask, 2);
    for y in 0..30 {
        for x in 0..40 {
            assert!(!opened.get(x, y) || mask.get(x, y));
        }
    }
}

#[test]
fn opening_keeps_border_regions() {
    let mask = mask_from_rows(&["##..", "##..", "...."]);
    assert_eq!(open_mask(&mask, 2), mask);
}

// ============================================================================
// Boundary tracing and geometry
// ============================================================================

#[test]
fn square_boundary() {
    let mask = mask_from_rows(&["....", ".##.", ".##.", "...."]);
    let labels = LabelMap::from_mask(&mask, Connectivity::Eight);
    let contour = trace_outer_boundary(&labels, 1, IVec2::new(1, 1), 4);
    assert_eq!(
        contour,
        vec![
            IVec2::new(1, 1),
            IVec2::new(2, 1),
            IVec2::new(2, 2),
            IVec2::new(1, 2)
        ]
    );
    assert_eq!(closed_arc_length(&contour), 4.0);
    assert_eq!(signed_area(&contour).abs(), 1.0);
}

#[test]
fn single_pixel_boundary() {
    let mask = mask_from_rows(&["...", ".#.", "..."]);
    let labels = LabelMap::from_mask(&mask, Connectivity::Eight);
    let contour = trace_outer_boundary(&labels, 1, IVec2::new(1, 1), 1);
    assert_eq!(contour, vec![IVec2::new(1, 1)]);
}

#[test]
fn line_boundary_walks_there_and_back() {
    let mask = mask_from_rows(&["#####"]);
    let labels = LabelMap::from_mask(&mask, Connectivity::Eight);
    let contour = trace_outer_boundary(&labels, 1, IVec2::new(0, 0), 5);
    assert_eq!(contour.len(), 8);
    let compressed = compress_collinear(&contour);
    assert_eq!(compressed, vec![IVec2::new(0, 0), IVec2::new(4, 0)]);
    assert_eq!(closed_arc_length(&compressed), 8.0);
}

#[test]
fn compression_keeps_rectangle_corners() {
    let mask = mask_from_rows(&["#####", "#####", "#####"]);
    let labels = LabelMap::from_mask(&mask, Connectivity::Eight);
    let contour = trace_outer_boundary(&labels, 1, IVec2::ZERO, 15);
    let corners = compress_collinear(&contour);
    assert_eq!(corners.len(), 4);
    assert_eq!(closed_arc_length(&corners), closed_arc_length(&contour));
    assert_eq!(signed_area(&corners).abs(), 8.0);
}

#[test]
fn convex_hull_of_l_shape() {
    let l_shape = vec![
        IVec2::new(0, 0),
        IVec2::new(1, 0),
        IVec2::new(1, 3),
        IVec2::new(3, 3),
        IVec2::new(3, 4),
        IVec2::new(0, 4),
    ];
    let hull = convex_hull(&l_shape);
    assert_eq!(hull.len(), 5);
    assert!(!hull.contains(&IVec2::new(1, 3)));
    let area = signed_area(&l_shape).abs();
    let hull_area = signed_area(&hull).abs();
    assert_eq!(area, 6.0);
    assert!(hull_area > area);
}

#[test]
fn convex_hull_ignores_repeated_and_edge_points() {
    let points = vec![
        IVec2::new(0, 0),
        IVec2::new(2, 0),
        IVec2::new(4, 0),
        IVec2::new(4, 4),
        IVec2::new(4, 4),
        IVec2::new(0, 4),
        IVec2::new(2, 2),
        IVec2::new(0, 0),
    ];
    let hull = convex_hull(&points);
    assert_eq!(signed_area(&hull).abs(), 16.0);
    assert!(!hull.contains(&IVec2::new(2, 2)));
    assert_eq!(convex_hull(&[IVec2::new(1, 1), IVec2::new(1, 1)]).len(), 1);
}

#[test]
fn centroid_of_rectangle_and_degenerate_polygon() {
    let rect = vec![
        IVec2::new(10, 20),
        IVec2::new(14, 20),
        IVec2::new(14, 26),
        IVec2::new(10, 26),
    ];
    let c = polygon_centroid(&rect).unwrap();
    assert!((c.x - 12.0).abs() < 1e-12);
    assert!((c.y - 23.0).abs() < 1e-12);
    assert!(polygon_centroid(&[IVec2::new(0, 0), IVec2::new(4, 0)]).is_none());
}

// ============================================================================
// Particle features
// ============================================================================

#[test]
fn rectangle_particle_features() {
    let mask = mask_from_rows(&[
        "..........",
        ".######...",
        ".######...",
        ".######...",
        "..........",
    ]);
    let image = flat_image(&mask, 120);
    let result = detect_particles(&mask, &image, Band::Mid, &DetectionConfig::default());

    assert_eq!(result.particles.len(), 1);
    let p = result.particles[0];
    assert_eq!(p.band, Band::Mid);
    assert_eq!(p.area, 18.0);
    assert_eq!(p.perimeter, 14.0);
    assert_eq!(p.aspect_ratio, 2.0);
    assert_eq!(p.solidity, 1.0);
    assert_eq!(p.mean_intensity, 120.0);
    assert_eq!((p.center_x, p.center_y), (3, 2));
    assert_eq!(result.footprint.count_ones(), 18);
}

#[test]
fn thin_region_falls_back_to_bbox_center() {
    let mask = mask_from_rows(&["........", ".#####..", "........"]);
    let image = flat_image(&mask, 200);
    let result = detect_particles(&mask, &image, Band::Bright, &no_opening());
    let p = result.particles[0];
    assert_eq!(p.solidity, 0.0);
    assert_eq!((p.center_x, p.center_y), (3, 1));
}

#[test]
fn small_regions_are_discarded() {
    let mask = mask_from_rows(&["##......", "##......", "....###.", "....###.", "....###."]);
    let image = flat_image(&mask, 50);
    let result = detect_particles(&mask, &image, Band::Dark, &DetectionConfig::default());
    assert_eq!(result.particles.len(), 1);
    assert_eq!(result.particles[0].area, 9.0);
    assert_eq!(result.contours.len(), 1);
    assert!(!result.footprint.get(0, 0));
    assert!(result.footprint.get(5, 3));
}

#[test]
fn full_mask_yields_no_particles() {
    let mask = Mask::from_fn(20, 20, |_, _| true);
    let image = flat_image(&mask, 128);
    let result = detect_particles(&mask, &image, Band::Mid, &DetectionConfig::default());
    assert!(result.particles.is_empty());
}

#[test]
fn mean_intensity_uses_region_pixels() {
    let mask = mask_from_rows(&["....", ".##.", ".##.", "...."]);
    let image = GrayImage::from_fn(4, 4, |x, _| Luma([if x == 1 { 100 } else { 200 }]));
    let result = detect_particles(&mask, &image, Band::Mid, &no_opening());
    assert_eq!(result.particles[0].mean_intensity, 150.0);
}

#[test]
fn regions_inside_a_hole_are_dropped() {
    let mask = mask_from_rows(&[
        "............",
        ".#######....",
        ".#.....#....",
        ".#.###.#.##.",
        ".#.###.#.##.",
        ".#.###.#....",
        ".#.....#....",
        ".#######....",
        "............",
    ]);
    let image = flat_image(&mask, 90);
    let result = detect_particles(&mask, &image, Band::Dark, &no_opening());

    let areas: Vec<f64> = result.particles.iter().map(|p| p.area).collect();
    assert_eq!(areas, vec![24.0, 4.0]);
    assert_eq!(result.contours.len(), 2);
    assert_eq!(result.footprint.count_ones(), 28);
    assert!(!result.footprint.get(4, 4));
    assert!(result.footprint.get(9, 3));
}

#[test]
fn four_connected_ring_keeps_diagonal_neighbor_outside() {
    // The blob touches the ring only diagonally through a gap, so with
    // 4-connectivity it is its own region whose left side is open background.
    let mask = mask_from_rows(&[
        "..........",
        ".####.....",
        ".#..#.....",
        ".####.....",
        ".....##...",
        ".....##...",
        "..........",
    ]);
    let image = flat_image(&mask, 90);
    let config = DetectionConfig {
        connectivity: Connectivity::Four,
        ..no_opening()
    };
    let result = detect_particles(&mask, &image, Band::Mid, &config);
    assert_eq!(result.particles.len(), 2);
}

#[test]
fn feature_invariants_on_random_masks() {
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let mask = Mask::from_fn(120, 90, |_, _| rng.random_bool(0.55));
    let image = GrayImage::from_fn(120, 90, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
    let config = DetectionConfig::default();
    let result = detect_particles(&mask, &image, Band::Mid, &config);

    assert!(!result.particles.is_empty());
    for p in &result.particles {
        assert!(p.area >= config.min_area as f64);
        assert!(p.circularity >= 0.0);
        assert!((0.0..=1.0 + 1e-9).contains(&p.solidity));
        assert!(p.aspect_ratio > 0.0);
        assert!((p.center_x as usize) < 120 && (p.center_y as usize) < 90);
    }
}

// ============================================================================
// End to end
// ============================================================================

fn disk_image() -> GrayImage {
    GrayImage::from_fn(200, 200, |x, y| {
        let dx = x as i32 - 100;
        let dy = y as i32 - 100;
        Luma([if dx * dx + dy * dy <= 400 { 128 } else { 30 }])
    })
}

#[test]
fn gray_disk_is_one_mid_particle() {
    crate::testing::init_tracing();

    let seg = segment(&disk_image(), &SegmentationConfig::default());
    let detection = detect_all(&seg, &DetectionConfig::default());

    let mid = &detection.band(Band::Mid).unwrap().particles;
    assert_eq!(mid.len(), 1, "{mid:?}");
    let p = mid[0];
    assert_eq!(p.band, Band::Mid);
    assert!(detection.band(Band::Bright).unwrap().particles.is_empty());

    let expected_area = PI * 400.0;
    assert!(
        (p.area - expected_area).abs() <= 0.05 * expected_area,
        "area {}",
        p.area
    );
    assert!(p.circularity > 0.9, "circularity {}", p.circularity);
    assert!((p.center_x as i32 - 100).abs() <= 1);
    assert!((p.center_y as i32 - 100).abs() <= 1);

    // The dark background around the disk is one region touching the frame.
    let dark = &detection.band(Band::Dark).unwrap().particles;
    assert_eq!(dark.len(), 1);
    assert!(dark[0].area > 30_000.0);
}

#[test]
fn uniform_image_has_no_particles() {
    for value in [0u8, 90, 128, 250] {
        let gray = GrayImage::from_pixel(120, 80, Luma([value]));
        let seg = segment(&gray, &SegmentationConfig::default());
        let detection = detect_all(&seg, &DetectionConfig::default());
        assert_eq!(detection.total(), 0, "value {value}");
    }
}
