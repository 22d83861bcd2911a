use super::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn noise_image(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.random::<u8>()]))
}

#[test]
fn band_thresholds_are_half_open() {
    assert_eq!(Band::classify(84, 85, 170), Band::Dark);
    assert_eq!(Band::classify(85, 85, 170), Band::Mid);
    assert_eq!(Band::classify(169, 85, 170), Band::Mid);
    assert_eq!(Band::classify(170, 85, 170), Band::Bright);
    assert_eq!(Band::classify(0, 0, 0), Band::Bright);
}

#[test]
fn band_names() {
    assert_eq!(Band::Bright.to_string(), "Type_1_Bright");
    assert_eq!(Band::Mid.to_string(), "Type_2_Mid");
    assert_eq!(Band::Dark.to_string(), "Type_3_Dark");
}

#[test]
fn masks_partition_every_pixel() {
    let gray = noise_image(97, 61, 7);
    let seg = segment(&gray, &SegmentationConfig::default());

    for y in 0..seg.height() {
        for x in 0..seg.width() {
            let hits = Band::ALL
                .iter()
                .filter(|&&band| seg.mask(band).get(x, y))
                .count();
            assert_eq!(hits, 1, "pixel ({x}, {y}) in {hits} bands");
        }
    }
    let total: usize = Band::ALL.iter().map(|&b| seg.pixel_count(b)).sum();
    assert_eq!(total, 97 * 61);
}

#[test]
fn masks_agree_with_equalized_values() {
    let gray = noise_image(40, 40, 11);
    let config = SegmentationConfig {
        thresh1: 60,
        thresh2: 200,
        ..Default::default()
    };
    let seg = segment(&gray, &config);
    for (x, y, px) in seg.equalized.enumerate_pixels() {
        let band = Band::classify(px.0[0], 60, 200);
        assert!(seg.mask(band).get(x as usize, y as usize));
    }
}

#[test]
fn clahe_preserves_uniform_image() {
    let gray = GrayImage::from_pixel(200, 200, Luma([128]));
    let eq = equalize_clahe(&gray, 2.5, 8);
    let first = eq.get_pixel(0, 0).0[0];
    assert!(eq.pixels().all(|p| p.0[0] == first));
    // The clipped histogram redistributes mass below 128, keeping mid gray.
    assert!((85..170).contains(&first), "uniform gray mapped to {first}");
}

#[test]
fn clahe_keeps_dimensions_and_order_within_tile() {
    let gray = GrayImage::from_fn(64, 48, |x, _| Luma([(x * 4) as u8]));
    let eq = equalize_clahe(&gray, 2.5, 1);
    assert_eq!(eq.dimensions(), (64, 48));
    // A single tile is one monotone LUT.
    for x in 1..64 {
        assert!(eq.get_pixel(x, 10).0[0] >= eq.get_pixel(x - 1, 10).0[0]);
    }
}

#[test]
fn clahe_handles_tiny_images() {
    let gray = GrayImage::from_fn(3, 2, |x, y| Luma([(x + y * 3) as u8 * 40]));
    let eq = equalize_clahe(&gray, 2.5, 8);
    assert_eq!(eq.dimensions(), (3, 2));
}

#[test]
fn disk_on_dark_background_stays_mid() {
    let gray = GrayImage::from_fn(200, 200, |x, y| {
        let dx = x as i32 - 100;
        let dy = y as i32 - 100;
        Luma([if dx * dx + dy * dy <= 400 { 128 } else { 30 }])
    });
    let seg = segment(&gray, &SegmentationConfig::default());
    assert_eq!(seg.band_at(100, 100), Band::Mid);
    assert_eq!(seg.band_at(5, 5), Band::Dark);
    assert_eq!(seg.pixel_count(Band::Bright), 0);
}

#[test]
fn visualization_levels() {
    // One unclipped tile: equal thirds at 0/128/255 map to 85/170/255.
    let gray = GrayImage::from_fn(30, 10, |x, _| {
        Luma([if x < 10 {
            0
        } else if x < 20 {
            128
        } else {
            255
        }])
    });
    let config = SegmentationConfig {
        thresh1: 100,
        thresh2: 200,
        clip_limit: 0.0,
        tile_grid: 1,
        ..Default::default()
    };
    let seg = segment(&gray, &config);
    let vis = seg.visualization();
    assert_eq!(vis.get_pixel(0, 0).0[0], 60);
    assert_eq!(vis.get_pixel(15, 0).0[0], 150);
    assert_eq!(vis.get_pixel(29, 0).0[0], 240);
}
