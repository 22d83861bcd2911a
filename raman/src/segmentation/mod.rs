//! Contrast equalization and three-band intensity segmentation.

mod clahe;
mod mask;

#[cfg(test)]
mod tests;

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::config::SegmentationConfig;

pub use clahe::equalize_clahe;
pub use mask::Mask;

/// Intensity band of an equalized pixel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum Band {
    /// At or above `thresh2`.
    #[serde(rename = "Type_1_Bright")]
    #[strum(serialize = "Type_1_Bright")]
    Bright,
    /// In `[thresh1, thresh2)`.
    #[serde(rename = "Type_2_Mid")]
    #[strum(serialize = "Type_2_Mid")]
    Mid,
    /// Below `thresh1`.
    #[serde(rename = "Type_3_Dark")]
    #[strum(serialize = "Type_3_Dark")]
    Dark,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Bright, Band::Mid, Band::Dark];

    #[inline]
    pub fn classify(value: u8, thresh1: u8, thresh2: u8) -> Band {
        if value < thresh1 {
            Band::Dark
        } else if value < thresh2 {
            Band::Mid
        } else {
            Band::Bright
        }
    }

    /// Gray level used in the segmentation visualization.
    pub fn display_level(self) -> u8 {
        match self {
            Band::Bright => 240,
            Band::Mid => 150,
            Band::Dark => 60,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Equalized image plus its three band masks.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub equalized: GrayImage,
    pub thresh1: u8,
    pub thresh2: u8,
    masks: [Mask; 3],
}

impl Segmentation {
    pub fn mask(&self, band: Band) -> &Mask {
        &self.masks[band.index()]
    }

    pub fn width(&self) -> usize {
        self.equalized.width() as usize
    }

    pub fn height(&self) -> usize {
        self.equalized.height() as usize
    }

    pub fn pixel_count(&self, band: Band) -> usize {
        self.mask(band).count_ones()
    }

    /// Band of the pixel at (x, y).
    pub fn band_at(&self, x: usize, y: usize) -> Band {
        Band::classify(
            self.equalized.get_pixel(x as u32, y as u32).0[0],
            self.thresh1,
            self.thresh2,
        )
    }

    /// Bright → 240, mid → 150, dark → 60.
    pub fn visualization(&self) -> GrayImage {
        GrayImage::from_fn(self.equalized.width(), self.equalized.height(), |x, y| {
            Luma([self.band_at(x as usize, y as usize).display_level()])
        })
    }
}

/// Equalizes `gray` with CLAHE and splits the result into three disjoint bands.
pub fn segment(gray: &GrayImage, config: &SegmentationConfig) -> Segmentation {
    config.validate();

    let equalized = equalize_clahe(gray, config.clip_limit, config.tile_grid);
    let width = equalized.width() as usize;
    let height = equalized.height() as usize;

    let mut masks = [
        Mask::new(width, height),
        Mask::new(width, height),
        Mask::new(width, height),
    ];
    for (x, y, px) in equalized.enumerate_pixels() {
        let band = Band::classify(px.0[0], config.thresh1, config.thresh2);
        masks[band.index()].set(x as usize, y as usize, true);
    }

    let segmentation = Segmentation {
        equalized,
        thresh1: config.thresh1,
        thresh2: config.thresh2,
        masks,
    };

    tracing::debug!(
        bright = segmentation.pixel_count(Band::Bright),
        mid = segmentation.pixel_count(Band::Mid),
        dark = segmentation.pixel_count(Band::Dark),
        "segmented bands"
    );

    segmentation
}
