//! Loading microscopy images from disk.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use thiserror::Error;


/// Errors that can occur when loading an image from disk.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode image '{path}': {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Image '{path}' has no pixels")]
    Empty { path: PathBuf },
}

/// A decoded image: the color original (kept for overlays) and its
/// 8-bit luminance.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub color: RgbImage,
    pub gray: GrayImage,
}

impl LoadedImage {
    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}

/// Reads and decodes an image, converting it to grayscale with the
/// ITU-R BT.601 luma weights (0.299, 0.587, 0.114).
pub fn load_image(path: &Path) -> Result<LoadedImage, ImageLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ImageLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| ImageLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let color = decoded.to_rgb8();
    if color.width() == 0 || color.height() == 0 {
        return Err(ImageLoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    let gray = to_gray(&color);

    tracing::debug!(
        path = %path.display(),
        width = gray.width(),
        height = gray.height(),
        "loaded image"
    );

    Ok(LoadedImage { color, gray })
}

/// BT.601 luma, rounded to nearest.
pub fn to_gray(color: &RgbImage) -> GrayImage {
    GrayImage::from_fn(color.width(), color.height(), |x, y| {
        let [r, g, b] = color.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        image::Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}
