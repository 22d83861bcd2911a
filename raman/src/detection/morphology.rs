//! Binary morphological opening with a square structuring element.

use crate::segmentation::Mask;

/// Opening: erosion by a `size × size` square anchored at its top-left
/// followed by dilation with the reflected square.
///
/// The result is the union of every square that fits inside the mask, so it
/// never adds pixels and does not shift regions. Pixels outside the frame
/// count as foreground during erosion, so regions touching the border are
/// not eaten away from that side.
pub fn open_mask(mask: &Mask, size: usize) -> Mask {
    if size <= 1 {
        return mask.clone();
    }
    let eroded = erode(mask, size);
    dilate(&eroded, size)
}

fn erode(mask: &Mask, size: usize) -> Mask {
    let (width, height) = (mask.width(), mask.height());
    let horizontal = Mask::from_fn(width, height, |x, y| {
        (0..size).all(|d| x + d >= width || mask.get(x + d, y))
    });
    Mask::from_fn(width, height, |x, y| {
        (0..size).all(|d| y + d >= height || horizontal.get(x, y + d))
    })
}

fn dilate(mask: &Mask, size: usize) -> Mask {
    let (width, height) = (mask.width(), mask.height());
    let horizontal = Mask::from_fn(width, height, |x, y| {
        (0..size).any(|d| d <= x && mask.get(x - d, y))
    });
    Mask::from_fn(width, height, |x, y| {
        (0..size).any(|d| d <= y && horizontal.get(x, y - d))
    })
}
