//! Axis-aligned bounding box for pixel regions.

/// Axis-aligned bounding box with `usize` coordinates.
///
/// Uses inclusive bounds: a pixel at (x, y) is inside if
/// `x_min <= x <= x_max` and `y_min <= y <= y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aabb {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    #[inline]
    pub const fn new(x_min: usize, x_max: usize, y_min: usize, y_max: usize) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Inverted bounds, so the first `include()` sets them.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            x_min: usize::MAX,
            x_max: 0,
            y_min: usize::MAX,
            y_max: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x_min > self.x_max || self.y_min > self.y_max
    }

    #[inline]
    pub fn include(&mut self, x: usize, y: usize) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
    }

    /// Number of columns covered.
    #[inline]
    pub const fn width(&self) -> usize {
        self.x_max.saturating_sub(self.x_min) + 1
    }

    /// Number of rows covered.
    #[inline]
    pub const fn height(&self) -> usize {
        self.y_max.saturating_sub(self.y_min) + 1
    }

    #[inline]
    pub const fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    /// Integer center using floor division of the extent: `x_min + width / 2`.
    #[inline]
    pub const fn center(&self) -> (usize, usize) {
        (
            self.x_min + self.width() / 2,
            self.y_min + self.height() / 2,
        )
    }
}
