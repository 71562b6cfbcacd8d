use serde::{Deserialize, Serialize};

/// Closed integer rectangle; both `min` and `max` bounds are inside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Viewport {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Viewport anchored at the origin covering `width` x `height` pixels.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32 - 1, height as i32 - 1)
    }

    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersect(&self, other: &Viewport) -> Option<Viewport> {
        let clipped = Viewport::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Expresses `self` relative to `origin`'s lower-left corner.
    pub fn relative_to(&self, origin: &Viewport) -> Viewport {
        Viewport::new(
            self.min_x - origin.min_x,
            self.min_y - origin.min_y,
            self.max_x - origin.min_x,
            self.max_y - origin.min_y,
        )
    }
}
