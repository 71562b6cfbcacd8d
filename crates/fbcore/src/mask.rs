use bitvec::prelude::{BitVec, Lsb0};

use crate::FbError;

pub const TILE_EDGE: u32 = 8;
pub const TILE_PIXELS: usize = (TILE_EDGE * TILE_EDGE) as usize;

/// Maps image pixels onto 8x8 tiles. Tiles are ordered row-major starting at
/// the bottom-left; pixels inside a tile are ordered row-major too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    width: u32,
    height: u32,
    tiles_x: u32,
    tiles_y: u32,
}

impl TileLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles_x: width.div_ceil(TILE_EDGE),
            tiles_y: height.div_ceil(TILE_EDGE),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    /// Number of tiled pixel slots, including padding of partial edge tiles.
    pub fn pixel_capacity(&self) -> usize {
        self.tile_count() * TILE_PIXELS
    }

    pub fn tiled_index(&self, x: u32, y: u32) -> usize {
        let tile = (y / TILE_EDGE) as usize * self.tiles_x as usize + (x / TILE_EDGE) as usize;
        tile * TILE_PIXELS + ((y % TILE_EDGE) * TILE_EDGE + x % TILE_EDGE) as usize
    }

    /// Image coordinates of a tiled slot. Padding slots map outside the image.
    pub fn pixel_coords(&self, index: usize) -> (u32, u32) {
        let tile = index / TILE_PIXELS;
        let offset = (index % TILE_PIXELS) as u32;
        let tile_x = (tile % self.tiles_x as usize) as u32;
        let tile_y = (tile / self.tiles_x as usize) as u32;
        (
            tile_x * TILE_EDGE + offset % TILE_EDGE,
            tile_y * TILE_EDGE + offset / TILE_EDGE,
        )
    }

    pub fn in_image(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    fn ensure_same(&self, other: &TileLayout) -> Result<(), FbError> {
        if self == other {
            Ok(())
        } else {
            Err(FbError::LayoutMismatch {
                expected: (self.width, self.height),
                actual: (other.width, other.height),
            })
        }
    }
}

/// Set of tile pixels that carry data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePixelMask {
    layout: TileLayout,
    bits: BitVec<usize, Lsb0>,
}

impl ActivePixelMask {
    pub fn new(layout: TileLayout) -> Self {
        Self {
            layout,
            bits: BitVec::repeat(false, layout.pixel_capacity()),
        }
    }

    /// Mask with every in-image pixel active.
    pub fn full(layout: TileLayout) -> Self {
        let mut mask = Self::new(layout);
        for y in 0..layout.height() {
            for x in 0..layout.width() {
                mask.set(x, y);
            }
        }
        mask
    }

    pub fn layout(&self) -> TileLayout {
        self.layout
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    pub fn active_count(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn set(&mut self, x: u32, y: u32) {
        if self.layout.in_image(x, y) {
            let index = self.layout.tiled_index(x, y);
            self.bits.set(index, true);
        }
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.layout.in_image(x, y) && self.bits[self.layout.tiled_index(x, y)]
    }

    pub fn is_index_set(&self, index: usize) -> bool {
        self.bits.get(index).map(|bit| *bit).unwrap_or(false)
    }

    /// Tiled indices of active pixels in ascending order.
    pub fn iter_active(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    /// ORs `other` into `self`. Commutative, associative and idempotent.
    pub fn merge(&mut self, other: &ActivePixelMask) -> Result<(), FbError> {
        self.layout.ensure_same(&other.layout)?;
        for index in other.bits.iter_ones() {
            self.bits.set(index, true);
        }
        Ok(())
    }

    pub fn merged(&self, other: &ActivePixelMask) -> Result<ActivePixelMask, FbError> {
        let mut out = self.clone();
        out.merge(other)?;
        Ok(out)
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }
}
