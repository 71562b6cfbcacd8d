use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::mask::{ActivePixelMask, TileLayout, TILE_PIXELS};
use crate::{FbError, Viewport};

/// Numeric encoding the upstream codec used for a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F32,
    H16,
    Uc8,
    Runtime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassPrecision {
    pub coarse: Precision,
    pub fine: Precision,
}

/// Output of the external tile codec for one named buffer.
#[derive(Debug, Clone)]
pub struct DecodedTiles {
    pub mask: ActivePixelMask,
    pub num_chan: usize,
    /// `num_chan` values per active pixel, in ascending tiled-index order.
    pub values: Vec<f32>,
    /// One count per active pixel for the `WithSamples` buffer variants.
    pub sample_counts: Option<Vec<f32>>,
    pub precision: PassPrecision,
}

/// Row order of an untiled readout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// First output row is the bottom image row.
    #[default]
    BottomUp,
    /// First output row is the top image row.
    TopDown,
}

/// One tiled channel: values, coverage and codec precision.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    layout: TileLayout,
    num_chan: usize,
    data: Vec<f32>,
    sample_counts: Option<Vec<f32>>,
    mask: ActivePixelMask,
    precision: PassPrecision,
}

impl ChannelBuffer {
    pub fn new(layout: TileLayout, num_chan: usize) -> Self {
        Self {
            layout,
            num_chan,
            data: vec![0.0; layout.pixel_capacity() * num_chan],
            sample_counts: None,
            mask: ActivePixelMask::new(layout),
            precision: PassPrecision::default(),
        }
    }

    pub fn layout(&self) -> TileLayout {
        self.layout
    }

    pub fn num_chan(&self) -> usize {
        self.num_chan
    }

    pub fn mask(&self) -> &ActivePixelMask {
        &self.mask
    }

    pub fn precision(&self) -> PassPrecision {
        self.precision
    }

    /// Values of one pixel; `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[f32]> {
        self.layout.in_image(x, y).then(|| self.pixel_at(x, y))
    }

    fn pixel_at(&self, x: u32, y: u32) -> &[f32] {
        let start = self.layout.tiled_index(x, y) * self.num_chan;
        &self.data[start..start + self.num_chan]
    }

    pub fn sample_count(&self, x: u32, y: u32) -> Option<f32> {
        if !self.layout.in_image(x, y) {
            return None;
        }
        let counts = self.sample_counts.as_ref()?;
        Some(counts[self.layout.tiled_index(x, y)])
    }

    pub fn has_sample_counts(&self) -> bool {
        self.sample_counts.is_some()
    }

    /// Writes decoded samples for the pixels in `update.mask` and ORs the mask
    /// into the stored coverage. Pixels outside `update.mask` are untouched.
    pub fn merge_decoded(&mut self, update: &DecodedTiles) -> Result<(), FbError> {
        if update.mask.layout() != self.layout {
            return Err(FbError::LayoutMismatch {
                expected: (self.layout.width(), self.layout.height()),
                actual: (update.mask.layout().width(), update.mask.layout().height()),
            });
        }
        if update.num_chan != self.num_chan {
            return Err(FbError::mismatch(
                "channel count",
                self.num_chan,
                update.num_chan,
            ));
        }
        let active = update.mask.active_count();
        if update.values.len() != active * self.num_chan {
            return Err(FbError::mismatch(
                "decoded value count",
                active * self.num_chan,
                update.values.len(),
            ));
        }
        if let Some(counts) = &update.sample_counts {
            if counts.len() != active {
                return Err(FbError::mismatch(
                    "sample count length",
                    active,
                    counts.len(),
                ));
            }
        }

        let nc = self.num_chan;
        for (slot, index) in update.mask.iter_active().enumerate() {
            self.data[index * nc..(index + 1) * nc]
                .copy_from_slice(&update.values[slot * nc..(slot + 1) * nc]);
        }
        if let Some(counts) = &update.sample_counts {
            let capacity = self.layout.pixel_capacity();
            let stored = self.sample_counts.get_or_insert_with(|| vec![0.0; capacity]);
            for (slot, index) in update.mask.iter_active().enumerate() {
                stored[index] = counts[slot];
            }
        }
        self.mask.merge(&update.mask)?;
        self.precision = update.precision;
        Ok(())
    }

    /// Sample-weighted accumulation of `other` into `self`, pixel by pixel.
    /// Missing sample counts weigh covered pixels as one sample.
    pub fn merge_weighted(&mut self, other: &ChannelBuffer) -> Result<(), FbError> {
        if other.layout != self.layout {
            return Err(FbError::LayoutMismatch {
                expected: (self.layout.width(), self.layout.height()),
                actual: (other.layout.width(), other.layout.height()),
            });
        }
        if other.num_chan != self.num_chan {
            return Err(FbError::mismatch(
                "channel count",
                self.num_chan,
                other.num_chan,
            ));
        }

        let mut self_counts = self.effective_counts();
        let other_counts = other.effective_counts();
        crate::merge::merge_weighted(
            &mut self.data,
            &mut self_counts,
            &other.data,
            &other_counts,
            self.num_chan,
        )?;
        self.sample_counts = Some(self_counts);
        self.mask.merge(&other.mask)
    }

    fn effective_counts(&self) -> Vec<f32> {
        match &self.sample_counts {
            Some(counts) => counts.clone(),
            None => (0..self.layout.pixel_capacity())
                .map(|index| if self.mask.is_index_set(index) { 1.0 } else { 0.0 })
                .collect(),
        }
    }

    /// Zeroes every value and clears coverage. Precision is kept.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
        self.sample_counts = None;
        self.mask.clear();
    }

    /// Clears coverage and sample counts but keeps the last values on screen.
    pub fn reset_coverage(&mut self) {
        self.sample_counts = None;
        self.mask.clear();
    }

    /// Fills uncovered pixels of partially covered tiles from the nearest
    /// covered pixel of the same tile. Coverage is not modified, so running it
    /// again without new data yields the same buffer. `roi` is in buffer-local
    /// coordinates and limits the tiles visited.
    pub fn extrapolate(&mut self, roi: Option<&Viewport>) {
        let layout = self.layout;
        let (tx_range, ty_range) = match tile_span(&layout, roi) {
            Some(span) => span,
            None => return,
        };
        let nc = self.num_chan;
        let mut covered: Vec<(u32, u32, usize)> = Vec::with_capacity(TILE_PIXELS);

        for ty in ty_range {
            for tx in tx_range.clone() {
                let tile = ty as usize * layout.tiles_x() as usize + tx as usize;
                let base = tile * TILE_PIXELS;
                covered.clear();
                let mut in_image = 0usize;
                for offset in 0..TILE_PIXELS {
                    let (x, y) = layout.pixel_coords(base + offset);
                    if !layout.in_image(x, y) {
                        continue;
                    }
                    in_image += 1;
                    if self.mask.is_index_set(base + offset) {
                        covered.push((x, y, base + offset));
                    }
                }
                if covered.is_empty() || covered.len() == in_image {
                    continue;
                }

                for offset in 0..TILE_PIXELS {
                    let index = base + offset;
                    let (x, y) = layout.pixel_coords(index);
                    if !layout.in_image(x, y) || self.mask.is_index_set(index) {
                        continue;
                    }
                    let source = nearest(&covered, x, y);
                    self.data
                        .copy_within(source * nc..(source + 1) * nc, index * nc);
                }
            }
        }
    }

    /// Copies `channels` of every pixel in `roi` (buffer-local, whole buffer
    /// when `None`) into a scanline-ordered vector.
    pub fn untile(
        &self,
        orientation: Orientation,
        roi: Option<&Viewport>,
        channels: Range<usize>,
    ) -> (u32, u32, Vec<f32>) {
        let full = Viewport::from_size(self.layout.width(), self.layout.height());
        let area = match roi {
            Some(roi) => match roi.intersect(&full) {
                Some(area) => area,
                None => return (0, 0, Vec::new()),
            },
            None => full,
        };
        let width = area.width();
        let height = area.height();
        let channels = channels.start.min(self.num_chan)..channels.end.min(self.num_chan);
        let mut out = Vec::with_capacity(width as usize * height as usize * channels.len());

        let rows: Box<dyn Iterator<Item = i32>> = match orientation {
            Orientation::BottomUp => Box::new(area.min_y..=area.max_y),
            Orientation::TopDown => Box::new((area.min_y..=area.max_y).rev()),
        };
        for y in rows {
            for x in area.min_x..=area.max_x {
                let pixel = self.pixel_at(x as u32, y as u32);
                out.extend_from_slice(&pixel[channels.clone()]);
            }
        }
        (width, height, out)
    }
}

fn tile_span(layout: &TileLayout, roi: Option<&Viewport>) -> Option<(Range<u32>, Range<u32>)> {
    let full = Viewport::from_size(layout.width(), layout.height());
    let area = match roi {
        Some(roi) => roi.intersect(&full)?,
        None => {
            if full.is_empty() {
                return None;
            }
            full
        }
    };
    let edge = crate::mask::TILE_EDGE as i32;
    Some((
        (area.min_x / edge) as u32..(area.max_x / edge + 1) as u32,
        (area.min_y / edge) as u32..(area.max_y / edge + 1) as u32,
    ))
}

// Ties resolve to the lowest tiled index.
fn nearest(covered: &[(u32, u32, usize)], x: u32, y: u32) -> usize {
    let mut best = covered[0].2;
    let mut best_dist = u32::MAX;
    for &(cx, cy, index) in covered {
        let dist = cx.abs_diff(x).pow(2) + cy.abs_diff(y).pow(2);
        if dist < best_dist {
            best_dist = dist;
            best = index;
        }
    }
    best
}
