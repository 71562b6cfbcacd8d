use crate::merge::merge_weighted;
use crate::{FbError, Readout};

/// Largest per-channel difference [`RgbImage::is_same`] accepts.
pub const PIXEL_TOLERANCE: f32 = 0.05 / 255.0;

/// Plain RGB snapshot with `y = 0` as the bottom row.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [f32; 3]) -> Self {
        let mut image = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                image.set_pixel(x, y, f(x, y));
            }
        }
        image
    }

    /// RGB of a bottom-up readout with at least three channels, such as
    /// the beauty channel. Extra channels are dropped.
    pub fn from_readout(readout: &Readout) -> Result<Self, FbError> {
        let nc = readout.num_chan;
        if nc < 3 {
            return Err(FbError::mismatch("readout channel count", 3, nc));
        }
        let expected = readout.width as usize * readout.height as usize * nc;
        if readout.data.len() != expected {
            return Err(FbError::mismatch(
                "readout value count",
                expected,
                readout.data.len(),
            ));
        }
        let width = readout.width as usize;
        Ok(Self::from_fn(readout.width, readout.height, |x, y| {
            let start = (y as usize * width + x as usize) * nc;
            [
                readout.data[start],
                readout.data[start + 1],
                readout.data[start + 2],
            ]
        }))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        self.pixels[self.offset(x, y)]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: [f32; 3]) {
        let offset = self.offset(x, y);
        self.pixels[offset] = value;
    }

    pub fn same_size(&self, other: &RgbImage) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// True when sizes match and no channel differs by more than
    /// [`PIXEL_TOLERANCE`].
    pub fn is_same(&self, other: &RgbImage) -> bool {
        self.same_size(other)
            && self.pixels.iter().zip(&other.pixels).all(|(a, b)| {
                a.iter()
                    .zip(b)
                    .all(|(ca, cb)| (ca - cb).abs() <= PIXEL_TOLERANCE)
            })
    }

    /// Largest value of channel 0, used to normalize sample-count dumps.
    pub fn max_channel0(&self) -> f32 {
        self.pixels.iter().map(|p| p[0]).fold(0.0, f32::max)
    }

    /// Accumulates `(color, count)` into `(acc_color, acc_count)`. Counts are
    /// read from channel 0 and broadcast to all three channels on output.
    pub fn merge_into(
        acc_color: &mut RgbImage,
        acc_count: &mut RgbImage,
        color: &RgbImage,
        count: &RgbImage,
    ) -> Result<(), FbError> {
        for other in [&*acc_count, color, count] {
            if !acc_color.same_size(other) {
                return Err(FbError::LayoutMismatch {
                    expected: (acc_color.width, acc_color.height),
                    actual: (other.width, other.height),
                });
            }
        }

        let mut acc_flat: Vec<f32> = acc_color.pixels.iter().flatten().copied().collect();
        let mut acc_n: Vec<f32> = acc_count.pixels.iter().map(|p| p[0]).collect();
        let src_flat: Vec<f32> = color.pixels.iter().flatten().copied().collect();
        let src_n: Vec<f32> = count.pixels.iter().map(|p| p[0]).collect();
        merge_weighted(&mut acc_flat, &mut acc_n, &src_flat, &src_n, 3)?;

        for (pixel, chunk) in acc_color.pixels.iter_mut().zip(acc_flat.chunks_exact(3)) {
            pixel.copy_from_slice(chunk);
        }
        for (pixel, n) in acc_count.pixels.iter_mut().zip(acc_n) {
            *pixel = [n; 3];
        }
        Ok(())
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}
