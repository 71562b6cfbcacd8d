//! Framebuffer primitives shared by the progressive frame receiver and the
//! offline verification tool.
//!
//! Pixel data lives in 8x8 tiles. Every [`ChannelBuffer`] pairs its tiled
//! values with an [`ActivePixelMask`] recording which pixels have received
//! data, and a [`FrameStore`] groups the buffers that describe one viewport:
//!
//! ```text
//!   DecodedTiles ──▶ FrameStore::merge_decoded ──▶ ChannelBuffer (mask |= new)
//!                                                        │
//!   readout ◀── untile ◀── extrapolate (partial coverage)┘
//! ```

mod channel;
mod dump;
mod error;
mod image;
mod mask;
mod merge;
mod quantize;
mod store;
mod viewport;

pub use channel::{ChannelBuffer, DecodedTiles, Orientation, PassPrecision, Precision};
pub use dump::{
    read_image, read_image_file, write_image, write_image_file, DumpFormat, ImageKind,
};
pub use error::FbError;
pub use image::{RgbImage, PIXEL_TOLERANCE};
pub use mask::{ActivePixelMask, TileLayout, TILE_EDGE, TILE_PIXELS};
pub use merge::{merge, merge_weighted, AccumulatedSample};
pub use quantize::{gamma22_to_u8, u8_gamma22_to_linear};
pub use store::{
    ChannelKind, FrameStore, Readout, ReadoutSource, ReferenceKind, ResetMode, WellKnown,
};
pub use viewport::Viewport;
