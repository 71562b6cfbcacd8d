//! Client-side assembly of progressively refined frames streamed by many
//! render workers.
//!
//! A [`FrameSessionController`] turns header-plus-buffers messages into a
//! consistent [`fbcore::FrameStore`]: it reinitialises on viewport changes,
//! resets on new `Started` frames and merges every named buffer through the
//! external [`TileCodec`]. [`DenoisePipeline`] sits on the readout side and
//! decides per readout whether a fresh denoise is worth running.

mod callbacks;
mod codec;
mod controller;
mod denoise;
mod error;
mod message;
mod session;

pub use callbacks::{no_frame_started, FrameStartedCallback, MessageSink};
pub use codec::{CodecError, IgnoreMetadata, MetadataDecoder, TileCodec};
pub use controller::FrameSessionController;
pub use denoise::{DenoisePipeline, DenoisedReadout};
pub use error::{DecodeError, ReceiverError};
pub use message::{
    CoarsePass, DataType, FrameHeader, FrameStatus, NamedBuffer, METADATA_BUFFER_NAMES,
    METADATA_ONLY_PROGRESS,
};
pub use session::FpsTracker;
