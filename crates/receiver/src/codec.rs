use fbcore::{DecodedTiles, ReferenceKind, TileLayout};

use crate::message::DataType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("unsupported encoding: {0}")]
    Unsupported(String),
}

/// Decodes one named buffer's bytes. Implementations must be pure: the same
/// input always yields the same output.
pub trait TileCodec: Send + Sync {
    fn decode(
        &self,
        data_type: DataType,
        bytes: &[u8],
        layout: TileLayout,
    ) -> Result<DecodedTiles, CodecError>;

    /// Which channel a reference AOV points at.
    fn decode_reference(&self, bytes: &[u8]) -> Result<ReferenceKind, CodecError>;
}

/// Receives everything that is not image data: latency logs, aux info and
/// metadata-only messages.
pub trait MetadataDecoder: Send + Sync {
    fn decode(&self, name: &str, bytes: &[u8]);

    /// Newest sync id the backend reported as rendering; 0 when unknown.
    fn newest_backend_sync_id(&self) -> u32;
}

/// Metadata sink that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreMetadata;

impl MetadataDecoder for IgnoreMetadata {
    fn decode(&self, _name: &str, _bytes: &[u8]) {}

    fn newest_backend_sync_id(&self) -> u32 {
        0
    }
}
