use fbcore::FbError;

use crate::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Soft failure: the buffer is skipped and ingest continues.
    #[error("failed to decode buffer '{name}': {source}")]
    Codec {
        name: String,
        #[source]
        source: CodecError,
    },
    /// Decoded data does not fit the frame store; ingest is aborted.
    #[error("buffer '{name}' does not fit the frame store: {source}")]
    Structural {
        name: String,
        #[source]
        source: FbError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("failed to build decode pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
