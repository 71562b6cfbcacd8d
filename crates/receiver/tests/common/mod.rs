#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use fbcore::{
    ActivePixelMask, DecodedTiles, PassPrecision, Precision, ReferenceKind, TileLayout, Viewport,
};
use receiver::{
    CodecError, DataType, FrameHeader, FrameSessionController, FrameStatus, MetadataDecoder,
    NamedBuffer, TileCodec,
};
use receiverconfig::{ResetMode, SessionConfig};

/// Sparse little-endian test encoding:
/// `u32 num_chan, u32 count, count * (u32 x, u32 y, num_chan * f32 [, f32 samples])`.
pub struct SparseCodec;

fn take_u32(bytes: &[u8], at: &mut usize) -> Result<u32, CodecError> {
    let chunk = bytes
        .get(*at..*at + 4)
        .ok_or_else(|| CodecError::Malformed("truncated".into()))?;
    *at += 4;
    Ok(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

fn take_f32(bytes: &[u8], at: &mut usize) -> Result<f32, CodecError> {
    take_u32(bytes, at).map(f32::from_bits)
}

impl TileCodec for SparseCodec {
    fn decode(
        &self,
        data_type: DataType,
        bytes: &[u8],
        layout: TileLayout,
    ) -> Result<DecodedTiles, CodecError> {
        let mut at = 0;
        let num_chan = take_u32(bytes, &mut at)? as usize;
        let count = take_u32(bytes, &mut at)? as usize;
        let mut mask = ActivePixelMask::new(layout);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let x = take_u32(bytes, &mut at)?;
            let y = take_u32(bytes, &mut at)?;
            if !layout.in_image(x, y) {
                return Err(CodecError::Malformed(format!("pixel {x},{y} outside image")));
            }
            let values = (0..num_chan)
                .map(|_| take_f32(bytes, &mut at))
                .collect::<Result<Vec<_>, _>>()?;
            let samples = if data_type.carries_samples() {
                Some(take_f32(bytes, &mut at)?)
            } else {
                None
            };
            mask.set(x, y);
            entries.push((layout.tiled_index(x, y), values, samples));
        }
        entries.sort_by_key(|(index, _, _)| *index);
        Ok(DecodedTiles {
            mask,
            num_chan,
            values: entries.iter().flat_map(|(_, v, _)| v.clone()).collect(),
            sample_counts: data_type
                .carries_samples()
                .then(|| entries.iter().filter_map(|(_, _, s)| *s).collect()),
            precision: PassPrecision {
                coarse: Precision::H16,
                fine: Precision::F32,
            },
        })
    }

    fn decode_reference(&self, bytes: &[u8]) -> Result<ReferenceKind, CodecError> {
        match bytes.first() {
            Some(0) => Ok(ReferenceKind::Beauty),
            Some(1) => Ok(ReferenceKind::Alpha),
            Some(2) => Ok(ReferenceKind::HeatMap),
            Some(3) => Ok(ReferenceKind::Weight),
            other => Err(CodecError::Unsupported(format!("reference tag {other:?}"))),
        }
    }
}

pub fn encode(num_chan: u32, pixels: &[(u32, u32, &[f32])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&num_chan.to_le_bytes());
    out.extend_from_slice(&(pixels.len() as u32).to_le_bytes());
    for (x, y, values) in pixels {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
        for v in values.iter() {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

pub fn buffer(name: &str, data_type: DataType, num_chan: u32, pixels: &[(u32, u32, &[f32])]) -> NamedBuffer {
    NamedBuffer::new(name, data_type, encode(num_chan, pixels))
}

/// Metadata decoder that remembers what it saw; a 4-byte `auxInfo` payload
/// announces the newest backend sync id.
#[derive(Default)]
pub struct RecordingMetadata {
    pub seen: Mutex<Vec<String>>,
    newest: AtomicU32,
}

impl MetadataDecoder for RecordingMetadata {
    fn decode(&self, name: &str, bytes: &[u8]) {
        self.seen.lock().unwrap().push(name.to_string());
        if name == "auxInfo" && bytes.len() == 4 {
            let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            self.newest.store(id, Ordering::SeqCst);
        }
    }

    fn newest_backend_sync_id(&self) -> u32 {
        self.newest.load(Ordering::SeqCst)
    }
}

pub fn controller(mode: ResetMode) -> (FrameSessionController, Arc<RecordingMetadata>) {
    let metadata = Arc::new(RecordingMetadata::default());
    let config = SessionConfig {
        reset_mode: mode,
        worker_threads: 2,
        ..SessionConfig::default()
    };
    let controller =
        FrameSessionController::new(&config, Arc::new(SparseCodec), metadata.clone()).unwrap();
    (controller, metadata)
}

pub fn header(sync_id: u32, status: FrameStatus, progress: f32) -> FrameHeader {
    FrameHeader::new(sync_id, status, progress, Viewport::from_size(16, 16))
}
