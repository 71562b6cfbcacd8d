use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fbcore::{
    DecodedTiles, FbError, FrameStore, Orientation, Readout, ReadoutSource, ResetMode, Viewport,
    WellKnown,
};
use rayon::prelude::*;
use receiverconfig::SessionConfig;

use crate::callbacks::{FrameStartedCallback, MessageSink};
use crate::codec::{CodecError, MetadataDecoder, TileCodec};
use crate::error::{DecodeError, ReceiverError};
use crate::message::{CoarsePass, DataType, FrameHeader, FrameStatus, NamedBuffer};
use crate::session::SessionState;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Assembles a progressive frame from a stream of update messages.
///
/// `ingest` must be called from one thread at a time in wire-arrival order.
/// Getters and readouts may run concurrently from another thread; each
/// channel is guarded by its own lock so a readout sees either the state
/// before or after a buffer merge, never half of one.
pub struct FrameSessionController {
    codec: Arc<dyn TileCodec>,
    metadata: Arc<dyn MetadataDecoder>,
    reset_mode: ResetMode,
    parallel_default: bool,
    pool: Option<rayon::ThreadPool>,
    store: RwLock<FrameStore>,
    session: RwLock<SessionState>,
    activity: AtomicU64,
}

enum Dispatch {
    Merged,
    /// Empty payloads and metadata.
    Ignored,
    Skipped,
}

impl FrameSessionController {
    pub fn new(
        config: &SessionConfig,
        codec: Arc<dyn TileCodec>,
        metadata: Arc<dyn MetadataDecoder>,
    ) -> Result<Self, ReceiverError> {
        let pool = if config.worker_threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.worker_threads)
                    .thread_name(|i| format!("frame-decode-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            codec,
            metadata,
            reset_mode: config.reset_mode,
            parallel_default: config.parallel_decode,
            pool,
            store: RwLock::new(FrameStore::new(Viewport::default())),
            session: RwLock::new(SessionState::new(config.fps_window)),
            activity: AtomicU64::new(0),
        })
    }

    pub fn reset_mode(&self) -> ResetMode {
        self.reset_mode
    }

    pub fn set_reset_mode(&mut self, mode: ResetMode) {
        self.reset_mode = mode;
    }

    /// Whether the configured session prefers parallel decode.
    pub fn parallel_default(&self) -> bool {
        self.parallel_default
    }

    pub fn ingest(
        &self,
        header: &FrameHeader,
        buffers: &[NamedBuffer],
        parallel: bool,
        on_started: &dyn FrameStartedCallback,
    ) -> Result<(), DecodeError> {
        if header.is_metadata_only() {
            self.ingest_metadata(buffers);
            return Ok(());
        }

        let received = Instant::now();
        self.ensure_viewport(header.viewport);

        // The frame id moves with every image message, whichever status it
        // carries; only a `Started` for a frame not seen yet resets the store.
        let frame_changed = {
            let mut session = write(&self.session);
            let changed = session.last_sync_id != Some(header.sync_id);
            session.last_sync_id = Some(header.sync_id);
            if changed {
                session.frame_started_at = Some(received);
            }
            if header.status == FrameStatus::Started {
                session.denoise_albedo_input = header.denoise_albedo_input.clone();
                session.denoise_normal_input = header.denoise_normal_input.clone();
            }
            changed
        };
        if header.status == FrameStatus::Started && frame_changed {
            read(&self.store).reset(self.reset_mode);
            tracing::debug!(
                sync_id = header.sync_id,
                reset_mode = ?self.reset_mode,
                "frame started"
            );
            on_started.frame_started(header);
        }

        let skipped = Mutex::new(Vec::new());
        let message_size: usize = buffers.iter().map(|b| b.bytes.len()).sum();
        {
            let store = read(&self.store);
            let store: &FrameStore = &store;
            let run_one = |buffer: &NamedBuffer| -> Result<(), DecodeError> {
                match self.dispatch(store, buffer)? {
                    Dispatch::Skipped => skipped
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(buffer.name.clone()),
                    Dispatch::Merged | Dispatch::Ignored => {}
                }
                Ok(())
            };
            if parallel {
                let fan_out = || buffers.par_iter().try_for_each(run_one);
                match &self.pool {
                    Some(pool) => pool.install(fan_out)?,
                    None => fan_out()?,
                }
            } else {
                buffers.iter().try_for_each(run_one)?;
            }
        }

        let mut session = write(&self.session);
        session.view_id = header.view_id;
        session.status = Some(header.status);
        session.progress = header.progress;
        session.coarse_pass = header.coarse_pass;
        session.roi = header.roi;
        session.sender_machine_id = header.sender_machine_id;
        session.last_message_size = message_size;
        session.snapshot_timestamp_micros = header.snapshot_timestamp_micros;
        session.latency_sec = latency_since(header.snapshot_timestamp_micros);
        session.skipped = skipped.into_inner().unwrap_or_else(PoisonError::into_inner);
        session.fps.record(received);
        self.activity.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn ingest_metadata(&self, buffers: &[NamedBuffer]) {
        for buffer in buffers.iter().filter(|b| !b.bytes.is_empty()) {
            self.metadata.decode(&buffer.name, &buffer.bytes);
        }
        // A newer frame already rendering upstream makes the progress of the
        // last image stale. The metadata header's own id is not trusted here.
        // Image buffers stay as they are until the new frame's data arrives.
        let newest = self.metadata.newest_backend_sync_id();
        let mut session = write(&self.session);
        let current = session.last_sync_id.unwrap_or(0);
        if current > 0 && current < newest {
            if session.progress > 0.0 {
                tracing::debug!(
                    sync_id = current,
                    newest,
                    "newer backend frame detected, progress reset"
                );
            }
            session.progress = 0.0;
        }
    }

    fn ensure_viewport(&self, viewport: Viewport) {
        if read(&self.store).viewport() == viewport {
            return;
        }
        let mut store = write(&self.store);
        if store.viewport() != viewport {
            tracing::info!(
                width = viewport.width(),
                height = viewport.height(),
                "viewport changed, reinitialising frame store"
            );
            *store = FrameStore::new(viewport);
        }
    }

    fn dispatch(&self, store: &FrameStore, buffer: &NamedBuffer) -> Result<Dispatch, DecodeError> {
        if buffer.bytes.is_empty() {
            return Ok(Dispatch::Ignored);
        }
        if buffer.is_metadata() {
            self.metadata.decode(&buffer.name, &buffer.bytes);
            return Ok(Dispatch::Ignored);
        }

        let target = match buffer.data_type {
            DataType::Beauty | DataType::BeautyWithSamples => Some(WellKnown::Beauty),
            DataType::PixelInfo => Some(WellKnown::PixelInfo),
            DataType::HeatMap | DataType::HeatMapWithSamples => Some(WellKnown::HeatMap),
            DataType::Weight => Some(WellKnown::Weight),
            DataType::BeautyOdd | DataType::BeautyOddWithSamples => Some(WellKnown::BeautyOdd),
            DataType::AovGeneric => None,
            DataType::AovReference => {
                return match self.codec.decode_reference(&buffer.bytes) {
                    Ok(kind) => {
                        store.register_reference(&buffer.name, kind);
                        Ok(Dispatch::Merged)
                    }
                    Err(err) => Ok(self.skip(buffer, err)),
                };
            }
            DataType::Unrecognized => {
                tracing::debug!(buffer = %buffer.name, "unrecognized buffer type skipped");
                return Ok(Dispatch::Skipped);
            }
        };

        let decoded: DecodedTiles = match self.codec.decode(buffer.data_type, &buffer.bytes, store.layout()) {
            Ok(decoded) => decoded,
            Err(err) => return Ok(self.skip(buffer, err)),
        };
        let merged = match target {
            Some(kind) => store.merge_decoded(kind, &decoded),
            None => store.merge_aov(&buffer.name, &decoded),
        };
        merged.map_err(|source| DecodeError::Structural {
            name: buffer.name.clone(),
            source,
        })?;
        Ok(Dispatch::Merged)
    }

    fn skip(&self, buffer: &NamedBuffer, source: CodecError) -> Dispatch {
        let err = DecodeError::Codec {
            name: buffer.name.clone(),
            source,
        };
        tracing::warn!(error = %err, "buffer skipped");
        Dispatch::Skipped
    }

    /// Untiles one channel. When the last pass may be sparse, partially
    /// covered tiles are extrapolated first. `roi` falls back to the ROI of
    /// the last message.
    pub fn get_readout(
        &self,
        source: ReadoutSource<'_>,
        orientation: Orientation,
        roi: Option<&Viewport>,
    ) -> Result<Readout, FbError> {
        let (extrapolate, session_roi) = {
            let session = read(&self.session);
            (session.coarse_pass.needs_extrapolation(), session.roi)
        };
        let roi = roi.copied().or(session_roi);
        read(&self.store).readout(source, orientation, roi.as_ref(), extrapolate)
    }

    /// Runs `f` against the frame store under its read lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&FrameStore) -> R) -> R {
        f(&read(&self.store))
    }

    pub fn sync_id(&self) -> Option<u32> {
        read(&self.session).last_sync_id
    }

    pub fn view_id(&self) -> u32 {
        read(&self.session).view_id
    }

    pub fn status(&self) -> Option<FrameStatus> {
        read(&self.session).status
    }

    pub fn progress(&self) -> f32 {
        read(&self.session).progress
    }

    pub fn coarse_pass(&self) -> CoarsePass {
        read(&self.session).coarse_pass
    }

    pub fn rezed_viewport(&self) -> Viewport {
        read(&self.store).viewport()
    }

    pub fn roi_viewport(&self) -> Option<Viewport> {
        read(&self.session).roi
    }

    pub fn sender_machine_id(&self) -> i32 {
        read(&self.session).sender_machine_id
    }

    /// Bumped once per ingest that carried image data.
    pub fn activity_counter(&self) -> u64 {
        self.activity.load(Ordering::Acquire)
    }

    pub fn last_message_size(&self) -> usize {
        read(&self.session).last_message_size
    }

    pub fn snapshot_timestamp_micros(&self) -> u64 {
        read(&self.session).snapshot_timestamp_micros
    }

    /// Seconds between the producer's snapshot and receipt of the last message.
    pub fn latency_sec(&self) -> f32 {
        read(&self.session).latency_sec
    }

    pub fn elapsed_since_frame_start(&self) -> Option<Duration> {
        read(&self.session)
            .frame_started_at
            .map(|started| started.elapsed())
    }

    pub fn receive_fps(&self) -> f32 {
        read(&self.session).fps.fps(Instant::now())
    }

    pub fn denoise_inputs(&self) -> (String, String) {
        let session = read(&self.session);
        (
            session.denoise_albedo_input.clone(),
            session.denoise_normal_input.clone(),
        )
    }

    /// Names of buffers the last ingest skipped.
    pub fn skipped_buffers(&self) -> Vec<String> {
        read(&self.session).skipped.clone()
    }

    pub fn describe(&self, sink: &dyn MessageSink) {
        let session = read(&self.session);
        let viewport = read(&self.store).viewport();
        sink.message(&format!(
            "sync:{} status:{:?} progress:{:.1}% pass:{:?}",
            session
                .last_sync_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".into()),
            session.status,
            session.progress * 100.0,
            session.coarse_pass
        ));
        sink.message(&format!(
            "viewport:{}x{} roi:{:?} machine:{} size:{}B latency:{:.3}s activity:{}",
            viewport.width(),
            viewport.height(),
            session.roi,
            session.sender_machine_id,
            session.last_message_size,
            session.latency_sec,
            self.activity_counter()
        ));
    }
}

fn latency_since(snapshot_micros: u64) -> f32 {
    if snapshot_micros == 0 {
        return 0.0;
    }
    let now_micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    now_micros.saturating_sub(snapshot_micros) as f32 / 1_000_000.0
}
