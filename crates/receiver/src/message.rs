use serde::{Deserialize, Serialize};

use fbcore::Viewport;

/// Progress value marking a message that carries metadata but no image.
pub const METADATA_ONLY_PROGRESS: f32 = -1.0;

/// Buffer names that always hold metadata, even inside image messages.
pub const METADATA_BUFFER_NAMES: [&str; 3] = ["latencyLog", "latencyLogUpstream", "auxInfo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Started,
    Rendering,
    Finished,
    Cancelled,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoarsePass {
    Coarse,
    Fine,
    #[default]
    Unknown,
}

impl CoarsePass {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::Coarse,
            1 => Self::Fine,
            _ => Self::Unknown,
        }
    }

    /// Anything but a confirmed fine pass may have sparse tiles.
    pub fn needs_extrapolation(&self) -> bool {
        !matches!(self, Self::Fine)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub sync_id: u32,
    pub view_id: u32,
    pub status: FrameStatus,
    pub progress: f32,
    pub coarse_pass: CoarsePass,
    pub viewport: Viewport,
    pub roi: Option<Viewport>,
    pub snapshot_timestamp_micros: u64,
    pub sender_machine_id: i32,
    /// AOV names the denoiser should use as guides; read on `Started`.
    #[serde(default)]
    pub denoise_albedo_input: String,
    #[serde(default)]
    pub denoise_normal_input: String,
}

impl FrameHeader {
    pub fn new(sync_id: u32, status: FrameStatus, progress: f32, viewport: Viewport) -> Self {
        Self {
            sync_id,
            view_id: 0,
            status,
            progress,
            coarse_pass: CoarsePass::Unknown,
            viewport,
            roi: None,
            snapshot_timestamp_micros: 0,
            sender_machine_id: -1,
            denoise_albedo_input: String::new(),
            denoise_normal_input: String::new(),
        }
    }

    pub fn metadata_only(sync_id: u32) -> Self {
        Self::new(
            sync_id,
            FrameStatus::Rendering,
            METADATA_ONLY_PROGRESS,
            Viewport::default(),
        )
    }

    pub fn is_metadata_only(&self) -> bool {
        self.progress < 0.0
    }
}

/// Declared content of a named buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    Beauty,
    BeautyWithSamples,
    PixelInfo,
    HeatMap,
    HeatMapWithSamples,
    Weight,
    BeautyOdd,
    BeautyOddWithSamples,
    AovReference,
    AovGeneric,
    Unrecognized,
}

impl DataType {
    pub fn carries_samples(&self) -> bool {
        matches!(
            self,
            Self::BeautyWithSamples | Self::HeatMapWithSamples | Self::BeautyOddWithSamples
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedBuffer {
    pub name: String,
    pub data_type: DataType,
    pub bytes: Vec<u8>,
}

impl NamedBuffer {
    pub fn new(name: impl Into<String>, data_type: DataType, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data_type,
            bytes,
        }
    }

    pub fn is_metadata(&self) -> bool {
        METADATA_BUFFER_NAMES.contains(&self.name.as_str())
    }
}
