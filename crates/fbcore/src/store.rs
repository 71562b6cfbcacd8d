use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelBuffer, DecodedTiles, Orientation};
use crate::mask::{ActivePixelMask, TileLayout};
use crate::{FbError, Viewport};

/// Fixed channels every frame store carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WellKnown {
    Beauty,
    PixelInfo,
    HeatMap,
    Weight,
    BeautyOdd,
}

impl WellKnown {
    pub const ALL: [WellKnown; 5] = [
        WellKnown::Beauty,
        WellKnown::PixelInfo,
        WellKnown::HeatMap,
        WellKnown::Weight,
        WellKnown::BeautyOdd,
    ];

    pub fn num_chan(&self) -> usize {
        match self {
            Self::Beauty | Self::BeautyOdd => 4,
            Self::PixelInfo | Self::HeatMap | Self::Weight => 1,
        }
    }

    /// Color channels survive a color-preserving reset.
    fn is_color(&self) -> bool {
        matches!(self, Self::Beauty | Self::BeautyOdd)
    }
}

/// Channel an AOV borrows its storage from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Beauty,
    Alpha,
    HeatMap,
    Weight,
}

impl ReferenceKind {
    fn source(&self) -> (WellKnown, Range<usize>) {
        match self {
            Self::Beauty => (WellKnown::Beauty, 0..3),
            Self::Alpha => (WellKnown::Beauty, 3..4),
            Self::HeatMap => (WellKnown::HeatMap, 0..1),
            Self::Weight => (WellKnown::Weight, 0..1),
        }
    }
}

#[derive(Debug)]
pub enum ChannelKind {
    Owned(RwLock<ChannelBuffer>),
    Reference(ReferenceKind),
}

/// How much of the previous frame a `Started` transition wipes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetMode {
    /// Zero every channel.
    Full,
    /// Clear coverage of color channels but keep their values on screen;
    /// auxiliary channels and AOVs are zeroed.
    #[default]
    PreserveColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadoutSource<'a> {
    Channel(WellKnown),
    AovIndex(usize),
    AovName(&'a str),
}

/// Untiled copy of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub width: u32,
    pub height: u32,
    pub num_chan: usize,
    pub data: Vec<f32>,
}

#[derive(Debug, Default)]
struct AovTable {
    entries: Vec<(String, Arc<ChannelKind>)>,
    index: HashMap<String, usize>,
}

/// Every channel buffer for one rezed viewport.
#[derive(Debug)]
pub struct FrameStore {
    viewport: Viewport,
    layout: TileLayout,
    beauty: RwLock<ChannelBuffer>,
    pixel_info: RwLock<ChannelBuffer>,
    heat_map: RwLock<ChannelBuffer>,
    weight: RwLock<ChannelBuffer>,
    beauty_odd: RwLock<ChannelBuffer>,
    aovs: RwLock<AovTable>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl FrameStore {
    pub fn new(viewport: Viewport) -> Self {
        let layout = TileLayout::new(viewport.width(), viewport.height());
        let channel = |kind: WellKnown| RwLock::new(ChannelBuffer::new(layout, kind.num_chan()));
        Self {
            viewport,
            layout,
            beauty: channel(WellKnown::Beauty),
            pixel_info: channel(WellKnown::PixelInfo),
            heat_map: channel(WellKnown::HeatMap),
            weight: channel(WellKnown::Weight),
            beauty_odd: channel(WellKnown::BeautyOdd),
            aovs: RwLock::new(AovTable::default()),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn layout(&self) -> TileLayout {
        self.layout
    }

    fn channel(&self, kind: WellKnown) -> &RwLock<ChannelBuffer> {
        match kind {
            WellKnown::Beauty => &self.beauty,
            WellKnown::PixelInfo => &self.pixel_info,
            WellKnown::HeatMap => &self.heat_map,
            WellKnown::Weight => &self.weight,
            WellKnown::BeautyOdd => &self.beauty_odd,
        }
    }

    pub fn reset(&self, mode: ResetMode) {
        for kind in WellKnown::ALL {
            let mut buffer = write(self.channel(kind));
            if mode == ResetMode::PreserveColor && kind.is_color() {
                buffer.reset_coverage();
            } else {
                buffer.reset();
            }
        }
        for (_, entry) in &read(&self.aovs).entries {
            if let ChannelKind::Owned(lock) = entry.as_ref() {
                write(lock).reset();
            }
        }
    }

    pub fn merge_decoded(&self, kind: WellKnown, update: &DecodedTiles) -> Result<(), FbError> {
        write(self.channel(kind)).merge_decoded(update)
    }

    /// Merges into the named AOV, allocating it with the update's channel
    /// count on first sight.
    pub fn merge_aov(&self, name: &str, update: &DecodedTiles) -> Result<(), FbError> {
        let entry = self.aov_entry_or_insert(name, || {
            ChannelKind::Owned(RwLock::new(ChannelBuffer::new(self.layout, update.num_chan)))
        });
        match entry.as_ref() {
            ChannelKind::Owned(lock) => write(lock).merge_decoded(update),
            ChannelKind::Reference(_) => Err(FbError::ReferenceAov(name.to_string())),
        }
    }

    /// Records `name` as an alias onto a well-known channel. Later sightings
    /// are no-ops.
    pub fn register_reference(&self, name: &str, kind: ReferenceKind) {
        self.aov_entry_or_insert(name, || ChannelKind::Reference(kind));
    }

    fn aov_entry_or_insert(
        &self,
        name: &str,
        make: impl FnOnce() -> ChannelKind,
    ) -> Arc<ChannelKind> {
        {
            let table = read(&self.aovs);
            if let Some(&index) = table.index.get(name) {
                return Arc::clone(&table.entries[index].1);
            }
        }
        let mut table = write(&self.aovs);
        if let Some(&index) = table.index.get(name) {
            return Arc::clone(&table.entries[index].1);
        }
        let entry = Arc::new(make());
        let index = table.entries.len();
        table.entries.push((name.to_string(), Arc::clone(&entry)));
        table.index.insert(name.to_string(), index);
        tracing::debug!(aov = name, index, "registered aov");
        entry
    }

    pub fn aov_count(&self) -> usize {
        read(&self.aovs).entries.len()
    }

    pub fn aov_name(&self, index: usize) -> Option<String> {
        read(&self.aovs).entries.get(index).map(|(name, _)| name.clone())
    }

    pub fn aov_index(&self, name: &str) -> Option<usize> {
        read(&self.aovs).index.get(name).copied()
    }

    pub fn aov_reference(&self, name: &str) -> Option<ReferenceKind> {
        let table = read(&self.aovs);
        let index = *table.index.get(name)?;
        match table.entries[index].1.as_ref() {
            ChannelKind::Reference(kind) => Some(*kind),
            ChannelKind::Owned(_) => None,
        }
    }

    pub fn mask(&self, kind: WellKnown) -> ActivePixelMask {
        read(self.channel(kind)).mask().clone()
    }

    pub fn pixel(&self, kind: WellKnown, x: u32, y: u32) -> Option<Vec<f32>> {
        read(self.channel(kind)).pixel(x, y).map(<[f32]>::to_vec)
    }

    pub fn snapshot(&self, kind: WellKnown) -> ChannelBuffer {
        read(self.channel(kind)).clone()
    }

    /// Untiles `source`. With `extrapolate` set, partially covered tiles are
    /// filled first; `roi` is in viewport coordinates and bounds both steps.
    pub fn readout(
        &self,
        source: ReadoutSource<'_>,
        orientation: Orientation,
        roi: Option<&Viewport>,
        extrapolate: bool,
    ) -> Result<Readout, FbError> {
        let local_roi = roi.map(|roi| roi.relative_to(&self.viewport));
        let local_roi = local_roi.as_ref();

        let entry = match source {
            ReadoutSource::Channel(kind) => {
                return self.readout_well_known(
                    kind,
                    0..kind.num_chan(),
                    orientation,
                    local_roi,
                    extrapolate,
                )
            }
            ReadoutSource::AovIndex(index) => read(&self.aovs)
                .entries
                .get(index)
                .map(|(_, entry)| Arc::clone(entry))
                .ok_or(FbError::AovIndexOutOfRange(index))?,
            ReadoutSource::AovName(name) => {
                let table = read(&self.aovs);
                let index = *table
                    .index
                    .get(name)
                    .ok_or_else(|| FbError::UnknownAov(name.to_string()))?;
                Arc::clone(&table.entries[index].1)
            }
        };

        match entry.as_ref() {
            ChannelKind::Reference(kind) => {
                let (well_known, range) = kind.source();
                self.readout_well_known(well_known, range, orientation, local_roi, extrapolate)
            }
            ChannelKind::Owned(lock) => {
                if extrapolate {
                    write(lock).extrapolate(local_roi);
                }
                let buffer = read(lock);
                let num_chan = buffer.num_chan();
                let (width, height, data) =
                    buffer.untile(orientation, local_roi, 0..num_chan);
                Ok(Readout {
                    width,
                    height,
                    num_chan,
                    data,
                })
            }
        }
    }

    fn readout_well_known(
        &self,
        kind: WellKnown,
        channels: Range<usize>,
        orientation: Orientation,
        roi: Option<&Viewport>,
        extrapolate: bool,
    ) -> Result<Readout, FbError> {
        let lock = self.channel(kind);
        if extrapolate {
            write(lock).extrapolate(roi);
        }
        let buffer = read(lock);
        let num_chan = channels.len();
        let (width, height, data) = buffer.untile(orientation, roi, channels);
        Ok(Readout {
            width,
            height,
            num_chan,
            data,
        })
    }
}
