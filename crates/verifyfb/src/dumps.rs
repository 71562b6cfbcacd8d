use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fbcore::{read_image_file, DumpFormat, ImageKind, RgbImage};

/// A beauty image and its per-pixel sample counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampled {
    pub beauty: RgbImage,
    pub num_sample: RgbImage,
}

impl Sampled {
    pub fn zero(width: u32, height: u32) -> Self {
        Self {
            beauty: RgbImage::new(width, height),
            num_sample: RgbImage::new(width, height),
        }
    }

    pub fn is_same(&self, other: &Sampled) -> bool {
        self.beauty.is_same(&other.beauty) && self.num_sample.is_same(&other.num_sample)
    }

    pub fn merge(&mut self, other: &Sampled) -> Result<(), fbcore::FbError> {
        RgbImage::merge_into(
            &mut self.beauty,
            &mut self.num_sample,
            &other.beauty,
            &other.num_sample,
        )
    }
}

/// What one render machine dumped for a feedback frame.
#[derive(Debug, Clone)]
pub struct MachineDumps {
    pub machine_id: u32,
    /// Image the merger sent back to this machine.
    pub feedback: Sampled,
    /// The feedback as decoded by this machine.
    pub decoded: Sampled,
    /// This machine's own contribution to the merge.
    pub merged: Sampled,
    /// Feedback with this machine's contribution removed.
    pub minus_one: Sampled,
}

/// Everything dumped for one feedback frame.
#[derive(Debug, Clone)]
pub struct FrameDumps {
    pub merge_all: Sampled,
    /// Per-machine images as seen by the merger, indexed by machine id.
    pub merge: Vec<Sampled>,
    pub machines: Vec<MachineDumps>,
}

/// Which per-machine image a `mcrt_*` dump holds.
#[derive(Debug, Clone, Copy)]
pub enum Stage {
    Feedback,
    Decoded,
    Merged,
    MinusOne,
}

impl Stage {
    fn suffix(self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Decoded => "decoded",
            Self::Merged => "merged",
            Self::MinusOne => "minusOne",
        }
    }
}

fn image_label(kind: ImageKind) -> &'static str {
    match kind {
        ImageKind::Beauty => "beauty",
        ImageKind::NumSample => "beautyNumSample",
    }
}

pub fn merge_all_path(dir: &Path, frame: u32, kind: ImageKind, format: DumpFormat) -> PathBuf {
    dir.join(format!(
        "mergeAll_fId{frame}_{}.{}",
        image_label(kind),
        format.extension()
    ))
}

pub fn merge_path(dir: &Path, frame: u32, machine: u32, kind: ImageKind, format: DumpFormat) -> PathBuf {
    dir.join(format!(
        "merge_fId{frame}_mId{machine}_{}.{}",
        image_label(kind),
        format.extension()
    ))
}

pub fn mcrt_path(
    dir: &Path,
    frame: u32,
    machine: u32,
    stage: Stage,
    kind: ImageKind,
    format: DumpFormat,
) -> PathBuf {
    dir.join(format!(
        "mcrt_fId{frame}_mId{machine}_{}_{}.{}",
        image_label(kind),
        stage.suffix(),
        format.extension()
    ))
}

fn load_sampled(
    format: DumpFormat,
    path_for: impl Fn(ImageKind) -> PathBuf,
) -> Result<Sampled> {
    let load = |kind: ImageKind| -> Result<RgbImage> {
        let path = path_for(kind);
        let image = read_image_file(&path, kind, format)
            .with_context(|| format!("failed to read {}", path.display()))?;
        tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "loaded dump");
        Ok(image)
    };
    Ok(Sampled {
        beauty: load(ImageKind::Beauty)?,
        num_sample: load(ImageKind::NumSample)?,
    })
}

impl FrameDumps {
    pub fn load(dir: &Path, machines: u32, frame: u32, format: DumpFormat) -> Result<Self> {
        let merge_all = load_sampled(format, |kind| merge_all_path(dir, frame, kind, format))?;
        let merge = (0..machines)
            .map(|m| load_sampled(format, |kind| merge_path(dir, frame, m, kind, format)))
            .collect::<Result<Vec<_>>>()?;
        let machines = (0..machines)
            .map(|m| {
                let stage = |stage: Stage| {
                    load_sampled(format, |kind| mcrt_path(dir, frame, m, stage, kind, format))
                };
                Ok(MachineDumps {
                    machine_id: m,
                    feedback: stage(Stage::Feedback)?,
                    decoded: stage(Stage::Decoded)?,
                    merged: stage(Stage::Merged)?,
                    minus_one: stage(Stage::MinusOne)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            merge_all,
            merge,
            machines,
        })
    }
}
