mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{buffer, controller, header};
use fbcore::Orientation;
use receiver::{no_frame_started, CoarsePass, DataType, DenoisePipeline, FrameSessionController, FrameStatus};
use receiverconfig::{DenoiseConfig, DenoiseMode, ResetMode};
use scheduler::{Clock, DenoiseError, DenoiseOutcome, Denoiser, DenoiserConfig};

struct ManualClock(Mutex<Instant>);

impl ManualClock {
    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

struct Scaler {
    clock: Arc<ManualClock>,
    config: DenoiserConfig,
}

impl Denoiser for Scaler {
    fn image_width(&self) -> u32 {
        self.config.width
    }

    fn image_height(&self) -> u32 {
        self.config.height
    }

    fn denoise(
        &mut self,
        beauty: &[f32],
        albedo: Option<&[f32]>,
        _normal: Option<&[f32]>,
    ) -> Result<Vec<f32>, DenoiseError> {
        self.clock.advance(Duration::from_millis(50));
        let scale = if albedo.is_some() { 0.25 } else { 0.5 };
        Ok(beauty.iter().map(|v| v * scale).collect())
    }
}

struct Rig {
    controller: FrameSessionController,
    pipeline: DenoisePipeline,
    clock: Arc<ManualClock>,
    built: Arc<Mutex<Vec<DenoiserConfig>>>,
}

fn rig(mode: DenoiseMode) -> Rig {
    let (controller, _) = controller(ResetMode::Full);
    let clock = Arc::new(ManualClock(Mutex::new(Instant::now())));
    let built = Arc::new(Mutex::new(Vec::new()));
    let factory_clock = Arc::clone(&clock);
    let factory_built = Arc::clone(&built);
    let factory = move |config: &DenoiserConfig| -> Result<Box<dyn Denoiser>, DenoiseError> {
        factory_built.lock().unwrap().push(*config);
        Ok(Box::new(Scaler {
            clock: Arc::clone(&factory_clock),
            config: *config,
        }))
    };
    let config = DenoiseConfig {
        mode,
        ..DenoiseConfig::default()
    };
    let pipeline = DenoisePipeline::with_clock(&config, Arc::new(factory), clock.clone());
    Rig {
        controller,
        pipeline,
        clock,
        built,
    }
}

fn start_frame(ctl: &FrameSessionController) {
    let mut started = header(1, FrameStatus::Started, 0.0);
    started.coarse_pass = CoarsePass::Fine;
    started.denoise_albedo_input = "albedo".into();
    started.denoise_normal_input = "N".into();
    ctl.ingest(
        &started,
        &[
            buffer("beauty", DataType::Beauty, 4, &[(0, 0, &[1.0, 1.0, 1.0, 1.0])]),
            buffer("albedo", DataType::AovGeneric, 3, &[(0, 0, &[0.5, 0.5, 0.5])]),
            buffer("N", DataType::AovGeneric, 4, &[(0, 0, &[0.0, 0.0, 1.0, 0.0])]),
        ],
        false,
        &no_frame_started,
    )
    .unwrap();
}

fn continue_frame(ctl: &FrameSessionController, value: f32) {
    let mut rendering = header(1, FrameStatus::Rendering, 0.5);
    rendering.coarse_pass = CoarsePass::Fine;
    ctl.ingest(
        &rendering,
        &[buffer("beauty", DataType::Beauty, 4, &[(0, 0, &[value; 4])])],
        false,
        &no_frame_started,
    )
    .unwrap();
}

fn corner(data: &[f32]) -> f32 {
    data[0]
}

#[test]
fn disabled_mode_returns_raw_beauty() {
    let mut rig = rig(DenoiseMode::Disable);
    start_frame(&rig.controller);
    continue_frame(&rig.controller, 2.0);
    let out = rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();
    assert_eq!(out.outcome, None);
    assert_eq!(corner(&out.readout.data), 2.0);
    assert!(rig.built.lock().unwrap().is_empty());
}

#[test]
fn first_readout_after_start_is_not_denoised() {
    let mut rig = rig(DenoiseMode::Enable);
    start_frame(&rig.controller);
    let out = rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();
    assert_eq!(out.outcome, Some(DenoiseOutcome::SkippedFrameStart));
    assert_eq!(corner(&out.readout.data), 1.0);
    assert!(rig.pipeline.is_ready());
}

#[test]
fn scheduler_reuses_result_while_denoise_is_expensive() {
    let mut rig = rig(DenoiseMode::Enable);
    start_frame(&rig.controller);
    continue_frame(&rig.controller, 2.0);

    let first = rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();
    assert_eq!(first.outcome, Some(DenoiseOutcome::Denoised));
    assert_eq!(corner(&first.readout.data), 1.0);
    assert_eq!((first.readout.width, first.readout.height), (16, 16));

    continue_frame(&rig.controller, 8.0);
    rig.clock.advance(Duration::from_millis(30));
    let second = rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();
    assert_eq!(second.outcome, Some(DenoiseOutcome::Reused));
    assert_eq!(corner(&second.readout.data), 1.0);

    rig.clock.advance(Duration::from_secs(1));
    let third = rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();
    assert_eq!(third.outcome, Some(DenoiseOutcome::Denoised));
    assert_eq!(corner(&third.readout.data), 4.0);
    assert_eq!(rig.built.lock().unwrap().len(), 1);
}

#[test]
fn guides_follow_mode_and_channel_count() {
    let mut rig = rig(DenoiseMode::EnableAlbedoNormal);
    start_frame(&rig.controller);
    continue_frame(&rig.controller, 2.0);
    let out = rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();
    assert_eq!(out.outcome, Some(DenoiseOutcome::Denoised));
    assert_eq!(corner(&out.readout.data), 0.5);

    let built = rig.built.lock().unwrap().clone();
    assert_eq!(built.len(), 1);
    assert!(built[0].use_albedo);
    assert!(!built[0].use_normal, "four-channel normal must be ignored");
}

#[test]
fn mode_change_rebuilds_denoiser() {
    let mut rig = rig(DenoiseMode::Enable);
    start_frame(&rig.controller);
    continue_frame(&rig.controller, 2.0);
    rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();

    rig.pipeline.set_mode(DenoiseMode::EnableAlbedo);
    let out = rig.pipeline.readout(&rig.controller, Orientation::BottomUp).unwrap();
    assert_eq!(out.outcome, Some(DenoiseOutcome::Denoised));
    let built = rig.built.lock().unwrap().clone();
    assert_eq!(built.len(), 2);
    assert!(!built[0].use_albedo);
    assert!(built[1].use_albedo);
}

#[test]
fn unavailable_engine_falls_back_with_message() {
    let (ctl, _) = controller(ResetMode::Full);
    let factory = |_: &DenoiserConfig| -> Result<Box<dyn Denoiser>, DenoiseError> {
        Err(DenoiseError::Unavailable("optix runtime not found".into()))
    };
    let config = DenoiseConfig {
        mode: DenoiseMode::Enable,
        ..DenoiseConfig::default()
    };
    let mut pipeline = DenoisePipeline::new(&config, Arc::new(factory));
    start_frame(&ctl);
    continue_frame(&ctl, 3.0);

    let out = pipeline.readout(&ctl, Orientation::BottomUp).unwrap();
    assert!(matches!(
        out.outcome,
        Some(DenoiseOutcome::Fallback(DenoiseError::Unavailable(_)))
    ));
    assert_eq!(corner(&out.readout.data), 3.0);
    assert!(!pipeline.is_ready());
    let message = pipeline.take_error().unwrap();
    assert!(message.contains("optix runtime not found"));
    assert!(message.ends_with(": fall back to non-denoised output"));
}
