use std::sync::Arc;

use fbcore::{FbError, Orientation, Readout, ReadoutSource, WellKnown};
use receiverconfig::{DenoiseConfig, DenoiseEngine, DenoiseMode};
use scheduler::{BeautyDenoiser, Clock, DenoiseOutcome, DenoiseRequest, DenoiserConfig, DenoiserFactory};

use crate::controller::FrameSessionController;
use crate::message::FrameStatus;

/// Beauty readout after the denoise decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DenoisedReadout {
    pub readout: Readout,
    /// `None` when denoising is disabled.
    pub outcome: Option<DenoiseOutcome>,
}

/// Feeds beauty readouts and guide AOVs from a controller through a cached,
/// adaptively scheduled denoiser.
pub struct DenoisePipeline {
    denoiser: BeautyDenoiser,
    engine: DenoiseEngine,
    mode: DenoiseMode,
}

impl DenoisePipeline {
    pub fn new(config: &DenoiseConfig, factory: Arc<dyn DenoiserFactory>) -> Self {
        Self {
            denoiser: BeautyDenoiser::new(factory, config.history),
            engine: config.engine,
            mode: config.mode,
        }
    }

    pub fn with_clock(
        config: &DenoiseConfig,
        factory: Arc<dyn DenoiserFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            denoiser: BeautyDenoiser::with_clock(factory, clock, config.history),
            engine: config.engine,
            mode: config.mode,
        }
    }

    pub fn set_mode(&mut self, mode: DenoiseMode) {
        self.mode = mode;
    }

    pub fn set_engine(&mut self, engine: DenoiseEngine) {
        self.engine = engine;
    }

    pub fn mode(&self) -> DenoiseMode {
        self.mode
    }

    pub fn is_ready(&self) -> bool {
        self.denoiser.is_ready()
    }

    /// Last denoiser error, cleared by this call.
    pub fn take_error(&mut self) -> Option<String> {
        self.denoiser.take_error()
    }

    pub fn readout(
        &mut self,
        controller: &FrameSessionController,
        orientation: Orientation,
    ) -> Result<DenoisedReadout, FbError> {
        let beauty = controller.get_readout(
            ReadoutSource::Channel(WellKnown::Beauty),
            orientation,
            None,
        )?;
        if !self.mode.is_enabled() {
            return Ok(DenoisedReadout {
                readout: beauty,
                outcome: None,
            });
        }

        let (albedo_name, normal_name) = controller.denoise_inputs();
        let albedo = if self.mode.wants_albedo() {
            guide(controller, &albedo_name, orientation)
        } else {
            None
        };
        let normal = if self.mode.wants_normal() {
            guide(controller, &normal_name, orientation)
        } else {
            None
        };

        let result = self.denoiser.process(DenoiseRequest {
            config: DenoiserConfig {
                engine: self.engine,
                width: beauty.width,
                height: beauty.height,
                use_albedo: albedo.is_some(),
                use_normal: normal.is_some(),
            },
            beauty: &beauty.data,
            albedo: albedo.as_ref().map(|r| r.data.as_slice()),
            normal: normal.as_ref().map(|r| r.data.as_slice()),
            latency_sec: controller.latency_sec(),
            frame_started: controller.status() == Some(FrameStatus::Started),
        });

        Ok(DenoisedReadout {
            readout: Readout {
                data: result.data,
                ..beauty
            },
            outcome: Some(result.outcome),
        })
    }
}

// Guides must be three-channel; anything else is ignored.
fn guide(controller: &FrameSessionController, name: &str, orientation: Orientation) -> Option<Readout> {
    if name.is_empty() {
        return None;
    }
    match controller.get_readout(ReadoutSource::AovName(name), orientation, None) {
        Ok(readout) if readout.num_chan == 3 => Some(readout),
        Ok(readout) => {
            tracing::debug!(aov = name, num_chan = readout.num_chan, "guide aov is not rgb");
            None
        }
        Err(err) => {
            tracing::debug!(aov = name, error = %err, "guide aov unavailable");
            None
        }
    }
}
