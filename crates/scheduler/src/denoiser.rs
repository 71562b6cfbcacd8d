use std::sync::Arc;

use receiverconfig::DenoiseEngine;

use crate::{AdaptiveDenoiseScheduler, Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenoiseError {
    #[error("denoiser unavailable: {0}")]
    Unavailable(String),
    #[error("denoise failed: {0}")]
    Failed(String),
}

/// Everything that forces a denoiser rebuild when it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenoiserConfig {
    pub engine: DenoiseEngine,
    pub width: u32,
    pub height: u32,
    pub use_albedo: bool,
    pub use_normal: bool,
}

/// External denoiser. Buffers are RGBA for beauty and RGB for the guides.
pub trait Denoiser: Send {
    fn image_width(&self) -> u32;
    fn image_height(&self) -> u32;
    fn denoise(
        &mut self,
        beauty: &[f32],
        albedo: Option<&[f32]>,
        normal: Option<&[f32]>,
    ) -> Result<Vec<f32>, DenoiseError>;
}

/// Builds denoisers. Construction is expensive; [`BeautyDenoiser`] caches the
/// result until the configuration changes.
pub trait DenoiserFactory: Send + Sync {
    fn create(&self, config: &DenoiserConfig) -> Result<Box<dyn Denoiser>, DenoiseError>;
}

impl<F> DenoiserFactory for F
where
    F: Fn(&DenoiserConfig) -> Result<Box<dyn Denoiser>, DenoiseError> + Send + Sync,
{
    fn create(&self, config: &DenoiserConfig) -> Result<Box<dyn Denoiser>, DenoiseError> {
        self(config)
    }
}

pub struct DenoiseRequest<'a> {
    pub config: DenoiserConfig,
    pub beauty: &'a [f32],
    pub albedo: Option<&'a [f32]>,
    pub normal: Option<&'a [f32]>,
    pub latency_sec: f32,
    /// First readout of a new frame.
    pub frame_started: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DenoiseOutcome {
    Denoised,
    /// The scheduler declined; the previous result was returned.
    Reused,
    /// The scheduler declined and no previous result fits the input; the
    /// input was passed through undenoised.
    Declined,
    /// New frame; the input was passed through and timing reset.
    SkippedFrameStart,
    /// The denoiser failed or could not be built; the input was passed through.
    Fallback(DenoiseError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenoiseResult {
    pub data: Vec<f32>,
    pub outcome: DenoiseOutcome,
}

/// Caches one denoiser and its last output, and consults the adaptive
/// scheduler before each run.
pub struct BeautyDenoiser {
    factory: Arc<dyn DenoiserFactory>,
    clock: Arc<dyn Clock>,
    active: Option<(DenoiserConfig, Box<dyn Denoiser>)>,
    scheduler: AdaptiveDenoiseScheduler,
    last_output: Vec<f32>,
    last_error: Option<String>,
}

impl BeautyDenoiser {
    pub fn new(factory: Arc<dyn DenoiserFactory>, history: usize) -> Self {
        Self::with_clock(factory, Arc::new(SystemClock), history)
    }

    pub fn with_clock(factory: Arc<dyn DenoiserFactory>, clock: Arc<dyn Clock>, history: usize) -> Self {
        Self {
            factory,
            clock,
            active: None,
            scheduler: AdaptiveDenoiseScheduler::new(history),
            last_output: Vec::new(),
            last_error: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.active.is_some()
    }

    pub fn scheduler(&self) -> &AdaptiveDenoiseScheduler {
        &self.scheduler
    }

    /// Returns the retained error message, clearing it.
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    fn setup(&mut self, config: DenoiserConfig) -> Result<(), DenoiseError> {
        if matches!(&self.active, Some((current, _)) if *current == config) {
            return Ok(());
        }
        self.active = None;
        self.last_output.clear();
        self.scheduler.reset();
        match self.factory.create(&config) {
            Ok(denoiser) => {
                tracing::info!(
                    engine = ?config.engine,
                    width = config.width,
                    height = config.height,
                    albedo = config.use_albedo,
                    normal = config.use_normal,
                    "denoiser ready"
                );
                self.active = Some((config, denoiser));
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(format!("{err} : fall back to non-denoised output"));
                tracing::warn!(error = %err, "denoiser setup failed");
                Err(err)
            }
        }
    }

    pub fn process(&mut self, request: DenoiseRequest<'_>) -> DenoiseResult {
        let passthrough = |outcome| DenoiseResult {
            data: request.beauty.to_vec(),
            outcome,
        };

        if let Err(err) = self.setup(request.config) {
            return passthrough(DenoiseOutcome::Fallback(err));
        }

        if request.frame_started {
            self.scheduler.reset();
            return passthrough(DenoiseOutcome::SkippedFrameStart);
        }

        self.scheduler.track_start(request.latency_sec, self.clock.now());
        if !self.scheduler.should_run_now(self.clock.now()) {
            self.scheduler.track_failed();
            if self.last_output.len() == request.beauty.len() {
                return DenoiseResult {
                    data: self.last_output.clone(),
                    outcome: DenoiseOutcome::Reused,
                };
            }
            return passthrough(DenoiseOutcome::Declined);
        }

        let Some((_, denoiser)) = self.active.as_mut() else {
            return passthrough(DenoiseOutcome::Fallback(DenoiseError::Unavailable(
                "no denoiser".into(),
            )));
        };
        match denoiser.denoise(request.beauty, request.albedo, request.normal) {
            Ok(output) => {
                self.scheduler.track_finish(self.clock.now());
                self.last_output = output.clone();
                DenoiseResult {
                    data: output,
                    outcome: DenoiseOutcome::Denoised,
                }
            }
            Err(err) => {
                self.scheduler.track_failed();
                tracing::warn!(error = %err, "denoise failed, using raw beauty");
                self.last_error = Some(err.to_string());
                passthrough(DenoiseOutcome::Fallback(err))
            }
        }
    }
}
