use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub use fbcore::ResetMode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenoiseEngine {
    Optix,
    #[default]
    OpenImageDenoise,
}

/// Which guide buffers, if any, accompany the beauty input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenoiseMode {
    #[default]
    Disable,
    Enable,
    EnableAlbedo,
    EnableNormal,
    EnableAlbedoNormal,
}

impl DenoiseMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disable)
    }

    pub fn wants_albedo(&self) -> bool {
        matches!(self, Self::EnableAlbedo | Self::EnableAlbedoNormal)
    }

    pub fn wants_normal(&self) -> bool {
        matches!(self, Self::EnableNormal | Self::EnableAlbedoNormal)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiverConfig {
    pub version: u32,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub denoise: DenoiseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub reset_mode: ResetMode,
    #[serde(default = "default_parallel_decode")]
    pub parallel_decode: bool,
    /// Decode pool size; 0 uses the available hardware concurrency.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(
        default = "default_fps_window",
        deserialize_with = "deserialize_duration"
    )]
    pub fps_window: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DenoiseConfig {
    #[serde(default)]
    pub engine: DenoiseEngine,
    #[serde(default)]
    pub mode: DenoiseMode,
    /// Capacity of the latency and cost rolling windows.
    #[serde(default = "default_history")]
    pub history: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            version: 1,
            session: SessionConfig::default(),
            denoise: DenoiseConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reset_mode: ResetMode::default(),
            parallel_decode: default_parallel_decode(),
            worker_threads: 0,
            fps_window: default_fps_window(),
        }
    }
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            engine: DenoiseEngine::default(),
            mode: DenoiseMode::default(),
            history: default_history(),
        }
    }
}

fn default_parallel_decode() -> bool {
    true
}

fn default_fps_window() -> Duration {
    Duration::from_secs(3)
}

fn default_history() -> usize {
    10
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl ReceiverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ReceiverConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.session.fps_window.is_zero() {
            return Err(ConfigError::Invalid(
                "session.fps_window must be greater than zero".into(),
            ));
        }

        if self.denoise.history == 0 {
            return Err(ConfigError::Invalid(
                "denoise.history must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
