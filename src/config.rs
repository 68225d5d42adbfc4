//! Experiment configuration loaded from YAML
//!
//! Field names mirror the configuration files shared across experiments, so the same
//! YAML drives both the single layer and the MNIST binaries. The device noise section
//! is transcribed verbatim into [`crate::device::JartV1bDevice`].

use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

/// Errors for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}'")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file '{path}'")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

fn default_repeat_times() -> usize {
    1
}

/// Top level experiment configuration
///
/// Unknown keys are rejected so that a typoed noise parameter fails at load
/// instead of silently training noise free.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub project_name: String,
    #[serde(rename = "USE_CUDA")]
    pub use_cuda: bool,
    #[serde(rename = "USE_wandb")]
    pub use_tracking: bool,
    #[serde(rename = "USE_0_initialization")]
    pub use_zero_initialization: bool,
    #[serde(rename = "USE_bias")]
    pub use_bias: bool,
    /// How many times the whole experiment reruns, one tracked run each
    #[serde(rename = "Repeat_Times", default = "default_repeat_times")]
    pub repeat_times: usize,
    pub w_max: f32,
    pub w_min: f32,
    pub learning_rate: f32,
    pub epochs: usize,
    /// Mini batch size, required by the MNIST experiment only
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Learning rate decay, used by the MNIST experiment only
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    pub pulse_related: PulseConfig,
    pub noise: NoiseConfig,
}

impl RunConfig {
    /// Loads and parses a YAML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }
}

/// Learning rate scheduler parameters (StepLR style decay)
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    pub step_size: usize,
    pub gamma: f32,
}

/// Programming pulse parameters, carried into the device model unchanged
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PulseConfig {
    pub read_voltage: f32,
    #[serde(rename = "pulse_voltage_SET")]
    pub pulse_voltage_set: f32,
    #[serde(rename = "pulse_voltage_RESET")]
    pub pulse_voltage_reset: f32,
    pub pulse_length: f32,
    pub base_time_step: f32,
}

/// Noise section: one sub-mapping per physical device parameter
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseConfig {
    pub enable_w_max_w_min_bounds: bool,
    pub w_max: DtodNoise,
    pub w_min: DtodNoise,
    #[serde(rename = "Ndiscmax")]
    pub ndiscmax: StateNoise,
    #[serde(rename = "Ndiscmin")]
    pub ndiscmin: StateNoise,
    pub ldisc: SlopedStateNoise,
    pub rdisc: SlopedStateNoise,
}

/// Device to device variation of a programmed bound
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DtodNoise {
    pub device_to_device: f32,
    pub dtod_upper_bound: f32,
    pub dtod_lower_bound: f32,
}

/// Device to device and cycle to cycle variation of an internal state variable
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateNoise {
    pub device_to_device: f32,
    pub dtod_upper_bound: f32,
    pub dtod_lower_bound: f32,
    pub cycle_to_cycle_direct: f32,
    pub ctoc_upper_bound: f32,
    pub ctoc_lower_bound: f32,
}

/// [`StateNoise`] plus a slope term scaling the cycle to cycle std with update size
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlopedStateNoise {
    pub device_to_device: f32,
    pub dtod_upper_bound: f32,
    pub dtod_lower_bound: f32,
    pub cycle_to_cycle_direct: f32,
    pub cycle_to_cycle_slope: f32,
    pub ctoc_upper_bound: f32,
    pub ctoc_lower_bound: f32,
}

/// Derives the tracking job label from the configuration file name
///
/// A name with a single extension maps to its stem (`noise_free.yml` -> `noise_free`),
/// anything else is used as-is.
pub fn job_type(config_file: &str) -> String {
    let name = Path::new(config_file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(config_file);
    let split: Vec<&str> = name.split('.').collect();
    if split.len() == 2 {
        split[0].to_string()
    } else {
        name.to_string()
    }
}
