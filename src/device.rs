//! JART v1b resistive memory device model
//!
//! [`JartV1bDevice`] carries the full device parameterization, transcribed one to one
//! from the configuration file with no derived transformation. The parts the training
//! loop exercises are the conductance window (with device to device variation sampled
//! once per cell) and the cycle to cycle perturbation of programmed updates, driven by
//! the filament length (`ldisc`) noise terms. The remaining internal state parameters
//! (Ndiscmax, Ndiscmin, rdisc) are carried for the physics model they parameterize and
//! are reported with the run configuration snapshot.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::RunConfig;

/// Full JART v1b device parameter set
#[derive(Debug, Clone, Copy)]
pub struct JartV1bDevice {
    pub w_max: f32,
    pub w_min: f32,

    pub read_voltage: f32,
    pub pulse_voltage_set: f32,
    pub pulse_voltage_reset: f32,
    pub pulse_length: f32,
    pub base_time_step: f32,

    pub enable_w_max_w_min_bounds: bool,
    pub w_max_dtod: f32,
    pub w_max_dtod_upper_bound: f32,
    pub w_max_dtod_lower_bound: f32,
    pub w_min_dtod: f32,
    pub w_min_dtod_upper_bound: f32,
    pub w_min_dtod_lower_bound: f32,

    pub ndiscmax_dtod: f32,
    pub ndiscmax_dtod_upper_bound: f32,
    pub ndiscmax_dtod_lower_bound: f32,
    pub ndiscmax_std: f32,
    pub ndiscmax_ctoc_upper_bound: f32,
    pub ndiscmax_ctoc_lower_bound: f32,

    pub ndiscmin_dtod: f32,
    pub ndiscmin_dtod_upper_bound: f32,
    pub ndiscmin_dtod_lower_bound: f32,
    pub ndiscmin_std: f32,
    pub ndiscmin_ctoc_upper_bound: f32,
    pub ndiscmin_ctoc_lower_bound: f32,

    pub ldisc_dtod: f32,
    pub ldisc_dtod_upper_bound: f32,
    pub ldisc_dtod_lower_bound: f32,
    pub ldisc_std: f32,
    pub ldisc_std_slope: f32,
    pub ldisc_ctoc_upper_bound: f32,
    pub ldisc_ctoc_lower_bound: f32,

    pub rdisc_dtod: f32,
    pub rdisc_dtod_upper_bound: f32,
    pub rdisc_dtod_lower_bound: f32,
    pub rdisc_std: f32,
    pub rdisc_std_slope: f32,
    pub rdisc_ctoc_upper_bound: f32,
    pub rdisc_ctoc_lower_bound: f32,
}

impl JartV1bDevice {
    /// Transcribes the configuration's device and noise keys, unchanged
    pub fn from_config(config: &RunConfig) -> Self {
        let pulse = &config.pulse_related;
        let noise = &config.noise;
        Self {
            w_max: config.w_max,
            w_min: config.w_min,

            read_voltage: pulse.read_voltage,
            pulse_voltage_set: pulse.pulse_voltage_set,
            pulse_voltage_reset: pulse.pulse_voltage_reset,
            pulse_length: pulse.pulse_length,
            base_time_step: pulse.base_time_step,

            enable_w_max_w_min_bounds: noise.enable_w_max_w_min_bounds,
            w_max_dtod: noise.w_max.device_to_device,
            w_max_dtod_upper_bound: noise.w_max.dtod_upper_bound,
            w_max_dtod_lower_bound: noise.w_max.dtod_lower_bound,
            w_min_dtod: noise.w_min.device_to_device,
            w_min_dtod_upper_bound: noise.w_min.dtod_upper_bound,
            w_min_dtod_lower_bound: noise.w_min.dtod_lower_bound,

            ndiscmax_dtod: noise.ndiscmax.device_to_device,
            ndiscmax_dtod_upper_bound: noise.ndiscmax.dtod_upper_bound,
            ndiscmax_dtod_lower_bound: noise.ndiscmax.dtod_lower_bound,
            ndiscmax_std: noise.ndiscmax.cycle_to_cycle_direct,
            ndiscmax_ctoc_upper_bound: noise.ndiscmax.ctoc_upper_bound,
            ndiscmax_ctoc_lower_bound: noise.ndiscmax.ctoc_lower_bound,

            ndiscmin_dtod: noise.ndiscmin.device_to_device,
            ndiscmin_dtod_upper_bound: noise.ndiscmin.dtod_upper_bound,
            ndiscmin_dtod_lower_bound: noise.ndiscmin.dtod_lower_bound,
            ndiscmin_std: noise.ndiscmin.cycle_to_cycle_direct,
            ndiscmin_ctoc_upper_bound: noise.ndiscmin.ctoc_upper_bound,
            ndiscmin_ctoc_lower_bound: noise.ndiscmin.ctoc_lower_bound,

            ldisc_dtod: noise.ldisc.device_to_device,
            ldisc_dtod_upper_bound: noise.ldisc.dtod_upper_bound,
            ldisc_dtod_lower_bound: noise.ldisc.dtod_lower_bound,
            ldisc_std: noise.ldisc.cycle_to_cycle_direct,
            ldisc_std_slope: noise.ldisc.cycle_to_cycle_slope,
            ldisc_ctoc_upper_bound: noise.ldisc.ctoc_upper_bound,
            ldisc_ctoc_lower_bound: noise.ldisc.ctoc_lower_bound,

            rdisc_dtod: noise.rdisc.device_to_device,
            rdisc_dtod_upper_bound: noise.rdisc.dtod_upper_bound,
            rdisc_dtod_lower_bound: noise.rdisc.dtod_lower_bound,
            rdisc_std: noise.rdisc.cycle_to_cycle_direct,
            rdisc_std_slope: noise.rdisc.cycle_to_cycle_slope,
            rdisc_ctoc_upper_bound: noise.rdisc.ctoc_upper_bound,
            rdisc_ctoc_lower_bound: noise.rdisc.ctoc_lower_bound,
        }
    }

    /// Samples one cell's conductance window with device to device variation
    ///
    /// Called once per weight at layer construction; the window stays fixed for
    /// the lifetime of the cell, as programmed bounds do on real hardware.
    pub fn sample_cell<R: Rng>(&self, rng: &mut R) -> DeviceCell {
        let w_max = sample_dtod(
            self.w_max,
            self.w_max_dtod,
            self.w_max_dtod_lower_bound,
            self.w_max_dtod_upper_bound,
            rng,
        );
        let w_min = sample_dtod(
            self.w_min,
            self.w_min_dtod,
            self.w_min_dtod_lower_bound,
            self.w_min_dtod_upper_bound,
            rng,
        );
        DeviceCell { w_min, w_max }
    }

    /// Applies one programmed update to a weight through the cycle to cycle model
    ///
    /// The update is scaled by a gaussian multiplier with std
    /// `ldisc_std + ldisc_std_slope * |dw|`, clamped into the ldisc ctoc bounds,
    /// then the weight is clamped into the cell's window when bounds are enabled.
    pub fn apply_update<R: Rng>(&self, cell: &DeviceCell, weight: f32, dw: f32, rng: &mut R) -> f32 {
        let std = self.ldisc_std + self.ldisc_std_slope * dw.abs();
        let multiplier = if std > 0.0 {
            let normal = Normal::new(1.0, std).expect("finite ctoc std");
            normal
                .sample(rng)
                .clamp(self.ldisc_ctoc_lower_bound, self.ldisc_ctoc_upper_bound)
        } else {
            1.0
        };
        let mut updated = weight + dw * multiplier;
        if self.enable_w_max_w_min_bounds {
            updated = updated.clamp(cell.w_min, cell.w_max);
        }
        updated
    }
}

/// Per weight programmed state: the conductance window this cell can represent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceCell {
    pub w_min: f32,
    pub w_max: f32,
}

/// Samples a nominal value with relative device to device spread, clamped to
/// the configured relative bounds
fn sample_dtod<R: Rng>(nominal: f32, dtod: f32, lower: f32, upper: f32, rng: &mut R) -> f32 {
    if dtod <= 0.0 {
        return nominal;
    }
    let normal = Normal::new(nominal, nominal.abs() * dtod).expect("finite dtod std");
    let sampled = normal.sample(rng);
    // bounds are relative multipliers of the nominal; for negative nominals the
    // products swap order
    let b1 = nominal * lower;
    let b2 = nominal * upper;
    sampled.clamp(b1.min(b2), b1.max(b2))
}
