//! Optimizer(s) and learning rate scheduling

use rand::{Rng, rngs::ThreadRng};

use crate::{config::SchedulerConfig, device::JartV1bDevice, nn::AnalogParam};

/// Common interface for optimizers
/// Analogous to the torch.optim.Optimizer interface
/// <https://pytorch.org/docs/stable/optim.html#base-class>
pub trait Optim {
    /// Performs a single optimization step with accumulated gradients
    fn step(&mut self);
    /// Zeros gradients for all parameters
    fn zero_grad(&mut self);
    fn lr(&self) -> f32;
    fn set_lr(&mut self, lr: f32);
}

/// SGD which routes every parameter update through its device cell
///
/// The requested update `-lr * grad` is what an ideal digital optimizer would
/// apply; the device decides what actually lands on the weight (cycle to cycle
/// perturbation and window clamping).
pub struct AnalogSGD<R: Rng = ThreadRng> {
    params: Vec<AnalogParam>,
    device: JartV1bDevice,
    lr: f32,
    rng: R,
}

impl AnalogSGD<ThreadRng> {
    pub fn new(params: Vec<AnalogParam>, device: JartV1bDevice, lr: f32) -> Self {
        Self::with_rng(params, device, lr, rand::rng())
    }
}

impl<R: Rng> AnalogSGD<R> {
    /// Construction with an explicit rng, for deterministic tests
    pub fn with_rng(params: Vec<AnalogParam>, device: JartV1bDevice, lr: f32, rng: R) -> Self {
        Self {
            params,
            device,
            lr,
            rng,
        }
    }
}

impl<R: Rng> Optim for AnalogSGD<R> {
    fn step(&mut self) {
        for param in self.params.iter_mut() {
            let dw = -self.lr * param.value.grad();
            let updated =
                self.device
                    .apply_update(&param.cell, param.value.data(), dw, &mut self.rng);
            param.value.set_data(updated);
        }
    }

    fn zero_grad(&mut self) {
        for param in self.params.iter_mut() {
            param.value.zero_grad();
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

/// Multiplies the optimizer learning rate by `gamma` every `step_size` epochs
/// (torch.optim.lr_scheduler.StepLR)
pub struct StepLr {
    step_size: usize,
    gamma: f32,
    epochs_seen: usize,
}

impl StepLr {
    pub fn new(step_size: usize, gamma: f32) -> Self {
        Self {
            step_size,
            gamma,
            epochs_seen: 0,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.step_size, config.gamma)
    }

    /// Called once at the end of each epoch
    pub fn step(&mut self, optim: &mut impl Optim) {
        self.epochs_seen += 1;
        if self.step_size > 0 && self.epochs_seen % self.step_size == 0 {
            let lr = optim.lr() * self.gamma;
            log::debug!("learning rate decayed to {}", lr);
            optim.set_lr(lr);
        }
    }
}
