//! Experiment runners
//!
//! Two experiments share the configuration format: a single analog layer learning a
//! fixed 4 -> 2 regression target, and a fully connected MNIST classifier. Both build
//! their layers on a [`JartV1bDevice`] transcribed from the configuration, train with
//! [`AnalogSGD`], and report per-epoch losses to the log and, optionally, a
//! [`RunTracker`].

use std::cmp::Ordering;

use rand::Rng;
use thiserror::Error;

use crate::{
    config::RunConfig,
    dataloader::{DataLoader, DataLoaderError},
    device::JartV1bDevice,
    loss::{MSELoss, NLLLoss},
    nn::{AnalogLinear, AnalogParam, LogSoftmax, Module, NNError, Sigmoid},
    optim::{AnalogSGD, Optim, StepLr},
    track::{RunTracker, TrackError},
    values::Value,
};

// Network definition for the MNIST experiment
const INPUT_SIZE: usize = 784;
const HIDDEN_SIZES: [usize; 2] = [256, 128];
const OUTPUT_SIZE: usize = 10;

/// Errors for the experiment runners
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Nn(#[from] NNError),
    #[error(transparent)]
    Data(#[from] DataLoaderError),
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error("The MNIST experiment requires 'batch_size' in the configuration")]
    MissingBatchSize,
    #[error("The MNIST experiment requires 'scheduler' in the configuration")]
    MissingScheduler,
}

/// Logs a warning when the configuration asks for an accelerator
///
/// This build has no accelerator backend; execution always stays on the CPU.
pub fn check_accelerator(config: &RunConfig) {
    if config.use_cuda {
        log::warn!("USE_CUDA is set but no accelerator backend is compiled in, running on CPU");
    }
}

/// Builds the single layer model: a 4 -> 2 analog layer with bias
///
/// With zero initialization enabled, the weights are zeroed; the bias is zeroed
/// only when `USE_bias` is also set.
pub fn build_simple_layer<R: Rng>(
    config: &RunConfig,
    device: &JartV1bDevice,
    rng: &mut R,
) -> Result<AnalogLinear, TrainError> {
    let mut layer = AnalogLinear::new(4, 2, true, device, rng);
    if config.use_zero_initialization {
        layer.zero_initialize(config.use_bias)?;
    }
    Ok(layer)
}

/// The single layer experiment: learn to map two fixed input rows to their targets
///
/// Runs exactly `epochs` iterations of forward, MSE loss, backward, optimizer step.
/// Returns the per-epoch losses.
pub fn train_simple<R: Rng + Clone>(
    config: &RunConfig,
    mut tracker: Option<&mut RunTracker>,
    rng: &mut R,
) -> Result<Vec<f32>, TrainError> {
    check_accelerator(config);

    // the dataset: inputs and expected outputs
    let x = [[0.1, 0.2, 0.4, 0.3], [0.2, 0.1, 0.1, 0.3]];
    let y = [[1.0, 0.5], [0.7, 0.3]];
    let x: Vec<Vec<Value>> = x
        .iter()
        .map(|row| row.iter().map(|v| Value::new(*v)).collect())
        .collect();
    let y: Vec<Vec<Value>> = y
        .iter()
        .map(|row| row.iter().map(|v| Value::new(*v)).collect())
        .collect();

    let device = JartV1bDevice::from_config(config);
    let model = build_simple_layer(config, &device, rng)?;
    let mut optim = AnalogSGD::with_rng(
        model.analog_parameters(),
        device,
        config.learning_rate,
        rng.clone(),
    );

    let mut losses = Vec::with_capacity(config.epochs);
    for epoch in 0..config.epochs {
        let per_row: Vec<Value> = x
            .iter()
            .zip(y.iter())
            .map(|(row, target)| -> Result<Value, NNError> {
                let pred = model.forward(row)?;
                Ok(MSELoss::call(&pred, target))
            })
            .collect::<Result<_, NNError>>()?;
        let loss = per_row.iter().cloned().sum::<Value>() / Value::new(per_row.len() as f32);

        log::info!("Epoch {} - Loss: {:.16}", epoch + 1, loss.data());
        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.log_epoch(epoch + 1, loss.data())?;
        }

        loss.backward();
        optim.step();
        optim.zero_grad();
        losses.push(loss.data());
    }
    Ok(losses)
}

/// The fully connected MNIST network: 784-256-128-10, sigmoid activations,
/// log-softmax output, every linear layer analog
pub struct MnistMlp {
    l1: AnalogLinear,
    s1: Sigmoid,
    l2: AnalogLinear,
    s2: Sigmoid,
    l3: AnalogLinear,
    log_softmax: LogSoftmax,
}

impl MnistMlp {
    pub fn new<R: Rng>(device: &JartV1bDevice, bias: bool, rng: &mut R) -> Self {
        Self::with_sizes(INPUT_SIZE, HIDDEN_SIZES, OUTPUT_SIZE, device, bias, rng)
    }

    /// Same topology with custom layer sizes, used by the tests to keep the
    /// scalar graph small
    pub fn with_sizes<R: Rng>(
        input_size: usize,
        hidden_sizes: [usize; 2],
        output_size: usize,
        device: &JartV1bDevice,
        bias: bool,
        rng: &mut R,
    ) -> Self {
        Self {
            l1: AnalogLinear::new(input_size, hidden_sizes[0], bias, device, rng),
            s1: Sigmoid::new(),
            l2: AnalogLinear::new(hidden_sizes[0], hidden_sizes[1], bias, device, rng),
            s2: Sigmoid::new(),
            l3: AnalogLinear::new(hidden_sizes[1], output_size, bias, device, rng),
            log_softmax: LogSoftmax::new(),
        }
    }

    /// Zeroes the weights of every analog layer; biases too when `zero_bias` is set
    pub fn zero_initialize(&mut self, zero_bias: bool) -> Result<(), NNError> {
        self.l1.zero_initialize(zero_bias)?;
        self.l2.zero_initialize(zero_bias)?;
        self.l3.zero_initialize(zero_bias)
    }

    pub fn analog_parameters(&self) -> Vec<AnalogParam> {
        self.l1
            .analog_parameters()
            .into_iter()
            .chain(self.l2.analog_parameters())
            .chain(self.l3.analog_parameters())
            .collect()
    }
}

impl Module for MnistMlp {
    fn forward(&self, inputs: &[Value]) -> Result<Vec<Value>, NNError> {
        let out = self.l1.forward(inputs)?;
        let out = self.s1.forward(&out);
        let out = self.l2.forward(&out)?;
        let out = self.s2.forward(&out);
        let out = self.l3.forward(&out)?;
        Ok(self.log_softmax.forward(&out))
    }

    fn parameters(&self) -> Vec<Value> {
        self.analog_parameters()
            .into_iter()
            .map(|p| p.value)
            .collect()
    }
}

/// Builds the MNIST model, applying zero initialization when configured
pub fn build_mnist_model<R: Rng>(
    config: &RunConfig,
    device: &JartV1bDevice,
    rng: &mut R,
) -> Result<MnistMlp, TrainError> {
    let mut model = MnistMlp::new(device, config.use_bias, rng);
    if config.use_zero_initialization {
        model.zero_initialize(config.use_bias)?;
    }
    Ok(model)
}

/// Trains the MNIST model for exactly `epochs` passes over the training loader
///
/// Mini-batch NLL loss, one optimizer step per batch, learning rate decayed by
/// the configured scheduler at the end of each epoch. Returns the per-epoch mean
/// training losses.
pub fn train_mnist<R: Rng + Clone>(
    config: &RunConfig,
    model: &MnistMlp,
    train_loader: &DataLoader,
    mut tracker: Option<&mut RunTracker>,
    rng: &mut R,
) -> Result<Vec<f32>, TrainError> {
    let scheduler_config = config.scheduler.ok_or(TrainError::MissingScheduler)?;
    let device = JartV1bDevice::from_config(config);
    let mut optim = AnalogSGD::with_rng(
        model.analog_parameters(),
        device,
        config.learning_rate,
        rng.clone(),
    );
    let mut scheduler = StepLr::from_config(&scheduler_config);

    let mut losses = Vec::with_capacity(config.epochs);
    for epoch in 0..config.epochs {
        let mut total_loss = 0.0;
        for (batch_data, batch_labels) in train_loader.iter() {
            let per_sample: Vec<Value> = batch_data
                .iter()
                .zip(batch_labels.iter())
                .map(|(sample, label)| -> Result<Value, NNError> {
                    let log_probs = model.forward(sample)?;
                    Ok(NLLLoss::call(&log_probs, *label as usize))
                })
                .collect::<Result<_, NNError>>()?;
            let loss =
                per_sample.iter().cloned().sum::<Value>() / Value::new(per_sample.len() as f32);

            loss.backward();
            optim.step();
            optim.zero_grad();
            total_loss += loss.data();
        }

        let training_loss = total_loss / train_loader.n_batches() as f32;
        log::info!("Epoch {} - Training loss: {:.16}", epoch, training_loss);
        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.log_epoch(epoch, training_loss)?;
        }
        losses.push(training_loss);

        // Decay learning rate if needed.
        scheduler.step(&mut optim);
    }
    Ok(losses)
}

/// Evaluates classification accuracy over a held-out loader
pub fn evaluate(model: &dyn Module, val_loader: &DataLoader) -> Result<f64, TrainError> {
    let mut predicted_ok = 0;
    let mut total_images = 0;

    for (batch_data, batch_labels) in val_loader.iter() {
        for (sample, label) in batch_data.iter().zip(batch_labels.iter()) {
            let output = model.forward(sample)?;
            if argmax(&output) == *label as usize {
                predicted_ok += 1;
            }
            total_images += 1;
        }
    }
    Ok(accuracy(predicted_ok, total_images))
}

/// Fraction of correct predictions, 0.0 when there were no predictions
pub fn accuracy(predicted_ok: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    predicted_ok as f64 / total as f64
}

/// Returns the index of the largest output
fn argmax(values: &[Value]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.data().partial_cmp(&b.data()).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
