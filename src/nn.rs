//! Components to build an analog neural network
//!
//! Layers follow a torch-like [`Module`] trait, with the difference that every
//! parameter of an [`AnalogLinear`] is backed by a [`DeviceCell`] sampled from
//! the layer's [`JartV1bDevice`].

use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

use crate::{
    device::{DeviceCell, JartV1bDevice},
    values::Value,
};

/// Errors for the neural network
#[derive(Debug, Error)]
pub enum NNError {
    #[error("Input size mismatch")]
    InputSizeMismatch { expected: usize, got: usize },
    #[error("Weight shape mismatch")]
    WeightShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
}

/// Represents the torch.nn.Module. NNs should implement this trait.
/// <https://github.com/pytorch/pytorch/blob/v2.6.0/torch/nn/modules/module.py#L402>
pub trait Module {
    fn zero_grad(&mut self) {
        for p in self.parameters().iter_mut() {
            p.zero_grad();
        }
    }

    fn parameters(&self) -> Vec<Value>;
    fn forward(&self, inputs: &[Value]) -> Result<Vec<Value>, NNError>;
}

/// A trainable parameter paired with the device cell that stores it
#[derive(Debug, Clone)]
pub struct AnalogParam {
    pub value: Value,
    pub cell: DeviceCell,
}

/// A single output unit of an analog layer
///
/// Each weight (and the bias, when present) lives on its own simulated device.
pub struct AnalogNeuron {
    weights: Vec<AnalogParam>,
    bias: Option<AnalogParam>,
}

impl AnalogNeuron {
    fn new<R: Rng>(n_inputs: usize, bias: bool, device: &JartV1bDevice, rng: &mut R) -> Self {
        // Xavier initialization, the networks here are sigmoid MLPs where He
        // initialization would saturate the activations
        let std = (1.0 / n_inputs as f32).sqrt();
        let normal = Normal::new(0.0, std).expect("finite init std");
        let mut sample_param = |rng: &mut R| {
            let cell = device.sample_cell(rng);
            let mut init = normal.sample(rng);
            if device.enable_w_max_w_min_bounds {
                init = init.clamp(cell.w_min, cell.w_max);
            }
            AnalogParam {
                value: Value::new(init),
                cell,
            }
        };
        let weights = (0..n_inputs).map(|_| sample_param(rng)).collect();
        let bias = bias.then(|| sample_param(rng));
        Self { weights, bias }
    }

    fn forward(&self, inputs: &[Value]) -> Result<Value, NNError> {
        if inputs.len() != self.weights.len() {
            return Err(NNError::InputSizeMismatch {
                expected: self.weights.len(),
                got: inputs.len(),
            });
        }
        let output = self
            .weights
            .iter()
            .zip(inputs.iter())
            .map(|(w, i)| &w.value * i)
            .sum::<Value>();
        match &self.bias {
            Some(b) => Ok(&output + &b.value),
            None => Ok(output),
        }
    }
}

/// A fully connected layer whose weights are simulated resistive memory cells
pub struct AnalogLinear {
    neurons: Vec<AnalogNeuron>,
    n_inputs: usize,
}

impl AnalogLinear {
    /// Creates a new layer; samples one device cell per parameter
    pub fn new<R: Rng>(
        n_inputs: usize,
        n_outputs: usize,
        bias: bool,
        device: &JartV1bDevice,
        rng: &mut R,
    ) -> Self {
        let neurons = (0..n_outputs)
            .map(|_| AnalogNeuron::new(n_inputs, bias, device, rng))
            .collect();
        Self { neurons, n_inputs }
    }

    /// Returns the weight matrix and per-neuron biases (empty when bias-free)
    pub fn get_weights(&self) -> (Vec<Vec<f32>>, Vec<f32>) {
        let weights = self
            .neurons
            .iter()
            .map(|n| n.weights.iter().map(|w| w.value.data()).collect())
            .collect();
        let bias = self
            .neurons
            .iter()
            .filter_map(|n| n.bias.as_ref().map(|b| b.value.data()))
            .collect();
        (weights, bias)
    }

    /// Overwrites the weight matrix, and the biases when `bias` is given
    ///
    /// Passing `bias: None` on a layer that has biases leaves them untouched.
    pub fn set_weights(
        &mut self,
        weights: &[Vec<f32>],
        bias: Option<&[f32]>,
    ) -> Result<(), NNError> {
        let expected = (self.neurons.len(), self.n_inputs);
        let got = (weights.len(), weights.first().map_or(0, |w| w.len()));
        if got != expected {
            return Err(NNError::WeightShapeMismatch { expected, got });
        }
        for (neuron, row) in self.neurons.iter_mut().zip(weights.iter()) {
            for (param, w) in neuron.weights.iter_mut().zip(row.iter()) {
                param.value.set_data(*w);
            }
        }
        if let Some(bias) = bias {
            for (neuron, b) in self.neurons.iter_mut().zip(bias.iter()) {
                if let Some(param) = neuron.bias.as_mut() {
                    param.value.set_data(*b);
                }
            }
        }
        Ok(())
    }

    /// Returns (n_outputs, n_inputs)
    pub fn shape(&self) -> (usize, usize) {
        (self.neurons.len(), self.n_inputs)
    }

    /// Resets all weights to zero; the biases too when `zero_bias` is set
    pub fn zero_initialize(&mut self, zero_bias: bool) -> Result<(), NNError> {
        let (n_outputs, n_inputs) = self.shape();
        let weights = vec![vec![0.0; n_inputs]; n_outputs];
        let bias = vec![0.0; n_outputs];
        self.set_weights(&weights, zero_bias.then_some(bias.as_slice()))
    }

    /// Returns all parameters with their device cells, for the analog optimizer
    pub fn analog_parameters(&self) -> Vec<AnalogParam> {
        self.neurons
            .iter()
            .flat_map(|n| n.weights.iter().chain(n.bias.as_ref()).cloned())
            .collect()
    }
}

impl Module for AnalogLinear {
    fn parameters(&self) -> Vec<Value> {
        self.analog_parameters()
            .into_iter()
            .map(|p| p.value)
            .collect()
    }

    fn forward(&self, inputs: &[Value]) -> Result<Vec<Value>, NNError> {
        self.neurons.iter().map(|n| n.forward(inputs)).collect()
    }
}

/// Applies the logistic sigmoid element-wise
#[derive(Default)]
pub struct Sigmoid {}

impl Sigmoid {
    pub fn new() -> Self {
        Self {}
    }

    pub fn forward(&self, inputs: &[Value]) -> Vec<Value> {
        inputs.iter().map(|v| v.sigmoid()).collect()
    }
}

/// Applies log-softmax to a set of values
#[derive(Default)]
pub struct LogSoftmax {}

impl LogSoftmax {
    pub fn new() -> Self {
        Self {}
    }

    pub fn forward(&self, inputs: &[Value]) -> Vec<Value> {
        // shift by the max (treated as a constant) so exp cannot overflow
        let max = inputs
            .iter()
            .map(|v| v.data())
            .fold(f32::NEG_INFINITY, f32::max);
        let max = Value::new(max);
        let shifted: Vec<Value> = inputs.iter().map(|v| v - &max).collect();
        let exp_sum = shifted.iter().map(|v| v.exp()).sum::<Value>();
        let log_sum = exp_sum.ln();
        shifted.iter().map(|v| v - &log_sum).collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    use super::*;
    use crate::assert_eq_float;

    fn test_device() -> JartV1bDevice {
        let config: crate::config::RunConfig =
            serde_yaml::from_str(crate::config::tests::SAMPLE_YAML).unwrap();
        JartV1bDevice::from_config(&config)
    }

    fn layer_with_ones(n_inputs: usize, n_outputs: usize, bias: bool) -> AnalogLinear {
        let device = test_device();
        let mut rng = Pcg64Mcg::seed_from_u64(42);
        let mut layer = AnalogLinear::new(n_inputs, n_outputs, bias, &device, &mut rng);
        let weights = vec![vec![1.0; n_inputs]; n_outputs];
        let biases = vec![1.0; n_outputs];
        layer
            .set_weights(&weights, bias.then_some(biases.as_slice()))
            .unwrap();
        layer
    }

    #[test]
    fn test_layer_forward() {
        let layer = layer_with_ones(2, 3, true);
        let inputs = vec![Value::new(1.0), Value::new(2.0)];
        let outputs = layer.forward(&inputs).unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].data(), 4.0);
        assert_eq!(outputs[1].data(), 4.0);
        assert_eq!(outputs[2].data(), 4.0);
    }

    #[test]
    fn test_layer_forward_no_bias() {
        let layer = layer_with_ones(2, 3, false);
        let inputs = vec![Value::new(1.0), Value::new(2.0)];
        let outputs = layer.forward(&inputs).unwrap();
        assert_eq!(outputs[0].data(), 3.0);
    }

    #[test]
    fn test_dim_mismatch() {
        let layer = layer_with_ones(2, 3, true);
        let inputs = vec![Value::new(1.0)];
        let outputs = layer.forward(&inputs).unwrap_err();
        assert!(matches!(
            outputs,
            NNError::InputSizeMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_parameter_count() {
        let layer = layer_with_ones(4, 2, true);
        assert_eq!(layer.parameters().len(), 4 * 2 + 2);
        let layer = layer_with_ones(4, 2, false);
        assert_eq!(layer.parameters().len(), 4 * 2);
    }

    #[test]
    fn test_zero_weights_leave_bias_untouched() {
        let mut layer = layer_with_ones(2, 2, true);
        let zeros = vec![vec![0.0; 2]; 2];
        layer.set_weights(&zeros, None).unwrap();
        let (weights, bias) = layer.get_weights();
        assert!(weights.iter().flatten().all(|w| *w == 0.0));
        assert!(bias.iter().all(|b| *b == 1.0));
    }

    #[test]
    fn test_set_weights_shape_mismatch() {
        let mut layer = layer_with_ones(2, 2, true);
        let bad = vec![vec![0.0; 3]; 2];
        let err = layer.set_weights(&bad, None).unwrap_err();
        assert!(matches!(err, NNError::WeightShapeMismatch { .. }));
    }

    #[test]
    fn test_initial_weights_within_window() {
        let mut device = test_device();
        device.enable_w_max_w_min_bounds = true;
        let mut rng = Pcg64Mcg::seed_from_u64(42);
        let layer = AnalogLinear::new(8, 8, true, &device, &mut rng);
        for param in layer.analog_parameters() {
            assert!(param.value.data() >= param.cell.w_min);
            assert!(param.value.data() <= param.cell.w_max);
        }
    }

    #[test]
    fn test_log_softmax() {
        let log_softmax = LogSoftmax::new();
        let inputs = vec![Value::new(1.0), Value::new(2.0)];
        let outputs = log_softmax.forward(&inputs);
        assert_eq!(outputs.len(), 2);
        // matches softmax probabilities after exponentiation
        assert_eq_float!(outputs[0].data().exp(), 0.2689414);
        assert_eq_float!(outputs[1].data().exp(), 0.7310585);
    }

    #[test]
    fn test_log_softmax_large_inputs_stable() {
        let log_softmax = LogSoftmax::new();
        let inputs = vec![Value::new(1000.0), Value::new(1000.0)];
        let outputs = log_softmax.forward(&inputs);
        assert_eq_float!(outputs[0].data(), 0.5f32.ln());
        assert_eq_float!(outputs[1].data(), 0.5f32.ln());
    }

    #[test]
    fn test_log_softmax_gradient() {
        let log_softmax = LogSoftmax::new();
        let inputs = vec![Value::new(1.0), Value::new(2.0)];
        let outputs = log_softmax.forward(&inputs);

        // d log_softmax_0 / d x_0 = 1 - softmax(x_0)
        // d log_softmax_0 / d x_1 = -softmax(x_1)
        outputs[0].backward();
        let s0 = outputs[0].data().exp();
        let s1 = outputs[1].data().exp();
        assert_eq_float!(inputs[0].grad(), 1.0 - s0);
        assert_eq_float!(inputs[1].grad(), -s1);
    }
}
