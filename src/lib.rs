//! Training experiments for neural networks whose weights are simulated
//! resistive memory devices, using a PyTorch-like API.
//!
//! The device non-idealities (device to device variation, cycle to cycle
//! variation, bounded conductance windows) are parameterized by a JART v1b
//! style model loaded from YAML configuration files.

pub mod backprop_fns;
pub mod config;
pub mod dataloader;
pub mod device;
pub mod loss;
pub mod mnist;
pub mod nn;
pub mod optim;
pub mod track;
pub mod train;
pub mod values;
