//! DDPG, TD3 and SAC agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`ddpg::Ddpg`] - deep deterministic policy gradient
//! * [`td3::Td3`] - twin delayed DDPG
//! * [`sac::Sac`] - soft actor-critic
//!
//! All agents implement [`deep_control_core::Agent`] and are trained with
//! [`deep_control_core::Trainer`] on either the uniform or the prioritized
//! replay buffer.
pub mod actor;
pub mod critic;
pub mod ddpg;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod sac;
pub mod td3;
mod tensor_batch;
pub mod util;
use anyhow::Result;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};
pub(crate) use tensor_batch::TensorBatch;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = anyhow::Error;

    fn try_from(device: Device) -> Result<Self> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}

/// Activation function applied to the output layer.
#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
pub enum Activation {
    /// Identity.
    None,

    /// Rectified linear unit.
    ReLU,

    /// Hyperbolic tangent, giving outputs in `(-1, 1)`.
    Tanh,
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::None => Ok(xs.clone()),
            Self::ReLU => Ok(xs.relu()?),
            Self::Tanh => Ok(xs.tanh()?),
        }
    }
}
