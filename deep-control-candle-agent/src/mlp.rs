//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
use crate::Activation;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
pub use config::MlpConfig;
pub use mlp2::Mlp2;

fn mlp_forward(xs: Tensor, layers: &[Linear], final_act: &Activation) -> Result<Tensor> {
    let (last, hidden) = match layers.split_last() {
        Some(v) => v,
        None => return Ok(xs),
    };
    let mut xs = xs;

    for layer in hidden.iter() {
        xs = layer.forward(&xs)?.relu()?;
    }

    let xs = last.forward(&xs)?;
    final_act.forward(&xs)
}
