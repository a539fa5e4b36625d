use anyhow::Result;
use candle_core::{Device, Tensor};
use deep_control_core::replay_buffer::TransitionBatch;

/// A [`TransitionBatch`] moved to a device.
///
/// `reward`, `is_done` and `weight` have shape `[batch_size, 1]`, matching
/// the output of the critics.
pub struct TensorBatch {
    pub obs: Tensor,
    pub act: Tensor,
    pub next_obs: Tensor,
    pub reward: Tensor,
    pub is_done: Tensor,
    pub weight: Option<Tensor>,
    pub ix_sample: Option<Vec<usize>>,
}

impl TensorBatch {
    pub fn from_batch(batch: TransitionBatch, device: &Device) -> Result<Self> {
        let n = batch.len();
        let is_done = batch.is_done.iter().map(|&d| d as f32).collect::<Vec<_>>();
        let weight = match batch.weight {
            Some(w) => Some(Tensor::from_vec(w, (n, 1), device)?),
            None => None,
        };

        Ok(Self {
            obs: Tensor::from_vec(batch.obs, (n, batch.obs_dim), device)?,
            act: Tensor::from_vec(batch.act, (n, batch.act_dim), device)?,
            next_obs: Tensor::from_vec(batch.next_obs, (n, batch.obs_dim), device)?,
            reward: Tensor::from_vec(batch.reward, (n, 1), device)?,
            is_done: Tensor::from_vec(is_done, (n, 1), device)?,
            weight,
            ix_sample: batch.ix_sample,
        })
    }
}
