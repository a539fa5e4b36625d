use super::DdpgConfig;
use crate::{
    actor::Actor,
    critic::Critic,
    model::{SubModel1, SubModel2},
    util::{hard_update, to_scalar, track, OutDim},
    TensorBatch,
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use deep_control_core::{
    record::{Record, RecordValue},
    replay_buffer::TransitionBatch,
    Agent, Configurable, Env, Policy, ReplayBufferBase,
};
use log::trace;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, marker::PhantomData, path::Path};

/// Offset added to absolute TD errors to give priorities.
const PRIORITY_OFFSET: f32 = 1e-5;

/// Returns the priorities `|td_error| + 1e-5` of a batch.
pub(crate) fn priorities_from_td_errors(td_error: &Tensor) -> Result<Vec<f32>> {
    Ok((td_error.abs()? + PRIORITY_OFFSET as f64)?
        .flatten_all()?
        .to_vec1::<f32>()?)
}

/// Returns `mean(w * 0.5 * td_error^2)`, with `w = 1` if no weight is given.
pub(crate) fn weighted_critic_loss(td_error: &Tensor, weight: &Option<Tensor>) -> Result<Tensor> {
    let sq = (td_error.sqr()? * 0.5)?;
    match weight {
        Some(w) => Ok((w * sq)?.mean_all()?),
        None => Ok(sq.mean_all()?),
    }
}

/// Runs the actor on a single observation and returns the action.
pub(crate) fn act<P>(actor: &Actor<P>, obs: &[f32], device: &Device) -> Result<Vec<f32>>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    let obs = Tensor::from_slice(obs, (1, obs.len()), device)?;
    let a = actor.forward(&obs)?.detach();
    Ok(a.flatten_all()?.to_vec1::<f32>()?)
}

/// Deep deterministic policy gradient (DDPG) agent.
///
/// The agent owns the actor, the critic and their target networks. The
/// targets are independent copies, initialized with the parameters of the
/// online networks and then moved towards them by soft updates after every
/// optimization step.
pub struct Ddpg<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    actor: Actor<P>,
    actor_tgt: Actor<P>,
    critic: Critic<Q>,
    critic_tgt: Critic<Q>,
    gamma: f64,
    tau: f64,
    batch_size: usize,
    actor_clip: Option<f64>,
    critic_clip: Option<f64>,
    train: bool,
    n_opts: usize,
    device: Device,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, P, R> Ddpg<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Returns the number of optimization steps done so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Returns the online actor and critic.
    pub fn networks(&self) -> (&Actor<P>, &Critic<Q>) {
        (&self.actor, &self.critic)
    }

    /// Returns the target actor and critic.
    pub fn target_networks(&self) -> (&Actor<P>, &Critic<Q>) {
        (&self.actor_tgt, &self.critic_tgt)
    }

    fn update_critic(&mut self, batch: &TensorBatch) -> Result<(f32, f32, Tensor)> {
        let tgt = {
            let next_a = self.actor_tgt.forward(&batch.next_obs)?;
            let next_q = self.critic_tgt.forward(&batch.next_obs, &next_a)?;
            let not_done = (1f64 - &batch.is_done)?;
            (&batch.reward + ((not_done * self.gamma)? * next_q)?)?
        }
        .detach();

        let pred = self.critic.forward(&batch.obs, &batch.act)?;
        debug_assert_eq!(pred.dims(), tgt.dims());
        let td_error = (tgt - &pred)?;
        let loss = weighted_critic_loss(&td_error, &batch.weight)?;
        let grad_norm = self.critic.backward_step(&loss, self.critic_clip)?;

        Ok((to_scalar(&loss)?, grad_norm, td_error.detach()))
    }

    fn update_actor(&mut self, batch: &TensorBatch) -> Result<(f32, f32)> {
        let a = self.actor.forward(&batch.obs)?;
        let loss = self.critic.forward(&batch.obs, &a)?.mean_all()?.neg()?;
        let grad_norm = self.actor.backward_step(&loss, self.actor_clip)?;

        Ok((to_scalar(&loss)?, grad_norm))
    }

    fn soft_update(&mut self) -> Result<()> {
        track(self.actor_tgt.varmap(), self.actor.varmap(), self.tau)?;
        track(self.critic_tgt.varmap(), self.critic.varmap(), self.tau)?;
        Ok(())
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        trace!("batch()");
        let batch = buffer.batch(self.batch_size)?;
        let batch = TensorBatch::from_batch(batch, &self.device)?;

        trace!("update_critic()");
        let (loss_critic, grad_norm_critic, td_error) = self.update_critic(&batch)?;

        trace!("update_actor()");
        let (loss_actor, grad_norm_actor) = self.update_actor(&batch)?;

        let priorities = priorities_from_td_errors(&td_error)?;
        buffer.update_priority(&batch.ix_sample, &Some(priorities))?;

        trace!("soft_update()");
        self.soft_update()?;
        self.n_opts += 1;

        Ok(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic)),
            ("loss_actor", RecordValue::Scalar(loss_actor)),
            ("grad_norm_critic", RecordValue::Scalar(grad_norm_critic)),
            ("grad_norm_actor", RecordValue::Scalar(grad_norm_actor)),
            ("td_error_abs_mean", RecordValue::Scalar(to_scalar(&td_error.abs()?)?)),
        ]))
    }
}

impl<E, Q, P, R> Configurable for Ddpg<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    type Config = DdpgConfig<Q::Config, P::Config>;

    /// Constructs [`Ddpg`] agent. The target networks start as copies of
    /// the online networks.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device: Device = config.device.try_into()?;
        let actor = Actor::build(config.actor_config, device.clone())?;
        let critic = Critic::build(config.critic_config, device.clone())?;
        let actor_tgt = actor.try_clone()?;
        let critic_tgt = critic.try_clone()?;

        Ok(Ddpg {
            actor,
            actor_tgt,
            critic,
            critic_tgt,
            gamma: config.gamma,
            tau: config.tau,
            batch_size: config.batch_size,
            actor_clip: config.actor_clip,
            critic_clip: config.critic_clip,
            train: false,
            n_opts: 0,
            device,
            phantom: PhantomData,
        })
    }
}

impl<E, Q, P, R> Policy<E> for Ddpg<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Returns the deterministic action. Exploration noise is added by the
    /// caller.
    fn sample(&mut self, obs: &[f32]) -> Result<Vec<f32>> {
        act(&self.actor, obs, &self.device)
    }
}

impl<E, Q, P, R> Agent<E, R> for Ddpg<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Record> {
        self.opt_(buffer)
    }

    /// Saves `actor.pt` and `critic.pt` in the directory.
    fn save_params(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        self.actor.save(path.join("actor"))?;
        self.critic.save(path.join("critic"))?;
        Ok(())
    }

    /// Loads `actor.pt` and `critic.pt`, then copies them to the targets.
    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.actor.load(path.join("actor"))?;
        self.critic.load(path.join("critic"))?;
        hard_update(self.actor_tgt.varmap(), self.actor.varmap())?;
        hard_update(self.critic_tgt.varmap(), self.critic.varmap())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_from_td_errors() -> Result<()> {
        let td = Tensor::from_slice(&[0f32, -2.0, 0.5], (3, 1), &Device::Cpu)?;
        let p = priorities_from_td_errors(&td)?;
        assert!(p.iter().all(|&p| p > 0.0));
        assert!((p[0] - 1e-5).abs() < 1e-9);
        assert!((p[1] - 2.00001).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_weighted_critic_loss() -> Result<()> {
        let td = Tensor::from_slice(&[1f32, -2.0], (2, 1), &Device::Cpu)?;
        let loss = to_scalar(&weighted_critic_loss(&td, &None)?)?;
        assert!((loss - 1.25).abs() < 1e-6);

        let w = Tensor::from_slice(&[1f32, 0.5], (2, 1), &Device::Cpu)?;
        let loss = to_scalar(&weighted_critic_loss(&td, &Some(w))?)?;
        assert!((loss - 0.75).abs() < 1e-6);
        Ok(())
    }
}
