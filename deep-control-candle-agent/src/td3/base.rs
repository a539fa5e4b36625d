use super::Td3Config;
use crate::{
    actor::Actor,
    critic::Critic,
    ddpg::{act, priorities_from_td_errors, weighted_critic_loss},
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
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, marker::PhantomData, path::Path};

/// Twin delayed DDPG (TD3) agent.
pub struct Td3<E, Q, P, R>
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
    critics: [Critic<Q>; 2],
    critics_tgt: [Critic<Q>; 2],
    gamma: f64,
    tau: f64,
    batch_size: usize,
    actor_clip: Option<f64>,
    critic_clip: Option<f64>,
    target_noise: f64,
    noise_clip: f64,
    policy_delay: usize,
    rng: StdRng,
    train: bool,
    n_opts: usize,
    device: Device,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, P, R> Td3<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Returns the number of critic updates done so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Clipped Gaussian noise for a batch of target actions.
    fn sample_target_noise(&mut self, n: usize) -> Result<Tensor> {
        let dim = self.actor.out_dim();
        let noise = (0..n * dim)
            .map(|_| {
                let z: f64 = StandardNormal.sample(&mut self.rng);
                (z * self.target_noise).clamp(-self.noise_clip, self.noise_clip) as f32
            })
            .collect::<Vec<_>>();
        Ok(Tensor::from_vec(noise, (n, dim), &self.device)?)
    }

    fn target(&mut self, batch: &TensorBatch) -> Result<Tensor> {
        let n = batch.obs.dims()[0];
        let noise = self.sample_target_noise(n)?;
        let max_action = self.actor_tgt.max_action();
        let next_a = (self.actor_tgt.forward(&batch.next_obs)? + noise)?.clamp(-max_action, max_action)?;
        let next_q = {
            let q1 = self.critics_tgt[0].forward(&batch.next_obs, &next_a)?;
            let q2 = self.critics_tgt[1].forward(&batch.next_obs, &next_a)?;
            q1.minimum(&q2)?
        };
        let not_done = (1f64 - &batch.is_done)?;
        Ok((&batch.reward + ((not_done * self.gamma)? * next_q)?)?.detach())
    }

    fn update_critics(&mut self, batch: &TensorBatch) -> Result<(Record, Tensor)> {
        let tgt = self.target(batch)?;
        let mut record = Record::empty();
        let mut td_abs = Vec::with_capacity(2);

        for (i, critic) in self.critics.iter_mut().enumerate() {
            let pred = critic.forward(&batch.obs, &batch.act)?;
            let td_error = (&tgt - &pred)?;
            let loss = weighted_critic_loss(&td_error, &batch.weight)?;
            let grad_norm = critic.backward_step(&loss, self.critic_clip)?;

            record.insert(format!("loss_critic{}", i + 1), RecordValue::Scalar(to_scalar(&loss)?));
            record.insert(format!("grad_norm_critic{}", i + 1), RecordValue::Scalar(grad_norm));
            td_abs.push(td_error.detach().abs()?);
        }

        // Mean absolute TD error of the two critics.
        let td_abs = ((&td_abs[0] + &td_abs[1])? * 0.5)?;
        Ok((record, td_abs))
    }

    fn update_actor(&mut self, batch: &TensorBatch) -> Result<(f32, f32)> {
        let a = self.actor.forward(&batch.obs)?;
        let loss = self.critics[0].forward(&batch.obs, &a)?.mean_all()?.neg()?;
        let grad_norm = self.actor.backward_step(&loss, self.actor_clip)?;
        Ok((to_scalar(&loss)?, grad_norm))
    }

    fn soft_update(&mut self) -> Result<()> {
        track(self.actor_tgt.varmap(), self.actor.varmap(), self.tau)?;
        for (tgt, src) in self.critics_tgt.iter().zip(self.critics.iter()) {
            track(tgt.varmap(), src.varmap(), self.tau)?;
        }
        Ok(())
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let batch = buffer.batch(self.batch_size)?;
        let batch = TensorBatch::from_batch(batch, &self.device)?;

        trace!("update_critics()");
        let (mut record, td_abs) = self.update_critics(&batch)?;
        let priorities = priorities_from_td_errors(&td_abs)?;
        buffer.update_priority(&batch.ix_sample, &Some(priorities))?;
        record.insert("td_error_abs_mean", RecordValue::Scalar(to_scalar(&td_abs)?));
        self.n_opts += 1;

        if self.n_opts % self.policy_delay == 0 {
            trace!("update_actor()");
            let (loss_actor, grad_norm_actor) = self.update_actor(&batch)?;
            record.insert("loss_actor", RecordValue::Scalar(loss_actor));
            record.insert("grad_norm_actor", RecordValue::Scalar(grad_norm_actor));
            self.soft_update()?;
        }

        Ok(record)
    }
}

impl<E, Q, P, R> Configurable for Td3<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    type Config = Td3Config<Q::Config, P::Config>;

    /// Constructs [`Td3`] agent.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device: Device = config.device.try_into()?;
        let actor = Actor::build(config.actor_config, device.clone())?;
        let critics = [
            Critic::build(config.critic_config.clone(), device.clone())?,
            Critic::build(config.critic_config, device.clone())?,
        ];
        let actor_tgt = actor.try_clone()?;
        let critics_tgt = [critics[0].try_clone()?, critics[1].try_clone()?];

        Ok(Td3 {
            actor,
            actor_tgt,
            critics,
            critics_tgt,
            gamma: config.gamma,
            tau: config.tau,
            batch_size: config.batch_size,
            actor_clip: config.actor_clip,
            critic_clip: config.critic_clip,
            target_noise: config.target_noise,
            noise_clip: config.noise_clip,
            policy_delay: config.policy_delay,
            rng: StdRng::seed_from_u64(config.seed),
            train: false,
            n_opts: 0,
            device,
            phantom: PhantomData,
        })
    }
}

impl<E, Q, P, R> Policy<E> for Td3<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn sample(&mut self, obs: &[f32]) -> Result<Vec<f32>> {
        act(&self.actor, obs, &self.device)
    }
}

impl<E, Q, P, R> Agent<E, R> for Td3<E, Q, P, R>
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

    /// Saves `actor.pt`, `critic1.pt` and `critic2.pt` in the directory.
    fn save_params(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        self.actor.save(path.join("actor"))?;
        self.critics[0].save(path.join("critic1"))?;
        self.critics[1].save(path.join("critic2"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.actor.load(path.join("actor"))?;
        self.critics[0].load(path.join("critic1"))?;
        self.critics[1].load(path.join("critic2"))?;
        hard_update(self.actor_tgt.varmap(), self.actor.varmap())?;
        for (tgt, src) in self.critics_tgt.iter().zip(self.critics.iter()) {
            hard_update(tgt.varmap(), src.varmap())?;
        }
        Ok(())
    }
}
