use super::{EntCoef, GaussianActor, SacConfig};
use crate::{
    critic::Critic,
    ddpg::{priorities_from_td_errors, weighted_critic_loss},
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

/// Soft actor critic (SAC) agent.
///
/// In training mode [`Policy::sample`] draws from the squashed Gaussian;
/// in evaluation mode it returns the squashed mean.
pub struct Sac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    pi: GaussianActor<P>,
    qnets: [Critic<Q>; 2],
    qnets_tgt: [Critic<Q>; 2],
    ent_coef: EntCoef,
    gamma: f64,
    tau: f64,
    batch_size: usize,
    actor_clip: Option<f64>,
    critic_clip: Option<f64>,
    epsilon: f64,
    rng: StdRng,
    train: bool,
    n_opts: usize,
    device: Device,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, P, R> Sac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Returns the number of optimization steps done so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Returns the current entropy coefficient.
    pub fn alpha(&self) -> Result<f32> {
        to_scalar(&self.ent_coef.alpha()?)
    }

    fn standard_normal(&mut self, n: usize) -> Result<Tensor> {
        let dim = self.pi.out_dim();
        let z = (0..n * dim)
            .map(|_| {
                let z: f32 = StandardNormal.sample(&mut self.rng);
                z
            })
            .collect::<Vec<_>>();
        Ok(Tensor::from_vec(z, (n, dim), &self.device)?)
    }

    /// Samples actions and their log probabilities for a batch of observations.
    fn action_logp(&mut self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let z = self.standard_normal(obs.dims()[0])?;
        self.pi.sample(obs, &z, self.epsilon)
    }

    fn qvals_min(qnets: &[Critic<Q>; 2], obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let q1 = qnets[0].forward(obs, act)?;
        let q2 = qnets[1].forward(obs, act)?;
        Ok(q1.minimum(&q2)?)
    }

    fn update_critics(&mut self, batch: &TensorBatch) -> Result<(Record, Tensor)> {
        let tgt = {
            let (next_a, next_logp) = self.action_logp(&batch.next_obs)?;
            let next_q = Self::qvals_min(&self.qnets_tgt, &batch.next_obs, &next_a)?;
            let alpha = self.ent_coef.alpha()?;
            let next_v = (next_q - next_logp.broadcast_mul(&alpha)?)?;
            let not_done = (1f64 - &batch.is_done)?;
            (&batch.reward + ((not_done * self.gamma)? * next_v)?)?
        }
        .detach();

        let mut record = Record::empty();
        let mut td_abs = Vec::with_capacity(2);
        for (i, qnet) in self.qnets.iter_mut().enumerate() {
            let pred = qnet.forward(&batch.obs, &batch.act)?;
            let td_error = (&tgt - &pred)?;
            let loss = weighted_critic_loss(&td_error, &batch.weight)?;
            let grad_norm = qnet.backward_step(&loss, self.critic_clip)?;

            record.insert(format!("loss_critic{}", i + 1), RecordValue::Scalar(to_scalar(&loss)?));
            record.insert(format!("grad_norm_critic{}", i + 1), RecordValue::Scalar(grad_norm));
            td_abs.push(td_error.detach().abs()?);
        }

        let td_abs = ((&td_abs[0] + &td_abs[1])? * 0.5)?;
        Ok((record, td_abs))
    }

    fn update_actor(&mut self, batch: &TensorBatch) -> Result<Record> {
        let (a, logp) = self.action_logp(&batch.obs)?;
        let alpha = self.ent_coef.alpha()?;
        let qval = Self::qvals_min(&self.qnets, &batch.obs, &a)?;
        let loss = (logp.broadcast_mul(&alpha)? - qval)?.mean_all()?;
        let grad_norm = self.pi.backward_step(&loss, self.actor_clip)?;

        trace!("update entropy coefficient");
        self.ent_coef.update(&logp.detach())?;

        Ok(Record::from_slice(&[
            ("loss_actor", RecordValue::Scalar(to_scalar(&loss)?)),
            ("grad_norm_actor", RecordValue::Scalar(grad_norm)),
            ("entropy", RecordValue::Scalar(-to_scalar(&logp)?)),
        ]))
    }

    fn soft_update(&mut self) -> Result<()> {
        for (tgt, src) in self.qnets_tgt.iter().zip(self.qnets.iter()) {
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

        trace!("update_actor()");
        record.merge_inplace(self.update_actor(&batch)?);
        record.insert("alpha", RecordValue::Scalar(self.alpha()?));

        trace!("soft_update()");
        self.soft_update()?;
        self.n_opts += 1;

        Ok(record)
    }
}

impl<E, Q, P, R> Configurable for Sac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    type Config = SacConfig<Q::Config, P::Config>;

    /// Constructs [`Sac`] agent.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device: Device = config.device.try_into()?;
        let pi = GaussianActor::build(config.actor_config, config.min_lstd, config.max_lstd, device.clone())?;
        let qnets = [
            Critic::build(config.critic_config.clone(), device.clone())?,
            Critic::build(config.critic_config, device.clone())?,
        ];
        let qnets_tgt = [qnets[0].try_clone()?, qnets[1].try_clone()?];
        let ent_coef = EntCoef::new(config.ent_coef_mode, &device)?;

        Ok(Sac {
            pi,
            qnets,
            qnets_tgt,
            ent_coef,
            gamma: config.gamma,
            tau: config.tau,
            batch_size: config.batch_size,
            actor_clip: config.actor_clip,
            critic_clip: config.critic_clip,
            epsilon: config.epsilon,
            rng: StdRng::seed_from_u64(config.seed),
            train: false,
            n_opts: 0,
            device,
            phantom: PhantomData,
        })
    }
}

impl<E, Q, P, R> Policy<E> for Sac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    R: ReplayBufferBase<Batch = TransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn sample(&mut self, obs: &[f32]) -> Result<Vec<f32>> {
        let obs = Tensor::from_slice(obs, (1, obs.len()), &self.device)?;
        let a = match self.train {
            true => self.action_logp(&obs)?.0,
            false => self.pi.deterministic(&obs)?,
        };
        Ok(a.detach().flatten_all()?.to_vec1::<f32>()?)
    }
}

impl<E, Q, P, R> Agent<E, R> for Sac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
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

    /// Saves `actor.pt`, `critic1.pt`, `critic2.pt` and `ent_coef.pt`.
    fn save_params(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        self.pi.save(path.join("actor"))?;
        self.qnets[0].save(path.join("critic1"))?;
        self.qnets[1].save(path.join("critic2"))?;
        self.ent_coef.save(path.join("ent_coef.pt"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.pi.load(path.join("actor"))?;
        self.qnets[0].load(path.join("critic1"))?;
        self.qnets[1].load(path.join("critic2"))?;
        self.ent_coef.load(path.join("ent_coef.pt"))?;
        for (tgt, src) in self.qnets_tgt.iter().zip(self.qnets.iter()) {
            hard_update(tgt.varmap(), src.varmap())?;
        }
        Ok(())
    }
}
