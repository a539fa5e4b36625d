//! Uniform replay buffer.
use super::{ReplayBufferConfig, Transition, TransitionBatch};
use crate::{error::ControlError, ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A fixed-capacity ring of transitions, sampled uniformly with replacement.
///
/// Fields of the transitions are kept in flat, parallel arrays. Slot `j` of
/// `obs` is `obs[j * obs_dim..(j + 1) * obs_dim]`.
pub struct ReplayBuffer {
    capacity: usize,
    obs_dim: usize,
    act_dim: usize,
    i: usize,
    size: usize,
    obs: Vec<f32>,
    act: Vec<f32>,
    next_obs: Vec<f32>,
    reward: Vec<f32>,
    is_done: Vec<i8>,
    rng: StdRng,
}

impl ReplayBuffer {
    /// Returns the maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the dimension of observations.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// Returns the dimension of actions.
    pub fn act_dim(&self) -> usize {
        self.act_dim
    }

    /// Returns the number of stored transitions with the done flag set.
    pub fn num_terminated_flags(&self) -> usize {
        self.is_done[..self.size].iter().filter(|&&d| d != 0).count()
    }

    /// Returns the sum of stored rewards.
    pub fn sum_rewards(&self) -> f32 {
        self.reward[..self.size].iter().sum()
    }

    /// Slot written by the next push.
    pub(crate) fn cursor(&self) -> usize {
        self.i
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Copies the transitions at `ixs` into a batch.
    pub(crate) fn gather(&self, ixs: Vec<usize>, weight: Option<Vec<f32>>) -> TransitionBatch {
        let (s, a) = (self.obs_dim, self.act_dim);
        let n = ixs.len();
        let mut obs = Vec::with_capacity(n * s);
        let mut act = Vec::with_capacity(n * a);
        let mut next_obs = Vec::with_capacity(n * s);

        for &ix in ixs.iter() {
            obs.extend_from_slice(&self.obs[ix * s..(ix + 1) * s]);
            act.extend_from_slice(&self.act[ix * a..(ix + 1) * a]);
            next_obs.extend_from_slice(&self.next_obs[ix * s..(ix + 1) * s]);
        }

        TransitionBatch {
            obs,
            act,
            next_obs,
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            is_done: ixs.iter().map(|&ix| self.is_done[ix]).collect(),
            obs_dim: s,
            act_dim: a,
            ix_sample: Some(ixs),
            weight,
        }
    }

    pub(crate) fn check_batch_size(&self, size: usize) -> Result<()> {
        if self.size == 0 || self.size < size {
            return Err(ControlError::InsufficientData {
                requested: size,
                available: self.size,
            }
            .into());
        }
        Ok(())
    }
}

impl ExperienceBufferBase for ReplayBuffer {
    type Item = Transition;

    fn push(&mut self, tr: Transition) -> Result<()> {
        let (s, a) = (self.obs_dim, self.act_dim);
        if tr.obs.len() != s {
            return Err(ControlError::shape("obs", &[s], &[tr.obs.len()]).into());
        }
        if tr.next_obs.len() != s {
            return Err(ControlError::shape("next_obs", &[s], &[tr.next_obs.len()]).into());
        }
        if tr.act.len() != a {
            return Err(ControlError::shape("act", &[a], &[tr.act.len()]).into());
        }

        let j = self.i;
        self.obs[j * s..(j + 1) * s].copy_from_slice(&tr.obs);
        self.act[j * a..(j + 1) * a].copy_from_slice(&tr.act);
        self.next_obs[j * s..(j + 1) * s].copy_from_slice(&tr.next_obs);
        self.reward[j] = tr.reward;
        self.is_done[j] = tr.is_done as i8;

        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);

        Ok(())
    }

    fn len(&self) -> usize {
        self.size
    }
}

impl ReplayBufferBase for ReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;

        Ok(Self {
            capacity,
            obs_dim: config.obs_dim,
            act_dim: config.act_dim,
            i: 0,
            size: 0,
            obs: vec![0.; capacity * config.obs_dim],
            act: vec![0.; capacity * config.act_dim],
            next_obs: vec![0.; capacity * config.obs_dim],
            reward: vec![0.; capacity],
            is_done: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        self.check_batch_size(size)?;
        let n = self.size;
        let ixs = (0..size).map(|_| self.rng.gen_range(0..n)).collect();
        Ok(self.gather(ixs, None))
    }

    fn update_priority(&mut self, _ixs: &Option<Vec<usize>>, _priorities: &Option<Vec<f32>>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(k: usize) -> Transition {
        let k = k as f32;
        Transition::new(vec![k, -k], vec![k], k, vec![k + 1.0, -k - 1.0], false)
    }

    fn buffer(capacity: usize) -> ReplayBuffer {
        let config = ReplayBufferConfig::default()
            .capacity(capacity)
            .obs_dim(2)
            .act_dim(1)
            .seed(0);
        ReplayBuffer::build(&config).unwrap()
    }

    #[test]
    fn test_ring_invariant() {
        let mut buffer = buffer(5);
        for k in 0..12 {
            buffer.push(transition(k)).unwrap();
            assert_eq!(buffer.len(), (k + 1).min(5));
            assert_eq!(buffer.cursor(), (k + 1) % 5);
        }

        // The five most recent transitions, 7..12, occupy the slots.
        let batch = buffer.gather((0..5).collect(), None);
        let mut rewards = batch.reward.clone();
        rewards.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(rewards, vec![7., 8., 9., 10., 11.]);
        assert_eq!(buffer.sum_rewards(), 45.);
    }

    #[test]
    fn test_sampling_validity() {
        let mut buffer = buffer(100);
        for k in 0..30 {
            buffer.push(transition(k)).unwrap();
        }
        let err = buffer.batch(64).unwrap_err();
        let err = err.downcast_ref::<ControlError>().unwrap();
        assert_eq!(
            err,
            &ControlError::InsufficientData {
                requested: 64,
                available: 30
            }
        );

        let batch = buffer.batch(16).unwrap();
        assert_eq!(batch.len(), 16);
        assert!(batch.weight.is_none());
        for (i, &ix) in batch.ix_sample.as_ref().unwrap().iter().enumerate() {
            assert!(ix < 30);
            let k = batch.reward[i];
            assert_eq!(batch.obs_row(i), &[k, -k]);
            assert_eq!(batch.act_row(i), &[k]);
            assert_eq!(batch.next_obs_row(i), &[k + 1.0, -k - 1.0]);
        }
    }

    #[test]
    fn test_empty_buffer() {
        let mut buffer = buffer(10);
        assert!(buffer.is_empty());
        assert!(buffer.batch(1).is_err());
    }

    #[test]
    fn test_push_shape_error() {
        let mut buffer = buffer(10);
        let tr = Transition::new(vec![0.; 3], vec![0.], 0., vec![0.; 2], false);
        let err = buffer.push(tr).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ControlError>(),
            Some(&ControlError::shape("obs", &[2], &[3]))
        );
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.cursor(), 0);
    }

    #[test]
    fn test_terminated_flags() {
        let mut buffer = buffer(10);
        for k in 0..4 {
            let mut tr = transition(k);
            tr.is_done = k % 2 == 1;
            buffer.push(tr).unwrap();
        }
        assert_eq!(buffer.num_terminated_flags(), 2);
    }

    #[test]
    fn test_zero_capacity() {
        let config = ReplayBufferConfig::default().capacity(0);
        assert!(ReplayBuffer::build(&config).is_err());
    }
}
