//! Prioritized experience replay.
use super::{
    sum_tree::SumTree, IwScheduler, PerConfig, PrioritizedReplayBufferConfig, ReplayBuffer,
    Transition, TransitionBatch,
};
use crate::{error::ControlError, ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
use log::trace;
use rand::Rng;

/// A replay buffer sampled proportionally to `priority^alpha`.
///
/// New transitions get the largest priority written so far, so each of them
/// is likely to be replayed at least once before its priority is corrected
/// by the learner. Batches carry importance weights `(N * P(i))^-beta`,
/// normalized so that the largest weight in the batch is 1.
pub struct PrioritizedReplayBuffer {
    buffer: ReplayBuffer,
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
    alpha: f32,
    eps: f32,
    max_priority: f32,
}

impl PrioritizedReplayBuffer {
    /// Returns the maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Returns the current exponent of importance weights.
    pub fn beta(&self) -> f32 {
        self.iw_scheduler.beta()
    }

    /// Returns the priority of the transition at `ix`, before exponentiation.
    pub fn priority(&self, ix: usize) -> f32 {
        let p = self.sum_tree.leaf(ix);
        if self.alpha == 0.0 {
            return p as f32;
        }
        p.powf(1.0 / self.alpha as f64) as f32
    }

    /// Returns the largest priority written so far.
    pub fn max_priority(&self) -> f32 {
        self.max_priority
    }

    /// Returns the number of stored transitions with the done flag set.
    pub fn num_terminated_flags(&self) -> usize {
        self.buffer.num_terminated_flags()
    }

    /// Returns the sum of stored rewards.
    pub fn sum_rewards(&self) -> f32 {
        self.buffer.sum_rewards()
    }

    fn leaf_value(&self, p: f32) -> f64 {
        (p as f64).powf(self.alpha as f64)
    }
}

impl ExperienceBufferBase for PrioritizedReplayBuffer {
    type Item = Transition;

    fn push(&mut self, tr: Transition) -> Result<()> {
        let ix = self.buffer.cursor();
        self.buffer.push(tr)?;
        let p = self.leaf_value(self.max_priority);
        self.sum_tree.set(ix, p);
        Ok(())
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }
}

impl ReplayBufferBase for PrioritizedReplayBuffer {
    type Config = PrioritizedReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        let PerConfig {
            alpha,
            beta_0,
            beta_final,
            n_opts_final,
            eps,
        } = config.per_config;
        if !(alpha >= 0.0) || !(eps > 0.0) {
            return Err(ControlError::InvalidConfig(format!(
                "alpha must be non-negative and eps positive, got {} and {}",
                alpha, eps
            ))
            .into());
        }
        let buffer = ReplayBuffer::build(&config.buffer)?;

        Ok(Self {
            sum_tree: SumTree::new(buffer.capacity()),
            buffer,
            iw_scheduler: IwScheduler::new(beta_0, beta_final, n_opts_final),
            alpha,
            eps,
            max_priority: 1.0,
        })
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        self.buffer.check_batch_size(size)?;
        let total = self.sum_tree.total();
        let n = self.buffer.len() as f64;
        let beta = self.iw_scheduler.beta() as f64;

        let ixs = (0..size)
            .map(|_| {
                let s = self.buffer.rng().gen::<f64>() * total;
                self.sum_tree.get(s)
            })
            .collect::<Vec<_>>();
        let ws = ixs
            .iter()
            .map(|&ix| (n * self.sum_tree.leaf(ix) / total).powf(-beta))
            .collect::<Vec<_>>();
        let w_max = ws.iter().cloned().fold(f64::MIN_POSITIVE, f64::max);
        let ws = ws.iter().map(|w| (w / w_max) as f32).collect();

        Ok(self.buffer.gather(ixs, Some(ws)))
    }

    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, priorities: &Option<Vec<f32>>) -> Result<()> {
        let (ixs, priorities) = match (ixs, priorities) {
            (Some(ixs), Some(priorities)) => (ixs, priorities),
            _ => return Ok(()),
        };
        if ixs.len() != priorities.len() {
            return Err(ControlError::shape("priorities", &[ixs.len()], &[priorities.len()]).into());
        }

        if let Some(&ix) = ixs.iter().find(|&&ix| ix >= self.buffer.len()) {
            return Err(ControlError::InsufficientData {
                requested: ix + 1,
                available: self.buffer.len(),
            }
            .into());
        }

        for (&ix, &p) in ixs.iter().zip(priorities.iter()) {
            let p = p + self.eps;
            self.max_priority = self.max_priority.max(p);
            let v = self.leaf_value(p);
            self.sum_tree.set(ix, v);
        }
        self.iw_scheduler.add_n_opts();
        trace!("beta = {}, max priority = {}", self.iw_scheduler.beta(), self.max_priority);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::ReplayBufferConfig;

    fn buffer(capacity: usize) -> PrioritizedReplayBuffer {
        let config = PrioritizedReplayBufferConfig::new(
            ReplayBufferConfig::default()
                .capacity(capacity)
                .obs_dim(1)
                .act_dim(1)
                .seed(1),
            PerConfig::default().n_opts_final(10),
        );
        PrioritizedReplayBuffer::build(&config).unwrap()
    }

    fn fill(buffer: &mut PrioritizedReplayBuffer, n: usize) {
        for k in 0..n {
            let k = k as f32;
            let tr = Transition::new(vec![k], vec![0.], k, vec![k + 1.], false);
            buffer.push(tr).unwrap();
        }
    }

    #[test]
    fn test_new_transitions_get_max_priority() {
        let mut buffer = buffer(8);
        fill(&mut buffer, 3);
        assert!((buffer.priority(0) - 1.0).abs() < 1e-5);

        let ixs = Some(vec![1]);
        buffer.update_priority(&ixs, &Some(vec![4.0])).unwrap();
        fill(&mut buffer, 1);
        assert!((buffer.max_priority() - 4.0).abs() < 1e-5);
        assert!((buffer.priority(3) - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_importance_weights() {
        let mut buffer = buffer(16);
        fill(&mut buffer, 16);
        let ixs = (0..16).collect::<Vec<_>>();
        let ps = (0..16).map(|k| 0.1 + k as f32).collect::<Vec<_>>();
        buffer.update_priority(&Some(ixs), &Some(ps)).unwrap();

        let batch = buffer.batch(32).unwrap();
        let ws = batch.weight.unwrap();
        assert_eq!(ws.len(), 32);
        let w_max = ws.iter().cloned().fold(f32::MIN, f32::max);
        assert!((w_max - 1.0).abs() < 1e-6);
        assert!(ws.iter().all(|&w| w > 0.0 && w <= 1.0));

        // Higher priority, smaller weight.
        let ixs = batch.ix_sample.unwrap();
        for i in 0..32 {
            for j in 0..32 {
                if ixs[i] < ixs[j] {
                    assert!(ws[i] >= ws[j]);
                }
            }
        }
    }

    #[test]
    fn test_priority_floor() {
        let mut buffer = buffer(4);
        fill(&mut buffer, 4);
        let ixs = Some(vec![0, 1, 2, 3]);
        buffer.update_priority(&ixs, &Some(vec![0.0; 4])).unwrap();
        assert!((0..4).all(|ix| buffer.priority(ix) > 0.0));
        let batch = buffer.batch(4).unwrap();
        assert!(batch.weight.unwrap().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_beta_advances_per_update() {
        let mut buffer = buffer(4);
        fill(&mut buffer, 4);
        let beta_0 = buffer.beta();
        buffer.update_priority(&Some(vec![0]), &Some(vec![1.0])).unwrap();
        assert!(buffer.beta() > beta_0);
    }

    #[test]
    fn test_update_priority_length_mismatch() {
        let mut buffer = buffer(4);
        fill(&mut buffer, 4);
        let res = buffer.update_priority(&Some(vec![0, 1]), &Some(vec![1.0]));
        assert!(res.is_err());
    }

    #[test]
    fn test_update_priority_out_of_range_writes_nothing() {
        let mut buffer = buffer(8);
        fill(&mut buffer, 4);
        let beta_0 = buffer.beta();

        let res = buffer.update_priority(&Some(vec![0, 1, 7]), &Some(vec![5.0, 6.0, 7.0]));
        assert!(res.is_err());
        assert!((0..4).all(|ix| (buffer.priority(ix) - 1.0).abs() < 1e-5));
        assert!((buffer.max_priority() - 1.0).abs() < 1e-6);
        assert_eq!(buffer.beta(), beta_0);
    }
}
