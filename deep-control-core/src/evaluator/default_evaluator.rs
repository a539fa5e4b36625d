//! Default implementation of the [`Evaluator`] trait.
//!
//! Runs a fixed number of episodes on its own environment instance, acting
//! greedily with the policy, and reports the average return.
use super::Evaluator;
use crate::{record::Record, Env, Policy};
use anyhow::Result;
use log::debug;

/// Runs `n_episodes` noiseless episodes and reports the mean return.
///
/// Episodes end when the environment reports termination or truncation, or
/// after `max_episode_steps` steps.
///
/// ```ignore
/// let mut evaluator = DefaultEvaluator::<PointEnv>::new(&config, 42, 10, 200)?;
/// let record = evaluator.evaluate(&mut agent)?;
/// println!("Average return: {}", record.get_scalar("episode_return")?);
/// ```
pub struct DefaultEvaluator<E: Env> {
    n_episodes: usize,
    max_episode_steps: usize,
    env: E,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P>(&mut self, policy: &mut P) -> Result<Record>
    where
        P: Policy<E>,
    {
        let mut r_total = 0f32;

        for ix in 0..self.n_episodes {
            let mut prev_obs = self.env.reset_with_index(ix)?;
            let mut r_episode = 0f32;

            for _ in 0..self.max_episode_steps {
                let act = policy.sample(&prev_obs)?;
                let (step, _) = self.env.step(&act)?;
                r_episode += step.reward;
                if step.is_done() {
                    break;
                }
                prev_obs = step.obs;
            }

            debug!("Evaluation episode {}: return = {}", ix, r_episode);
            r_total += r_episode;
        }

        let mean = match self.n_episodes {
            0 => 0.0,
            n => r_total / n as f32,
        };
        Ok(Record::from_scalar("episode_return", mean))
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a new [`DefaultEvaluator`].
    ///
    /// * `config` - Configuration of the evaluation environment.
    /// * `seed` - Random seed of the evaluation environment.
    /// * `n_episodes` - Number of episodes per evaluation.
    /// * `max_episode_steps` - Upper bound on the length of an episode.
    pub fn new(
        config: &E::Config,
        seed: i64,
        n_episodes: usize,
        max_episode_steps: usize,
    ) -> Result<Self> {
        Ok(Self {
            n_episodes,
            max_episode_steps,
            env: E::build(config, seed)?,
        })
    }

    /// Number of episodes per evaluation.
    pub fn n_episodes(&self) -> usize {
        self.n_episodes
    }

    /// Upper bound on the length of an evaluation episode.
    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }
}
