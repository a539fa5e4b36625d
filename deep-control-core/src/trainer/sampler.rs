//! Collecting transitions from the training environment.
use super::TrainerConfig;
use crate::{
    error::ControlError,
    noise::OrnsteinUhlenbeck,
    record::{Record, RecordValue},
    replay_buffer::Transition,
    Env, ExperienceBufferBase, Policy,
};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, SeedableRng};

enum EpisodeState {
    NeedsReset,
    InEpisode { obs: Vec<f32>, steps: usize },
}

/// Drives the training environment one step at a time and pushes every
/// transition into a replay buffer.
///
/// The sampler resets the environment and the exploration noise lazily, at
/// the first step after an episode has ended. An episode ends when the
/// environment reports termination or truncation, or after
/// `max_episode_steps` steps.
///
/// With infinite bootstrapping, the transition at step `max_episode_steps` is
/// stored with `done = false` even if the environment reported done, so that
/// the time limit does not cut off the bootstrapped value.
pub struct Sampler<E: Env> {
    env: E,
    noise: OrnsteinUhlenbeck,
    state: EpisodeState,
    max_episode_steps: usize,
    infinite_bootstrap: bool,
    clip_exploration: bool,
    rng: StdRng,
    episode_return: f32,
    n_episodes: usize,
}

impl<E: Env> Sampler<E> {
    /// Creates a sampler on the given environment.
    pub fn new(env: E, config: &TrainerConfig) -> Result<Self> {
        let noise = OrnsteinUhlenbeck::new(&config.noise, env.action_space().dim())?;
        Ok(Self {
            env,
            noise,
            state: EpisodeState::NeedsReset,
            max_episode_steps: config.max_episode_steps,
            infinite_bootstrap: config.infinite_bootstrap,
            clip_exploration: config.clip_exploration,
            rng: StdRng::seed_from_u64(config.seed as u64),
            episode_return: 0.0,
            n_episodes: 0,
        })
    }

    /// Returns the number of finished episodes.
    pub fn n_episodes(&self) -> usize {
        self.n_episodes
    }

    /// Returns the exploration noise.
    pub fn noise(&self) -> &OrnsteinUhlenbeck {
        &self.noise
    }

    /// Ends the current episode. The next step starts from a reset.
    pub fn force_reset(&mut self) {
        self.state = EpisodeState::NeedsReset;
    }

    /// Takes a step with the policy's action plus exploration noise.
    ///
    /// Returns the record of the environment. At the end of an episode, it
    /// also holds `episode_return` and `episode_length`.
    pub fn sample_and_push<P, R>(&mut self, policy: &mut P, buffer: &mut R) -> Result<Record>
    where
        P: Policy<E>,
        R: ExperienceBufferBase<Item = Transition>,
    {
        let (obs, steps) = self.begin()?;
        let mut act = policy.sample(&obs)?;
        let dim = self.env.action_space().dim();
        if act.len() != dim {
            return Err(ControlError::shape("action", &[dim], &[act.len()]).into());
        }
        act.iter_mut()
            .zip(self.noise.sample())
            .for_each(|(a, n)| *a += n);
        if self.clip_exploration {
            self.env.action_space().clip(&mut act);
        }
        self.advance(obs, steps, act, buffer)
    }

    /// Takes a step with an action drawn uniformly from the action space.
    pub fn random_and_push<R>(&mut self, buffer: &mut R) -> Result<Record>
    where
        R: ExperienceBufferBase<Item = Transition>,
    {
        let (obs, steps) = self.begin()?;
        let act = self.env.action_space().sample(&mut self.rng);
        self.advance(obs, steps, act, buffer)
    }

    fn begin(&mut self) -> Result<(Vec<f32>, usize)> {
        match std::mem::replace(&mut self.state, EpisodeState::NeedsReset) {
            EpisodeState::InEpisode { obs, steps } => Ok((obs, steps)),
            EpisodeState::NeedsReset => {
                let obs = self.env.reset()?;
                self.noise.reset_states();
                self.episode_return = 0.0;
                Ok((obs, 0))
            }
        }
    }

    fn advance<R>(&mut self, obs: Vec<f32>, steps: usize, act: Vec<f32>, buffer: &mut R) -> Result<Record>
    where
        R: ExperienceBufferBase<Item = Transition>,
    {
        let (step, mut record) = self.env.step(&act)?;
        let env_done = step.is_done();
        let is_done = if self.infinite_bootstrap && steps + 1 == self.max_episode_steps {
            false
        } else {
            env_done
        };
        let steps = steps + 1;
        self.episode_return += step.reward;

        buffer.push(Transition::new(obs, act, step.reward, step.obs.clone(), is_done))?;

        if env_done || steps >= self.max_episode_steps {
            trace!("Episode {} ended after {} steps", self.n_episodes, steps);
            record.insert("episode_return", RecordValue::Scalar(self.episode_return));
            record.insert("episode_length", RecordValue::Scalar(steps as f32));
            self.n_episodes += 1;
        } else {
            self.state = EpisodeState::InEpisode {
                obs: step.obs,
                steps,
            };
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        noise::OuNoiseConfig,
        replay_buffer::{ReplayBuffer, ReplayBufferConfig},
        BoxSpace, ReplayBufferBase, Step,
    };

    /// Counts down from `start` and terminates at zero.
    struct CountdownEnv {
        start: usize,
        t: usize,
        space: BoxSpace,
    }

    impl Env for CountdownEnv {
        type Config = usize;
        type Info = ();

        fn build(config: &usize, _seed: i64) -> Result<Self> {
            Ok(Self {
                start: *config,
                t: *config,
                space: BoxSpace::symmetric(1, 1.0),
            })
        }

        fn obs_dim(&self) -> usize {
            1
        }

        fn action_space(&self) -> &BoxSpace {
            &self.space
        }

        fn step(&mut self, a: &[f32]) -> Result<(Step<Self>, Record)> {
            self.t -= 1;
            let step = Step::new(vec![self.t as f32], a.to_vec(), 1.0, self.t == 0, false, ());
            Ok((step, Record::empty()))
        }

        fn reset(&mut self) -> Result<Vec<f32>> {
            self.t = self.start;
            Ok(vec![self.t as f32])
        }

        fn reset_with_index(&mut self, _ix: usize) -> Result<Vec<f32>> {
            self.reset()
        }
    }

    struct ZeroPolicy;

    impl Policy<CountdownEnv> for ZeroPolicy {
        fn sample(&mut self, _obs: &[f32]) -> Result<Vec<f32>> {
            Ok(vec![0.0])
        }
    }

    fn setup(start: usize, config: &TrainerConfig) -> (Sampler<CountdownEnv>, ReplayBuffer) {
        let env = CountdownEnv::build(&start, 0).unwrap();
        let sampler = Sampler::new(env, config).unwrap();
        let buffer_config = ReplayBufferConfig::default().capacity(100).obs_dim(1).act_dim(1);
        (sampler, ReplayBuffer::build(&buffer_config).unwrap())
    }

    fn done_flags(buffer: &ReplayBuffer) -> Vec<i8> {
        // Insertion order, the buffer has not wrapped around.
        (0..buffer.len())
            .map(|ix| buffer.gather(vec![ix], None).is_done[0])
            .collect()
    }

    #[test]
    fn test_infinite_bootstrap_at_step_limit() {
        let config = TrainerConfig::default().max_episode_steps(5);
        let (mut sampler, mut buffer) = setup(10, &config);
        for _ in 0..5 {
            sampler.sample_and_push(&mut ZeroPolicy, &mut buffer).unwrap();
        }
        assert_eq!(done_flags(&buffer), vec![0, 0, 0, 0, 0]);
        assert_eq!(sampler.n_episodes(), 1);

        // The next step starts a new episode from the initial observation.
        sampler.sample_and_push(&mut ZeroPolicy, &mut buffer).unwrap();
        let batch = buffer.gather(vec![5], None);
        assert_eq!(batch.obs, vec![10.0]);
    }

    #[test]
    fn test_env_done_before_step_limit() {
        let config = TrainerConfig::default().max_episode_steps(5);
        let (mut sampler, mut buffer) = setup(3, &config);
        let mut records = vec![];
        for _ in 0..3 {
            records.push(sampler.sample_and_push(&mut ZeroPolicy, &mut buffer).unwrap());
        }
        assert_eq!(done_flags(&buffer), vec![0, 0, 1]);
        assert!(records[1].get("episode_return").is_none());
        assert_eq!(records[2].get_scalar("episode_return").unwrap(), 3.0);
        assert_eq!(records[2].get_scalar("episode_length").unwrap(), 3.0);
    }

    #[test]
    fn test_env_done_at_step_limit_is_bootstrapped() {
        let config = TrainerConfig::default().max_episode_steps(3);
        let (mut sampler, mut buffer) = setup(3, &config);
        for _ in 0..3 {
            sampler.random_and_push(&mut buffer).unwrap();
        }
        assert_eq!(done_flags(&buffer), vec![0, 0, 0]);
    }

    #[test]
    fn test_without_infinite_bootstrap() {
        let config = TrainerConfig::default()
            .max_episode_steps(3)
            .infinite_bootstrap(false);
        let (mut sampler, mut buffer) = setup(3, &config);
        for _ in 0..3 {
            sampler.random_and_push(&mut buffer).unwrap();
        }
        assert_eq!(done_flags(&buffer), vec![0, 0, 1]);
    }

    #[test]
    fn test_clip_exploration() {
        let noise = OuNoiseConfig::default().sigma(5.0, 5.0, 0);
        let clipped = TrainerConfig::default().noise(noise.clone()).clip_exploration(true);
        let (mut sampler, mut buffer) = setup(100, &clipped);
        for _ in 0..20 {
            sampler.sample_and_push(&mut ZeroPolicy, &mut buffer).unwrap();
        }
        let batch = buffer.gather((0..20).collect(), None);
        assert!(batch.act.iter().all(|a| a.abs() <= 1.0));

        let unclipped = TrainerConfig::default().noise(noise);
        let (mut sampler, mut buffer) = setup(100, &unclipped);
        for _ in 0..20 {
            sampler.sample_and_push(&mut ZeroPolicy, &mut buffer).unwrap();
        }
        let batch = buffer.gather((0..20).collect(), None);
        assert!(batch.act.iter().any(|a| a.abs() > 1.0));
    }
}
