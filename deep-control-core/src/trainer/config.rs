//! Configuration of [`Trainer`](super::Trainer).
use crate::{error::ControlError, noise::OuNoiseConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// A training step collects `transitions_per_step` transitions and then runs
/// `gradient_updates_per_step` optimization steps of the agent. All intervals
/// are counted in training steps.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The number of training steps.
    pub num_steps: usize,

    /// Environment steps per training step.
    pub transitions_per_step: usize,

    /// Optimization steps per training step.
    pub gradient_updates_per_step: usize,

    /// Random transitions pushed into the replay buffer before training.
    pub warmup_steps: usize,

    /// Upper bound on the length of an episode, in training and evaluation.
    pub max_episode_steps: usize,

    /// Interval of evaluation.
    pub eval_interval: usize,

    /// The number of episodes per evaluation.
    pub eval_episodes: usize,

    /// Interval of saving model parameters.
    pub save_interval: usize,

    /// Interval of writing optimization records.
    pub record_interval: usize,

    /// Directory where model parameters are saved. Nothing is saved if `None`.
    pub model_dir: Option<String>,

    /// Store `done = false` for the transition that hits `max_episode_steps`.
    pub infinite_bootstrap: bool,

    /// Clip noisy actions into the action space before stepping.
    pub clip_exploration: bool,

    /// Exploration noise.
    pub noise: OuNoiseConfig,

    /// Random seed of the training environment and the warmup policy.
    pub seed: i64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_steps: 1_000_000,
            transitions_per_step: 1,
            gradient_updates_per_step: 1,
            warmup_steps: 1000,
            max_episode_steps: 100_000,
            eval_interval: 5000,
            eval_episodes: 10,
            save_interval: 100_000,
            record_interval: 1000,
            model_dir: None,
            infinite_bootstrap: true,
            clip_exploration: false,
            noise: OuNoiseConfig::default(),
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of training steps.
    pub fn num_steps(mut self, v: usize) -> Self {
        self.num_steps = v;
        self
    }

    /// Sets the number of environment steps per training step.
    pub fn transitions_per_step(mut self, v: usize) -> Self {
        self.transitions_per_step = v;
        self
    }

    /// Sets the number of optimization steps per training step.
    pub fn gradient_updates_per_step(mut self, v: usize) -> Self {
        self.gradient_updates_per_step = v;
        self
    }

    /// Sets the number of warmup transitions.
    pub fn warmup_steps(mut self, v: usize) -> Self {
        self.warmup_steps = v;
        self
    }

    /// Sets the maximum length of an episode.
    pub fn max_episode_steps(mut self, v: usize) -> Self {
        self.max_episode_steps = v;
        self
    }

    /// Sets the interval of evaluation.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the number of episodes per evaluation.
    pub fn eval_episodes(mut self, v: usize) -> Self {
        self.eval_episodes = v;
        self
    }

    /// Sets the interval of saving.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the interval of writing optimization records.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }

    /// Sets the directory where model parameters are saved.
    pub fn model_dir(mut self, model_dir: impl Into<String>) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    /// Enables or disables infinite bootstrapping.
    pub fn infinite_bootstrap(mut self, v: bool) -> Self {
        self.infinite_bootstrap = v;
        self
    }

    /// Enables or disables clipping of noisy actions.
    pub fn clip_exploration(mut self, v: bool) -> Self {
        self.clip_exploration = v;
        self
    }

    /// Sets the exploration noise.
    pub fn noise(mut self, noise: OuNoiseConfig) -> Self {
        self.noise = noise;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks that the counts and intervals can drive a training run.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("transitions_per_step", self.transitions_per_step),
            ("max_episode_steps", self.max_episode_steps),
            ("eval_interval", self.eval_interval),
            ("save_interval", self.save_interval),
            ("record_interval", self.record_interval),
        ];
        for (name, v) in positive.iter() {
            if *v == 0 {
                return Err(ControlError::InvalidConfig(format!("{} must be positive", name)).into());
            }
        }
        self.noise.validate()
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
