//! A deterministic point-mass environment for tests and demos.
use crate::{error::ControlError, record::Record, BoxSpace, Env, Step};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuration of [`PointEnv`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PointEnvConfig {
    /// Initial position.
    pub init_pos: f32,

    /// Episodes are truncated after this many steps, if set.
    pub max_steps: Option<usize>,

    /// Episodes terminate when `|pos|` exceeds this bound.
    pub pos_limit: f32,
}

impl Default for PointEnvConfig {
    fn default() -> Self {
        Self {
            init_pos: 1.0,
            max_steps: None,
            pos_limit: 10.0,
        }
    }
}

impl PointEnvConfig {
    /// Sets the initial position.
    pub fn init_pos(mut self, v: f32) -> Self {
        self.init_pos = v;
        self
    }

    /// Sets the truncation length.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = Some(v);
        self
    }
}

/// A point on a line, pushed by a bounded force.
///
/// The observation is `[pos, vel]` and the action is a force in `[-1, 1]`.
/// Each step applies `vel <- 0.9 vel + 0.1 a` and `pos <- pos + vel`, and the
/// reward is `-|[pos, vel]|`. Every episode starts from `[init_pos, 0]`.
pub struct PointEnv {
    config: PointEnvConfig,
    space: BoxSpace,
    pos: f32,
    vel: f32,
    t: usize,
}

impl PointEnv {
    fn obs(&self) -> Vec<f32> {
        vec![self.pos, self.vel]
    }
}

impl Env for PointEnv {
    type Config = PointEnvConfig;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            space: BoxSpace::symmetric(1, 1.0),
            pos: config.init_pos,
            vel: 0.0,
            t: 0,
        })
    }

    fn obs_dim(&self) -> usize {
        2
    }

    fn action_space(&self) -> &BoxSpace {
        &self.space
    }

    fn step(&mut self, a: &[f32]) -> Result<(Step<Self>, Record)> {
        if a.len() != 1 {
            return Err(ControlError::shape("PointEnv action", &[1], &[a.len()]).into());
        }
        let force = a[0].clamp(-1.0, 1.0);
        self.vel = 0.9 * self.vel + 0.1 * force;
        self.pos += self.vel;
        self.t += 1;

        let reward = -(self.pos * self.pos + self.vel * self.vel).sqrt();
        let is_terminated = self.pos.abs() > self.config.pos_limit;
        let is_truncated = self.config.max_steps.map_or(false, |m| self.t >= m);
        let step = Step::new(self.obs(), a.to_vec(), reward, is_terminated, is_truncated, ());

        Ok((step, Record::empty()))
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.pos = self.config.init_pos;
        self.vel = 0.0;
        self.t = 0;
        Ok(self.obs())
    }

    fn reset_with_index(&mut self, _ix: usize) -> Result<Vec<f32>> {
        self.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_env_dynamics() -> Result<()> {
        let mut env = PointEnv::build(&PointEnvConfig::default(), 0)?;
        assert_eq!(env.reset()?, vec![1.0, 0.0]);
        let (step, _) = env.step(&[-1.0])?;
        assert!((step.obs[1] + 0.1).abs() < 1e-6);
        assert!((step.obs[0] - 0.9).abs() < 1e-6);
        assert!(step.reward < 0.0);
        assert!(!step.is_done());

        // Actions are clamped by the environment.
        let (step, _) = env.step(&[-5.0])?;
        assert!((step.obs[1] + 0.19).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_point_env_termination() -> Result<()> {
        let config = PointEnvConfig::default().init_pos(9.95);
        let mut env = PointEnv::build(&config, 0)?;
        env.reset()?;
        let (step, _) = env.step(&[1.0])?;
        assert!(step.is_terminated);

        let config = PointEnvConfig::default().max_steps(2);
        let mut env = PointEnv::build(&config, 0)?;
        env.reset()?;
        assert!(!env.step(&[0.0])?.0.is_truncated);
        assert!(env.step(&[0.0])?.0.is_truncated);
        Ok(())
    }

    #[test]
    fn test_point_env_action_shape() -> Result<()> {
        let mut env = PointEnv::build(&PointEnvConfig::default(), 0)?;
        env.reset()?;
        assert!(env.step(&[0.0, 0.0]).is_err());
        Ok(())
    }
}
