//! Ornstein-Uhlenbeck exploration noise.
use crate::error::ControlError;
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Configuration of [`OrnsteinUhlenbeck`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct OuNoiseConfig {
    /// Rate of mean reversion.
    pub theta: f32,

    /// Long-run mean.
    pub mu: f32,

    /// Time step of the discretized process.
    pub dt: f32,

    /// Volatility at the first sample.
    pub sigma_start: f32,

    /// Volatility after annealing.
    pub sigma_final: f32,

    /// Number of samples over which `sigma` moves from `sigma_start` to
    /// `sigma_final`.
    pub sigma_anneal: usize,

    /// Random seed.
    pub seed: u64,
}

impl Default for OuNoiseConfig {
    fn default() -> Self {
        Self {
            theta: 0.15,
            mu: 0.0,
            dt: 1.0,
            sigma_start: 0.2,
            sigma_final: 0.1,
            sigma_anneal: 100_000,
            seed: 42,
        }
    }
}

impl OuNoiseConfig {
    /// Sets the rate of mean reversion.
    pub fn theta(mut self, theta: f32) -> Self {
        self.theta = theta;
        self
    }

    /// Sets the long-run mean.
    pub fn mu(mut self, mu: f32) -> Self {
        self.mu = mu;
        self
    }

    /// Sets the time step.
    pub fn dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    /// Sets the schedule of `sigma`.
    pub fn sigma(mut self, sigma_start: f32, sigma_final: f32, sigma_anneal: usize) -> Self {
        self.sigma_start = sigma_start;
        self.sigma_final = sigma_final;
        self.sigma_anneal = sigma_anneal;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) || self.sigma_start < 0.0 || self.sigma_final < 0.0 {
            return Err(ControlError::InvalidConfig(format!(
                "OU noise needs dt > 0 and non-negative sigma, got dt = {}, sigma = {} -> {}",
                self.dt, self.sigma_start, self.sigma_final
            ))
            .into());
        }
        Ok(())
    }
}

/// Temporally correlated noise added to deterministic actions.
///
/// Each element follows
/// `x <- x + theta * (mu - x) * dt + sigma * sqrt(dt) * N(0, 1)`,
/// where `sigma` is annealed linearly with the number of samples drawn.
#[derive(Debug, Clone)]
pub struct OrnsteinUhlenbeck {
    config: OuNoiseConfig,
    x: Vec<f32>,
    n_steps: usize,
    rng: StdRng,
}

impl OrnsteinUhlenbeck {
    /// Creates a process over vectors of length `size`, starting at zero.
    pub fn new(config: &OuNoiseConfig, size: usize) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            x: vec![0.0; size],
            n_steps: 0,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Returns the volatility used by the next sample.
    pub fn sigma(&self) -> f32 {
        let c = &self.config;
        if c.sigma_anneal == 0 {
            return c.sigma_final;
        }
        let t = (self.n_steps as f32 / c.sigma_anneal as f32).min(1.0);
        c.sigma_start + (c.sigma_final - c.sigma_start) * t
    }

    /// Returns the number of samples drawn so far.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Returns the current state without advancing the process.
    pub fn state(&self) -> &[f32] {
        &self.x
    }

    /// Advances the process by one step and returns the new state.
    pub fn sample(&mut self) -> Vec<f32> {
        let OuNoiseConfig { theta, mu, dt, .. } = self.config;
        let sigma = self.sigma();
        let sqrt_dt = dt.sqrt();
        for x in self.x.iter_mut() {
            let n: f32 = self.rng.sample(StandardNormal);
            *x += theta * (mu - *x) * dt + sigma * sqrt_dt * n;
        }
        self.n_steps += 1;
        self.x.clone()
    }

    /// Puts the state back to zero. The anneal counter is kept.
    pub fn reset_states(&mut self) {
        self.x.iter_mut().for_each(|x| *x = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigma_anneal() -> Result<()> {
        let config = OuNoiseConfig::default().sigma(0.2, 0.1, 100);
        let mut noise = OrnsteinUhlenbeck::new(&config, 2)?;
        assert_eq!(noise.sigma(), 0.2);
        (0..50).for_each(|_| {
            noise.sample();
        });
        assert!((noise.sigma() - 0.15).abs() < 1e-6);
        (0..50).for_each(|_| {
            noise.sample();
        });
        assert!((noise.sigma() - 0.1).abs() < 1e-6);
        (0..100).for_each(|_| {
            noise.sample();
        });
        assert!((noise.sigma() - 0.1).abs() < 1e-6);
        assert_eq!(noise.n_steps(), 200);
        Ok(())
    }

    #[test]
    fn test_reset_keeps_counter() -> Result<()> {
        let mut noise = OrnsteinUhlenbeck::new(&OuNoiseConfig::default(), 3)?;
        let x = noise.sample();
        assert_eq!(x.len(), 3);
        noise.reset_states();
        assert_eq!(noise.state(), &[0.0; 3]);
        assert_eq!(noise.n_steps(), 1);
        Ok(())
    }

    #[test]
    fn test_zero_sigma_decays_to_mu() -> Result<()> {
        let config = OuNoiseConfig::default().mu(1.0).sigma(0.0, 0.0, 0);
        let mut noise = OrnsteinUhlenbeck::new(&config, 1)?;
        let x1 = noise.sample()[0];
        assert!((x1 - 0.15).abs() < 1e-6);
        let x = (0..200).map(|_| noise.sample()[0]).last().unwrap();
        assert!((x - 1.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_seeded_reproducibility() -> Result<()> {
        let config = OuNoiseConfig::default().seed(7);
        let mut a = OrnsteinUhlenbeck::new(&config, 2)?;
        let mut b = OrnsteinUhlenbeck::new(&config, 2)?;
        for _ in 0..10 {
            assert_eq!(a.sample(), b.sample());
        }
        Ok(())
    }

    #[test]
    fn test_theta_sets_mean_reversion() -> Result<()> {
        // Without volatility the state approaches mu as 1 - (1 - theta dt)^n.
        for theta in [0.15f32, 0.5] {
            let config = OuNoiseConfig::default().theta(theta).mu(1.0).dt(0.1).sigma(0.0, 0.0, 1);
            let mut noise = OrnsteinUhlenbeck::new(&config, 1)?;
            (0..10).for_each(|_| {
                noise.sample();
            });
            let expected = 1.0 - (1.0 - theta * 0.1).powi(10);
            assert!((noise.state()[0] - expected).abs() < 1e-5);
        }
        Ok(())
    }
}
