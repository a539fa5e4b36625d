//! Configuration of SAC agent.
use super::EntCoefMode;
use crate::{
    actor::ActorConfig, critic::CriticConfig, ddpg::validate_common, util::OutDim, Device,
};
use anyhow::Result;
use deep_control_core::error::ControlError;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Sac`](super::Sac).
///
/// The policy network gives the mean and the log standard deviation of the
/// Gaussian before squashing, so its output dimension is the action
/// dimension. `actor_config.max_action` scales the squashed actions.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SacConfig<QC, PC: OutDim> {
    /// Configuration of the actor.
    pub actor_config: ActorConfig<PC>,

    /// Configuration of the critics.
    pub critic_config: CriticConfig<QC>,

    /// Discount factor.
    pub gamma: f64,

    /// Soft update coefficient of the target critics.
    pub tau: f64,

    /// Batch size for training.
    pub batch_size: usize,

    pub actor_clip: Option<f64>,
    pub critic_clip: Option<f64>,

    /// How to update the entropy coefficient.
    pub ent_coef_mode: EntCoefMode,

    /// Lower bound of the log standard deviation.
    pub min_lstd: f64,

    /// Upper bound of the log standard deviation.
    pub max_lstd: f64,

    /// Offset inside the log of the `tanh` correction.
    pub epsilon: f64,

    /// Seed of the policy noise.
    pub seed: u64,

    /// Device used for the actor and critic models.
    pub device: Device,
}

impl<QC, PC: OutDim> Default for SacConfig<QC, PC> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            tau: 0.005,
            batch_size: 256,
            actor_clip: None,
            critic_clip: None,
            ent_coef_mode: EntCoefMode::default(),
            min_lstd: -10.0,
            max_lstd: 2.0,
            epsilon: 1e-6,
            seed: 42,
            device: Device::Cpu,
        }
    }
}

impl<QC, PC> SacConfig<QC, PC>
where
    QC: DeserializeOwned + Serialize,
    PC: DeserializeOwned + Serialize + OutDim,
{
    /// Configuration of actor.
    pub fn actor_config(mut self, actor_config: ActorConfig<PC>) -> Self {
        self.actor_config = actor_config;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, critic_config: CriticConfig<QC>) -> Self {
        self.critic_config = critic_config;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    pub fn actor_lr(mut self, v: f64) -> Self {
        self.actor_config.opt_config = self.actor_config.opt_config.learning_rate(v);
        self
    }

    pub fn critic_lr(mut self, v: f64) -> Self {
        self.critic_config.opt_config = self.critic_config.opt_config.learning_rate(v);
        self
    }

    pub fn actor_l2(mut self, v: f64) -> Self {
        self.actor_config.opt_config = self.actor_config.opt_config.weight_decay(v);
        self
    }

    pub fn critic_l2(mut self, v: f64) -> Self {
        self.critic_config.opt_config = self.critic_config.opt_config.weight_decay(v);
        self
    }

    pub fn actor_clip(mut self, v: Option<f64>) -> Self {
        self.actor_clip = v;
        self
    }

    pub fn critic_clip(mut self, v: Option<f64>) -> Self {
        self.critic_clip = v;
        self
    }

    /// SAC-alpha.
    pub fn ent_coef_mode(mut self, v: EntCoefMode) -> Self {
        self.ent_coef_mode = v;
        self
    }

    /// Bounds of the log standard deviation.
    pub fn lstd_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_lstd = min;
        self.max_lstd = max;
        self
    }

    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Constructs [`SacConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`SacConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC agent into {:?}", path_);
        Ok(())
    }
}

impl<QC, PC: OutDim> SacConfig<QC, PC> {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_common(self.gamma, self.tau, self.batch_size)?;
        if self.min_lstd >= self.max_lstd {
            return Err(ControlError::InvalidConfig(format!(
                "min_lstd ({}) must be less than max_lstd ({})",
                self.min_lstd, self.max_lstd
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mlp::MlpConfig, Activation};
    use tempdir::TempDir;

    type Config = SacConfig<MlpConfig, MlpConfig>;

    #[test]
    fn test_serde_sac_config() -> Result<()> {
        let config = Config::default()
            .actor_config(ActorConfig::default().pi_config(MlpConfig::new(
                2,
                vec![16],
                1,
                Activation::None,
            )))
            .ent_coef_mode(EntCoefMode::Fix(0.05))
            .lstd_bounds(-5.0, 1.0);
        let dir = TempDir::new("sac_config")?;
        let path = dir.path().join("sac_config.yaml");
        config.save(&path)?;
        assert_eq!(Config::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_validate_lstd_bounds() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::default().lstd_bounds(1.0, 1.0).validate().is_err());
    }
}
