//! Configuration of DDPG agent.
use crate::{actor::ActorConfig, critic::CriticConfig, util::OutDim, Device};
use anyhow::Result;
use deep_control_core::error::ControlError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Ddpg`](super::Ddpg).
///
/// `QC` and `PC` are the configurations of the critic and the policy
/// networks.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DdpgConfig<QC, PC: OutDim> {
    /// Configuration of the actor.
    pub actor_config: ActorConfig<PC>,

    /// Configuration of the critic.
    pub critic_config: CriticConfig<QC>,

    /// Discount factor.
    pub gamma: f64,

    /// Soft update coefficient of the target networks, in `(0, 1]`.
    pub tau: f64,

    /// Batch size for training.
    pub batch_size: usize,

    /// Maximum norm of the gradients of the actor.
    pub actor_clip: Option<f64>,

    /// Maximum norm of the gradients of the critic.
    pub critic_clip: Option<f64>,

    /// Device used for the actor and critic models.
    pub device: Device,
}

impl<QC, PC: OutDim> Default for DdpgConfig<QC, PC> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            tau: 0.005,
            batch_size: 256,
            actor_clip: None,
            critic_clip: None,
            device: Device::Cpu,
        }
    }
}

impl<QC, PC> DdpgConfig<QC, PC>
where
    QC: serde::de::DeserializeOwned + Serialize,
    PC: serde::de::DeserializeOwned + Serialize + OutDim,
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

    /// Soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Learning rate of the actor.
    pub fn actor_lr(mut self, v: f64) -> Self {
        self.actor_config.opt_config = self.actor_config.opt_config.learning_rate(v);
        self
    }

    /// Learning rate of the critic.
    pub fn critic_lr(mut self, v: f64) -> Self {
        self.critic_config.opt_config = self.critic_config.opt_config.learning_rate(v);
        self
    }

    /// L2 weight decay of the actor.
    pub fn actor_l2(mut self, v: f64) -> Self {
        self.actor_config.opt_config = self.actor_config.opt_config.weight_decay(v);
        self
    }

    /// L2 weight decay of the critic.
    pub fn critic_l2(mut self, v: f64) -> Self {
        self.critic_config.opt_config = self.critic_config.opt_config.weight_decay(v);
        self
    }

    /// Gradient norm clipping of the actor.
    pub fn actor_clip(mut self, v: Option<f64>) -> Self {
        self.actor_clip = v;
        self
    }

    /// Gradient norm clipping of the critic.
    pub fn critic_clip(mut self, v: Option<f64>) -> Self {
        self.critic_clip = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Loads [`DdpgConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DdpgConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

impl<QC, PC: OutDim> DdpgConfig<QC, PC> {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_common(self.gamma, self.tau, self.batch_size)
    }
}

pub(crate) fn validate_common(gamma: f64, tau: f64, batch_size: usize) -> Result<()> {
    if !(tau > 0.0 && tau <= 1.0) {
        return Err(ControlError::InvalidConfig(format!("tau must be in (0, 1], got {}", tau)).into());
    }
    if !(0.0..=1.0).contains(&gamma) {
        return Err(ControlError::InvalidConfig(format!("gamma must be in [0, 1], got {}", gamma)).into());
    }
    if batch_size == 0 {
        return Err(ControlError::InvalidConfig("batch_size must be positive".into()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mlp::MlpConfig, opt::OptimizerConfig, Activation};
    use tempdir::TempDir;

    type Config = DdpgConfig<MlpConfig, MlpConfig>;

    #[test]
    fn test_serde_ddpg_config() -> Result<()> {
        let config = Config::default()
            .actor_config(ActorConfig::default().pi_config(MlpConfig::new(
                3,
                vec![64, 64],
                1,
                Activation::None,
            )))
            .critic_config(CriticConfig::default().q_config(MlpConfig::new(
                4,
                vec![64, 64],
                1,
                Activation::None,
            )))
            .actor_l2(1e-4)
            .critic_clip(Some(10.0))
            .batch_size(64);

        let dir = TempDir::new("ddpg_config")?;
        let path = dir.path().join("ddpg_config.yaml");
        config.save(&path)?;
        let config_ = Config::load(&path)?;
        assert_eq!(config, config_);
        assert_eq!(
            config_.actor_config.opt_config,
            OptimizerConfig::Adam {
                lr: 1e-4,
                weight_decay: 1e-4
            }
        );
        Ok(())
    }

    #[test]
    fn test_validate_tau() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::default().tau(0.0).validate().is_err());
        assert!(Config::default().tau(1.5).validate().is_err());
        assert!(Config::default().tau(1.0).validate().is_ok());
    }
}
