//! Configuration of TD3 agent.
use crate::{
    actor::ActorConfig, critic::CriticConfig, ddpg::validate_common, util::OutDim, Device,
};
use anyhow::Result;
use deep_control_core::error::ControlError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Td3`](super::Td3).
///
/// Both critics are built from `critic_config`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Td3Config<QC, PC: OutDim> {
    pub actor_config: ActorConfig<PC>,
    pub critic_config: CriticConfig<QC>,
    pub gamma: f64,
    pub tau: f64,
    pub batch_size: usize,
    pub actor_clip: Option<f64>,
    pub critic_clip: Option<f64>,

    /// Standard deviation of the noise added to target actions.
    pub target_noise: f64,

    /// The target noise is clipped to `[-noise_clip, noise_clip]`.
    pub noise_clip: f64,

    /// The actor and the targets are updated once per `policy_delay`
    /// critic updates.
    pub policy_delay: usize,

    /// Seed of the target noise.
    pub seed: u64,

    pub device: Device,
}

impl<QC, PC: OutDim> Default for Td3Config<QC, PC> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            tau: 0.005,
            batch_size: 256,
            actor_clip: None,
            critic_clip: None,
            target_noise: 0.2,
            noise_clip: 0.5,
            policy_delay: 2,
            seed: 42,
            device: Device::Cpu,
        }
    }
}

impl<QC, PC> Td3Config<QC, PC>
where
    QC: DeserializeOwned + Serialize,
    PC: DeserializeOwned + Serialize + OutDim,
{
    pub fn actor_config(mut self, actor_config: ActorConfig<PC>) -> Self {
        self.actor_config = actor_config;
        self
    }

    pub fn critic_config(mut self, critic_config: CriticConfig<QC>) -> Self {
        self.critic_config = critic_config;
        self
    }

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

    /// Standard deviation and clipping bound of the target noise.
    pub fn target_noise(mut self, std: f64, clip: f64) -> Self {
        self.target_noise = std;
        self.noise_clip = clip;
        self
    }

    pub fn policy_delay(mut self, v: usize) -> Self {
        self.policy_delay = v;
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

    /// Loads [`Td3Config`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`Td3Config`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

impl<QC, PC: OutDim> Td3Config<QC, PC> {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_common(self.gamma, self.tau, self.batch_size)?;
        if self.policy_delay == 0 {
            return Err(ControlError::InvalidConfig("policy_delay must be positive".into()).into());
        }
        if self.target_noise < 0.0 || self.noise_clip < 0.0 {
            return Err(ControlError::InvalidConfig(format!(
                "target noise must be non-negative, got std {} and clip {}",
                self.target_noise, self.noise_clip
            ))
            .into());
        }
        Ok(())
    }
}
