//! Deterministic actor.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{hard_update, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Actor`].
pub struct ActorConfig<P: OutDim> {
    /// Configuration of the policy network.
    pub pi_config: Option<P>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Actions are `max_action * tanh(pi(s))`.
    pub max_action: f64,
}

impl<P: OutDim> Default for ActorConfig<P> {
    fn default() -> Self {
        Self {
            pi_config: None,
            opt_config: OptimizerConfig::Adam {
                lr: 1e-4,
                weight_decay: 0.0,
            },
            max_action: 1.0,
        }
    }
}

impl<P> ActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations for the policy network.
    pub fn pi_config(mut self, v: P) -> Self {
        self.pi_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(pi_config) = &mut self.pi_config {
            pi_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the bound of the actions.
    pub fn max_action(mut self, v: f64) -> Self {
        self.max_action = v;
        self
    }

    /// Loads [`ActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Deterministic policy `s -> max_action * tanh(pi(s))`.
///
/// The output layer of the policy network should have no activation; the
/// actor squashes it into `[-max_action, max_action]`.
pub struct Actor<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    device: Device,
    varmap: VarMap,

    // Dimension of the action vector.
    out_dim: usize,

    // Policy network
    pi_config: P::Config,
    pi: P,

    // Optimizer
    opt_config: OptimizerConfig,
    opt: Optimizer,

    max_action: f64,
}

impl<P> Actor<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Actor`].
    pub fn build(config: ActorConfig<P::Config>, device: Device) -> Result<Actor<P>> {
        let pi_config = config.pi_config.context("pi_config is not set.")?;
        Self::build_with(pi_config, config.opt_config, config.max_action, device)
    }

    fn build_with(
        pi_config: P::Config,
        opt_config: OptimizerConfig,
        max_action: f64,
        device: Device,
    ) -> Result<Self> {
        let out_dim = pi_config.get_out_dim();
        let varmap = VarMap::new();
        let pi = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("actor");
            P::build(vb, pi_config.clone())?
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            out_dim,
            pi_config,
            pi,
            opt_config,
            opt,
            max_action,
        })
    }

    /// Returns a copy with its own parameters, used as a target network.
    pub fn try_clone(&self) -> Result<Self> {
        let actor = Self::build_with(
            self.pi_config.clone(),
            self.opt_config.clone(),
            self.max_action,
            self.device.clone(),
        )?;
        hard_update(&actor.varmap, &self.varmap)?;
        Ok(actor)
    }

    /// Returns actions of shape `(batch_size, action_dimension)`.
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        let a = self.pi.forward(obs)?;
        debug_assert_eq!(a.dims(), &[obs.dims()[0], self.out_dim]);
        Ok((a.tanh()? * self.max_action)?)
    }

    /// Returns the dimension of actions.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Returns the bound of actions.
    pub fn max_action(&self) -> f64 {
        self.max_action
    }

    /// Returns the parameters.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Updates the parameters, clipping the gradient norm if `clip` is given.
    ///
    /// Returns the gradient norm before clipping.
    pub fn backward_step(&mut self, loss: &Tensor, clip: Option<f64>) -> Result<f32> {
        self.opt.backward_step_clip(loss, clip)
    }

    /// Save variables to prefix + ".pt".
    pub fn save(&self, prefix: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("pt");
        self.varmap.save(path.as_path())?;
        info!("Save actor parameters to {:?}", path);

        Ok(path)
    }

    /// Load variables from prefix + ".pt".
    pub fn load(&mut self, prefix: impl AsRef<Path>) -> Result<()> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("pt");
        self.varmap.load(path.as_path())?;
        info!("Load actor parameters from {:?}", path);

        Ok(())
    }
}
