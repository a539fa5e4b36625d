//! Stochastic actor of SAC agent.
use crate::{
    actor::ActorConfig,
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Log density of the standard normal distribution summed over the last
/// axis, keeping it. `z` is the standardized sample.
fn standard_normal_logp(z: &Tensor) -> Result<Tensor> {
    let c = -0.5 * (2.0 * std::f64::consts::PI).ln();
    Ok(((z.sqr()? * -0.5)? + c)?.sum_keepdim(D::Minus1)?)
}

/// Gaussian policy squashed by `tanh`, scaled by `max_action`.
pub struct GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    varmap: VarMap,
    out_dim: usize,
    pi: P,
    opt: Optimizer,
    max_action: f64,
    min_lstd: f64,
    max_lstd: f64,
}

impl<P> GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`GaussianActor`]. The log standard deviation given by the
    /// network is clamped into `[min_lstd, max_lstd]`.
    pub fn build(
        config: ActorConfig<P::Config>,
        min_lstd: f64,
        max_lstd: f64,
        device: Device,
    ) -> Result<Self> {
        let pi_config = config.pi_config.context("pi_config is not set.")?;
        let out_dim = pi_config.get_out_dim();
        let varmap = VarMap::new();
        let pi = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("actor");
            P::build(vb, pi_config)?
        };
        let opt_config: OptimizerConfig = config.opt_config;
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            out_dim,
            pi,
            opt,
            max_action: config.max_action,
            min_lstd,
            max_lstd,
        })
    }

    /// Returns the mean and the clamped log standard deviation before
    /// squashing.
    pub fn forward(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, lstd) = self.pi.forward(obs)?;
        debug_assert_eq!(mean.dims(), &[obs.dims()[0], self.out_dim]);
        let lstd = lstd.clamp(self.min_lstd, self.max_lstd)?;
        Ok((mean, lstd))
    }

    /// Returns the squashed mean action, used in evaluation.
    pub fn deterministic(&self, obs: &Tensor) -> Result<Tensor> {
        let (mean, _) = self.forward(obs)?;
        Ok((mean.tanh()? * self.max_action)?)
    }

    /// Reparameterized sample given standard normal noise `z` of shape
    /// `[batch_size, out_dim]`.
    ///
    /// Returns the action and its log probability of shape `[batch_size, 1]`,
    /// corrected for the `tanh` squashing and the scaling.
    pub fn sample(&self, obs: &Tensor, z: &Tensor, epsilon: f64) -> Result<(Tensor, Tensor)> {
        let (mean, lstd) = self.forward(obs)?;
        let u = ((lstd.exp()? * z)? + mean)?;
        let a = u.tanh()?;
        let logp_u = (standard_normal_logp(z)? - lstd.sum_keepdim(D::Minus1)?)?;
        let log_det = ((1f64 - a.sqr()?)? + epsilon)?.log()?.sum_keepdim(D::Minus1)?;
        let scale = self.out_dim as f64 * self.max_action.ln();
        let logp = ((logp_u - log_det)? - scale)?;
        Ok(((a * self.max_action)?, logp))
    }

    /// Returns the dimension of actions.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Returns the parameters.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Updates the parameters, returning the gradient norm before clipping.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::{Mlp2, MlpConfig},
        util::to_scalar,
        Activation,
    };

    fn actor(max_action: f64) -> Result<GaussianActor<Mlp2>> {
        let config = ActorConfig::default()
            .pi_config(MlpConfig::new(2, vec![8], 1, Activation::None))
            .max_action(max_action);
        GaussianActor::build(config, -5.0, 2.0, Device::Cpu)
    }

    #[test]
    fn test_sample_is_bounded() -> Result<()> {
        let actor = actor(2.0)?;
        let obs = Tensor::ones((16, 2), DType::F32, &Device::Cpu)?;
        let z = (Tensor::randn(0f32, 1f32, (16, 1), &Device::Cpu)? * 3.0)?;
        let (a, logp) = actor.sample(&obs, &z, 1e-6)?;
        assert_eq!(a.dims(), &[16, 1]);
        assert_eq!(logp.dims(), &[16, 1]);
        let a = a.flatten_all()?.to_vec1::<f32>()?;
        assert!(a.iter().all(|x| x.abs() <= 2.0));
        Ok(())
    }

    #[test]
    fn test_logp_of_mean_action() -> Result<()> {
        // With z = 0 the action is tanh(mean), and the log probability is
        // the Gaussian density at its mean minus the squashing terms.
        let actor = actor(1.0)?;
        let obs = Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?;
        let z = Tensor::zeros((1, 1), DType::F32, &Device::Cpu)?;
        let (a, logp) = actor.sample(&obs, &z, 0.0)?;
        let (mean, lstd) = actor.forward(&obs)?;

        let a = to_scalar(&a)? as f64;
        let mean = to_scalar(&mean)? as f64;
        let lstd = to_scalar(&lstd)? as f64;
        assert!((a - mean.tanh()).abs() < 1e-5);
        let expected = -0.5 * (2.0 * std::f64::consts::PI).ln() - lstd - (1.0 - a * a).ln();
        assert!((to_scalar(&logp)? as f64 - expected).abs() < 1e-4);
        Ok(())
    }
}
