//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::{
    adam::{Adam, ParamsAdam},
    Decay,
};
use log::trace;
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// AdamW optimizer.
    AdamW {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },

    /// Adam optimizer with L2 penalty added to the gradients.
    Adam {
        /// Learning rate.
        lr: f64,

        /// Coefficient of L2 weight decay.
        #[serde(default)]
        weight_decay: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs the optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                let opt = AdamW::new(vars.clone(), params)?;
                Ok(Optimizer::AdamW(opt, vars))
            }
            OptimizerConfig::Adam { lr, weight_decay } => {
                let weight_decay = match *weight_decay {
                    wd if wd > 0.0 => Some(Decay::WeightDecay(wd)),
                    _ => None,
                };
                let params = ParamsAdam {
                    lr: *lr,
                    weight_decay,
                    ..ParamsAdam::default()
                };
                let opt = Adam::new(vars.clone(), params)?;
                Ok(Optimizer::Adam(opt, vars))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::AdamW {
                lr: _,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            },
            Self::Adam {
                lr: _,
                weight_decay,
            } => Self::Adam { lr, weight_decay },
        }
    }

    /// Override the coefficient of weight decay.
    pub fn weight_decay(self, weight_decay: f64) -> Self {
        match self {
            Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay: _,
            } => Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            },
            Self::Adam { lr, weight_decay: _ } => Self::Adam { lr, weight_decay },
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            lr: 1e-3,
            weight_decay: 0.0,
        }
    }
}

/// Optimizers.
///
/// This is a thin wrapper of the optimizers of candle, holding the
/// variables to be optimized.
pub enum Optimizer {
    /// AdamW optimizer.
    AdamW(AdamW, Vec<Var>),

    /// Adam optimizer.
    Adam(Adam, Vec<Var>),
}

impl Optimizer {
    fn vars(&self) -> &[Var] {
        match self {
            Self::AdamW(_, vars) => vars,
            Self::Adam(_, vars) => vars,
        }
    }

    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt, _) => Ok(opt.backward_step(loss)?),
            Self::Adam(opt, _) => Ok(opt.backward_step(loss)?),
        }
    }

    /// Applies a backward step pass, rescaling the gradients so that their
    /// global L2 norm does not exceed `max_norm`.
    ///
    /// Returns the norm of the gradients before clipping.
    pub fn backward_step_clip(&mut self, loss: &Tensor, max_norm: Option<f64>) -> Result<f32> {
        let mut grads = loss.backward()?;
        let norm = crate::util::clip_grad_norm(&mut grads, self.vars(), max_norm)?;
        trace!("Gradient norm: {}", norm);
        self.step(&grads)?;
        Ok(norm)
    }

    /// Updates the variables with the given gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::AdamW(opt, _) => Ok(opt.step(grads)?),
            Self::Adam(opt, _) => Ok(opt.step(grads)?),
        }
    }
}
