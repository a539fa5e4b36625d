//! Entropy coefficient of SAC.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder, VarMap};
use deep_control_core::error::ControlError;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Mode of the entropy coefficient of SAC.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum EntCoefMode {
    /// Use a constant as alpha.
    Fix(f64),

    /// Tune alpha so that the policy entropy approaches `target_entropy`,
    /// starting from `init_alpha`.
    Auto {
        init_alpha: f64,
        target_entropy: f64,
        lr: f64,
    },
}

impl Default for EntCoefMode {
    fn default() -> Self {
        Self::Auto {
            init_alpha: 0.1,
            target_entropy: -1.0,
            lr: 1e-4,
        }
    }
}

/// The entropy coefficient of SAC, held as `log(alpha)`.
pub struct EntCoef {
    varmap: VarMap,
    log_alpha: Tensor,
    target_entropy: Option<f64>,
    opt: Option<Optimizer>,
}

impl EntCoef {
    /// Constructs an instance of `EntCoef`.
    pub fn new(mode: EntCoefMode, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let (init_alpha, target_entropy, lr) = match mode {
            EntCoefMode::Fix(alpha) => (alpha, None, None),
            EntCoefMode::Auto {
                init_alpha,
                target_entropy,
                lr,
            } => (init_alpha, Some(target_entropy), Some(lr)),
        };
        if init_alpha <= 0.0 {
            return Err(ControlError::InvalidConfig(format!("alpha must be positive, got {}", init_alpha)).into());
        }

        let log_alpha = vb.get_with_hints(1, "log_alpha", Init::Const(init_alpha.ln()))?;
        let opt = match lr {
            Some(lr) => Some(
                OptimizerConfig::default()
                    .learning_rate(lr)
                    .build(varmap.all_vars())?,
            ),
            None => None,
        };

        Ok(Self {
            varmap,
            log_alpha,
            target_entropy,
            opt,
        })
    }

    /// Returns the entropy coefficient, shape `[1]`.
    pub fn alpha(&self) -> Result<Tensor> {
        Ok(self.log_alpha.detach().exp()?)
    }

    /// Returns `true` if alpha is tuned.
    pub fn is_auto(&self) -> bool {
        self.opt.is_some()
    }

    /// Moves alpha given the log probabilities of sampled actions.
    ///
    /// The loss is `-mean(log_alpha * (logp + target_entropy))`. Does
    /// nothing for a fixed alpha.
    pub fn update(&mut self, logp: &Tensor) -> Result<()> {
        if let (Some(target_entropy), Some(opt)) = (self.target_entropy, &mut self.opt) {
            let logp = (logp.flatten_all()? + target_entropy)?.detach();
            let loss = self.log_alpha.broadcast_mul(&logp)?.mean_all()?.neg()?;
            opt.backward_step(&loss)?;
        }
        Ok(())
    }

    /// Save the parameter into a file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save entropy coefficient to {:?}", path.as_ref());
        Ok(())
    }

    /// Load the parameter from a file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load entropy coefficient from {:?}", path.as_ref());
        Ok(())
    }
}
