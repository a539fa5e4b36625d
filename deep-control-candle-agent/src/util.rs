//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::VarMap;
use deep_control_core::error::ControlError;
use log::trace;
use std::{collections::HashMap, sync::MutexGuard};

fn lock(varmap: &VarMap) -> Result<MutexGuard<'_, HashMap<String, Var>>> {
    varmap
        .data()
        .lock()
        .map_err(|e| anyhow!("Failed to lock VarMap: {}", e))
}

/// Returns the source tensor of `name`, checking that its shape matches.
fn source<'a>(src: &'a HashMap<String, Var>, name: &str, dest: &Var) -> Result<&'a Var> {
    let v_src = src
        .get(name)
        .ok_or_else(|| ControlError::shape(format!("missing parameter {}", name), dest.dims(), &[]))?;
    if v_src.dims() != dest.dims() {
        return Err(ControlError::shape(name, dest.dims(), v_src.dims()).into());
    }
    Ok(v_src)
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    let dest = lock(dest)?;
    let src = lock(src)?;

    for (name, v_dest) in dest.iter() {
        let t_src = source(&src, name, v_dest)?.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t)?;
    }
    trace!("Soft update of {} parameters, tau = {}", dest.len(), tau);

    Ok(())
}

/// Copies the variables of `src` to `dest`.
///
/// Variables are identified by their names.
pub fn hard_update(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = lock(dest)?;
    let src = lock(src)?;

    for (name, v_dest) in dest.iter() {
        let t_src = source(&src, name, v_dest)?.as_tensor();
        v_dest.set(t_src)?;
    }

    Ok(())
}

/// Rescales gradients so that their global L2 norm is at most `max_norm`.
///
/// Returns the norm before rescaling. Gradients are left untouched when
/// `max_norm` is `None`.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: Option<f64>) -> Result<f32> {
    let mut sq_sum = 0f32;
    for var in vars.iter() {
        if let Some(g) = grads.get(var) {
            sq_sum += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    let norm = sq_sum.sqrt();

    if let Some(max_norm) = max_norm {
        let scale = max_norm / (norm as f64 + 1e-6);
        if scale < 1.0 {
            for var in vars.iter() {
                if let Some(g) = grads.remove(var) {
                    grads.insert(var, (g * scale)?);
                }
            }
        }
    }

    Ok(norm)
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Returns the scalar value of a tensor with a single element.
pub fn to_scalar(t: &Tensor) -> Result<f32> {
    Ok(t.flatten_all()?.mean_all()?.to_scalar::<f32>()?)
}
