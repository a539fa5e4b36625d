use super::MlpConfig;
use crate::model::SubModel1;
use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// Multilayer perceptron with two heads of the same size.
///
/// The hidden layers are shared and use ReLU. The heads give the mean and
/// the log standard deviation of a Gaussian policy. `activation_out` of the
/// config is not used.
pub struct Mlp2 {
    device: Device,
    layers: Vec<Linear>,
    head_mean: Linear,
    head_lstd: Linear,
}

impl SubModel1 for Mlp2 {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn forward(&self, xs: &Self::Input) -> Result<Self::Output> {
        let mut xs = xs.to_device(&self.device)?;
        for layer in self.layers.iter() {
            xs = layer.forward(&xs)?.relu()?;
        }
        let mean = self.head_mean.forward(&xs)?;
        let lstd = self.head_lstd.forward(&xs)?;
        Ok((mean, lstd))
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let mut dims = vec![config.in_dim];
        dims.extend(config.units.iter().cloned());
        let last = *config.units.last().context("Mlp2 needs a hidden layer")?;

        let vs_mlp = vs.pp("mlp");
        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, w)| -> Result<Linear> { Ok(linear(w[0], w[1], vs_mlp.pp(format!("ln{}", i)))?) })
            .collect::<Result<Vec<_>>>()?;
        let head_mean = linear(last, config.out_dim, vs.pp("mean"))?;
        let head_lstd = linear(last, config.out_dim, vs.pp("lstd"))?;

        Ok(Self {
            device,
            layers,
            head_mean,
            head_lstd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Activation;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_mlp2_heads() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp2::build(vb, MlpConfig::new(3, vec![8], 2, Activation::None))?;
        // one hidden layer and two heads, weight and bias each
        assert_eq!(varmap.all_vars().len(), 6);

        let xs = Tensor::ones((4, 3), DType::F32, &Device::Cpu)?;
        let (mean, lstd) = mlp.forward(&xs)?;
        assert_eq!(mean.dims(), &[4, 2]);
        assert_eq!(lstd.dims(), &[4, 2]);
        Ok(())
    }

    #[test]
    fn test_mlp2_needs_hidden_layer() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        assert!(Mlp2::build(vb, MlpConfig::new(3, vec![], 2, Activation::None)).is_err());
    }
}
