// FullConn — Fully-connected layer
//
// Every output feature is a weighted sum over all rows·cols·chls input
// values of one batch item:
//
//   dst = W · flatten(src) + b
//
// PARAMETER SHAPES:
//
//   weight: (flts, rows·cols·chls, 1, 1)
//   bias:   (flts, 1, 1, 1)
//
// Output shape is (flts, 1, 1, nums).

use kestrel_core::backend::Backend;
use kestrel_core::error::{Error, Result};
use kestrel_core::random::{Init, Initializer};
use kestrel_core::tensor::Tensor;

use crate::layer::{delegate_base, Layer, LayerBase};
use crate::layer_spec::LayerSpec;

/// A fully-connected layer.
pub struct FullConn<B: Backend> {
    base: LayerBase<B>,
    weight: Tensor<B>,
    bias: Tensor<B>,
}

impl<B: Backend> FullConn<B> {
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        let base = LayerBase::new(spec, device, src, dst)?;
        base.check_planned_output()?;
        let (w_shape, b_shape) = spec
            .param_shapes(src.shape())?
            .ok_or_else(|| Error::msg("fully-connected layer without parameters"))?;
        let weight = Tensor::zeros(w_shape, &base.device)?;
        let bias = Tensor::zeros(b_shape, &base.device)?;
        Ok(FullConn { base, weight, bias })
    }

    /// Flattened input features per batch item.
    pub fn in_features(&self) -> usize {
        self.weight.shape().cols()
    }

    pub fn out_features(&self) -> usize {
        self.base.spec.flts
    }

    pub fn weight(&self) -> &Tensor<B> {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor<B> {
        &self.bias
    }

    pub fn weight_mut(&mut self) -> &mut Tensor<B> {
        &mut self.weight
    }

    pub fn bias_mut(&mut self) -> &mut Tensor<B> {
        &mut self.bias
    }
}

impl<B: Backend> Layer<B> for FullConn<B> {
    delegate_base!();

    fn params(&self) -> Vec<&Tensor<B>> {
        vec![&self.weight, &self.bias]
    }

    fn init_params(&mut self, rng: &mut Initializer) -> Result<()> {
        rng.fill(
            &mut self.weight,
            Init::Gaussian {
                mean: 0.0,
                std: f64::from(self.base.spec.sigma),
            },
        )?;
        self.bias.mem_set(0)
    }
}
