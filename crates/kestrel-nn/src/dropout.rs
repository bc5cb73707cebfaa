// Dropout — Regularization via random zeroing
//
// During training each element of the input is dropped with probability
// `dropout`; kept elements are scaled by 1/(1-dropout) so the expected value
// is unchanged. The layer owns a mask tensor with the shape of its output:
//
//   mask[i] = 0             with probability p
//           = 1 / (1 - p)   otherwise
//
// `resample_mask` draws a fresh mask; the training loop multiplies it in.

use kestrel_core::backend::Backend;
use kestrel_core::error::{Error, Result};
use kestrel_core::random::Initializer;
use kestrel_core::tensor::Tensor;

use crate::layer::{delegate_base, Layer, LayerBase};
use crate::layer_spec::LayerSpec;

/// Dropout with a per-element mask.
pub struct Dropout<B: Backend> {
    base: LayerBase<B>,
    mask: Tensor<B>,
}

impl<B: Backend> Dropout<B> {
    /// Fails unless `spec.dropout` lies in [0, 1).
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        if !(0.0..1.0).contains(&spec.dropout) {
            return Err(Error::msg(format!(
                "dropout probability must be in [0, 1), got {}",
                spec.dropout
            )));
        }
        let base = LayerBase::new(spec, device, src, dst)?;
        base.expect_dst(*src.shape())?;
        let mut mask = Tensor::new(*dst.shape(), &base.device)?;
        mask.init(1.0)?;
        Ok(Dropout { base, mask })
    }

    pub fn ratio(&self) -> f32 {
        self.base.spec.dropout
    }

    pub fn mask(&self) -> &Tensor<B> {
        &self.mask
    }

    /// Draw a new keep/drop mask.
    pub fn resample_mask(&mut self, rng: &mut Initializer) -> Result<()> {
        let p = f64::from(self.ratio());
        let keep = (1.0 / (1.0 - p)) as f32;
        let data: Vec<f32> = (0..self.mask.size())
            .map(|_| if rng.next_unit() < p { 0.0 } else { keep })
            .collect();
        self.mask.write_slice(&data)
    }
}

impl<B: Backend> Layer<B> for Dropout<B> {
    delegate_base!();
}
