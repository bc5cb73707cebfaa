// Loss — Terminal layer of a network
//
// The loss layer compares the prediction in its src node against the labels
// supplied by the training loop; `loss_t` selects the loss function. Its dst
// node holds the per-element gradient and has the same shape as src.

use kestrel_core::backend::Backend;
use kestrel_core::error::Result;
use kestrel_core::tensor::Tensor;

use crate::layer::{delegate_base, Layer, LayerBase};
use crate::layer_spec::LayerSpec;

pub struct Loss<B: Backend> {
    base: LayerBase<B>,
}

impl<B: Backend> Loss<B> {
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        let base = LayerBase::new(spec, device, src, dst)?;
        base.expect_dst(*src.shape())?;
        Ok(Loss { base })
    }

    /// Loss function selector.
    pub fn loss_type(&self) -> i32 {
        self.base.spec.loss
    }
}

impl<B: Backend> Layer<B> for Loss<B> {
    delegate_base!();
}
