// Activation layers — Neuron and Softmax
//
// Both are shape-preserving and parameterless: dst has exactly the shape of
// src. A Neuron node is usually inserted implicitly by the graph builder
// after a layer whose `neuron_t` is positive; `neuron_t` selects the
// activation function.

use kestrel_core::backend::Backend;
use kestrel_core::error::Result;
use kestrel_core::tensor::Tensor;

use crate::layer::{delegate_base, Layer, LayerBase};
use crate::layer_spec::LayerSpec;

/// Elementwise activation.
pub struct Neuron<B: Backend> {
    base: LayerBase<B>,
}

impl<B: Backend> Neuron<B> {
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        let base = LayerBase::new(spec, device, src, dst)?;
        base.expect_dst(*src.shape())?;
        Ok(Neuron { base })
    }

    /// Activation function selector.
    pub fn neuron_type(&self) -> i32 {
        self.base.spec.neuron
    }
}

impl<B: Backend> Layer<B> for Neuron<B> {
    delegate_base!();
}

/// Softmax over the class axis.
pub struct Softmax<B: Backend> {
    base: LayerBase<B>,
}

impl<B: Backend> Softmax<B> {
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        let base = LayerBase::new(spec, device, src, dst)?;
        base.expect_dst(*src.shape())?;
        Ok(Softmax { base })
    }
}

impl<B: Backend> Layer<B> for Softmax<B> {
    delegate_base!();
}
