// Layer trait — The interface every instantiated layer implements
//
// A layer is a LayerSpec bound to a device and to two node buffers: it reads
// node `src` and writes node `dst`. The node buffers belong to the network;
// a layer only holds Borrowed views of them, so dropping a layer never
// releases node memory.
//
// Trainable layers additionally own their weight and bias tensors, which are
// allocated on the layer's device when the layer is created.
//
// GENERIC OVER BACKEND:
//
// Layers are generic over B: Backend, so the same network plan instantiates
// on the host or on an accelerator. The numeric forward/backward passes are
// driven by the training loop through the tensors exposed here.

use kestrel_core::backend::{Backend, BackendDevice};
use kestrel_core::error::{Error, Result};
use kestrel_core::random::Initializer;
use kestrel_core::shape::Shape;
use kestrel_core::tensor::Tensor;

use crate::layer_spec::{LayerKind, LayerSpec};

/// Common interface of all seven layer kinds.
pub trait Layer<B: Backend> {
    /// The LayerSpec this layer was created from.
    fn spec(&self) -> &LayerSpec;

    /// Ordinal of the device the layer lives on.
    fn device_id(&self) -> usize;

    /// View of the input node buffer.
    fn src(&self) -> &Tensor<B>;

    /// View of the output node buffer.
    fn dst(&self) -> &Tensor<B>;

    /// Trainable tensors, weight first. Empty for parameterless layers.
    fn params(&self) -> Vec<&Tensor<B>> {
        Vec::new()
    }

    /// Initialize the parameters from scratch. No-op for parameterless layers.
    fn init_params(&mut self, _rng: &mut Initializer) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> LayerKind {
        self.spec().kind
    }

    fn is_trainable(&self) -> bool {
        self.kind().is_trainable()
    }

    fn is_frozen(&self) -> bool {
        self.spec().frozen
    }

    /// Total element count over all parameters.
    fn num_parameters(&self) -> usize {
        self.params().iter().map(|p| p.size()).sum()
    }

    /// Log the one-line model summary for this layer.
    fn model_info(&self) {
        let spec = self.spec();
        tracing::info!("\tModel initialized\t{}\t{:.2}", spec.describe(), spec.sigma);
    }
}

/// State shared by every layer: spec, device and node views.
pub struct LayerBase<B: Backend> {
    pub spec: LayerSpec,
    pub device: B::Device,
    pub src: Tensor<B>,
    pub dst: Tensor<B>,
}

impl<B: Backend> LayerBase<B> {
    /// Bind `spec` to views of the two node buffers.
    ///
    /// Both buffers must be allocated on `device`.
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        for node in [src, dst] {
            match node.device_id() {
                None => return Err(Error::EmptyTensor),
                Some(id) if id != device.ordinal() => {
                    return Err(Error::msg(format!(
                        "{} layer {}→{} is placed on device {} but its node lives on device {}",
                        spec.kind,
                        spec.src,
                        spec.dst,
                        device.ordinal(),
                        id
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(LayerBase {
            spec: spec.clone(),
            device: device.clone(),
            src: src.create_view(),
            dst: dst.create_view(),
        })
    }

    pub fn device_id(&self) -> usize {
        self.device.ordinal()
    }

    /// Check that the destination buffer has the shape this layer produces.
    pub fn expect_dst(&self, expected: Shape) -> Result<()> {
        if *self.dst.shape() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                got: *self.dst.shape(),
            });
        }
        Ok(())
    }

    /// Check the planned output shape against the destination buffer.
    pub fn check_planned_output(&self) -> Result<()> {
        let planned = self.spec.output_shape(self.src.shape())?;
        self.expect_dst(planned)
    }
}

/// Implements the four accessor methods of [`Layer`] by delegating to a
/// `base: LayerBase<B>` field.
macro_rules! delegate_base {
    () => {
        fn spec(&self) -> &$crate::layer_spec::LayerSpec {
            &self.base.spec
        }

        fn device_id(&self) -> usize {
            self.base.device_id()
        }

        fn src(&self) -> &kestrel_core::tensor::Tensor<B> {
            &self.base.src
        }

        fn dst(&self) -> &kestrel_core::tensor::Tensor<B> {
            &self.base.dst
        }
    };
}

pub(crate) use delegate_base;
