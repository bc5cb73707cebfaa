// LayerFactory — dispatch from a layer kind to a concrete layer
//
// One case per LayerKind. The factory only constructs: it neither reads nor
// changes the graph the LayerSpec came from. Unknown names never reach it, since
// LayerKind can only be built from an accepted name.

use kestrel_core::backend::Backend;
use kestrel_core::error::Result;
use kestrel_core::tensor::Tensor;

use crate::activation::{Neuron, Softmax};
use crate::conv::{Convolution, Pooling};
use crate::dropout::Dropout;
use crate::fullc::FullConn;
use crate::layer::Layer;
use crate::layer_spec::{LayerKind, LayerSpec};
use crate::loss::Loss;

/// Instantiate the layer described by `spec` on `device`, reading `src` and
/// writing `dst`.
pub fn create_layer<B: Backend>(
    spec: &LayerSpec,
    device: &B::Device,
    src: &Tensor<B>,
    dst: &Tensor<B>,
) -> Result<Box<dyn Layer<B>>> {
    let layer: Box<dyn Layer<B>> = match spec.kind {
        LayerKind::Convolution => Box::new(Convolution::new(spec, device, src, dst)?),
        LayerKind::Dropout => Box::new(Dropout::new(spec, device, src, dst)?),
        LayerKind::FullConn => Box::new(FullConn::new(spec, device, src, dst)?),
        LayerKind::Loss => Box::new(Loss::new(spec, device, src, dst)?),
        LayerKind::Neuron => Box::new(Neuron::new(spec, device, src, dst)?),
        LayerKind::Pooling => Box::new(Pooling::new(spec, device, src, dst)?),
        LayerKind::Softmax => Box::new(Softmax::new(spec, device, src, dst)?),
    };
    tracing::debug!(kind = %spec.kind, src = spec.src, dst = spec.dst, "layer created");
    Ok(layer)
}
