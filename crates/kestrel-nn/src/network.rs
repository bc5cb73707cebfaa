// Network — a NetPlan instantiated on one device
//
// Assembly happens in two passes over the plan:
//
//   1. Shape planning. Node 0 gets the plan's input shape; every layer then
//      derives its dst node's shape from its src node's shape. Because the
//      graph is a chain built in order, a layer's src is always planned
//      before the layer is reached.
//   2. Instantiation. All node buffers are allocated, then each layer is
//      created through the factory with views of its two nodes.
//
// The network owns the node buffers; layers only borrow them. Layers are
// declared first so they are dropped before the buffers they view.

use kestrel_core::backend::{Backend, BackendDevice};
use kestrel_core::error::{Error, Result};
use kestrel_core::random::Initializer;
use kestrel_core::shape::Shape;
use kestrel_core::tensor::Tensor;

use crate::factory::create_layer;
use crate::graph::NetPlan;
use crate::layer::Layer;

/// Layers and node buffers of one network replica.
pub struct Network<B: Backend> {
    layers: Vec<Box<dyn Layer<B>>>,
    nodes: Vec<Tensor<B>>,
    device: B::Device,
}

/// Shape of every node buffer, derived from the plan's input shape.
pub fn plan_node_shapes(plan: &NetPlan) -> Result<Vec<Shape>> {
    let mut shapes: Vec<Option<Shape>> = vec![None; plan.num_nodes()];
    if let Some(first) = shapes.first_mut() {
        *first = Some(plan.shape_src);
    }
    for layer in &plan.layers {
        let input = shapes[layer.src].ok_or_else(|| {
            Error::msg(format!(
                "node {} is read by {} before any layer writes it",
                layer.src, layer.kind
            ))
        })?;
        shapes[layer.dst] = Some(layer.output_shape(&input)?);
    }
    shapes
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| Error::msg(format!("node {i} is never written"))))
        .collect()
}

impl<B: Backend> Network<B> {
    /// Allocate node buffers and instantiate every layer of `plan` on `device`.
    pub fn assemble(plan: &NetPlan, device: &B::Device) -> Result<Self> {
        let shapes = plan_node_shapes(plan)?;
        if let Some(out) = shapes.last() {
            if out.extents() != plan.shape_dst.extents() {
                tracing::warn!(
                    planned = %out,
                    expected = %plan.shape_dst,
                    "network output shape differs from the configured class layout"
                );
            }
        }

        let nodes = shapes
            .iter()
            .map(|&s| Tensor::zeros(s, device))
            .collect::<Result<Vec<_>>>()?;
        let layers = plan
            .layers
            .iter()
            .map(|spec| create_layer(spec, device, &nodes[spec.src], &nodes[spec.dst]))
            .collect::<Result<Vec<_>>>()?;

        let net = Network {
            layers,
            nodes,
            device: device.clone(),
        };
        tracing::info!(
            device = %device.name(),
            layers = net.layers.len(),
            nodes = net.nodes.len(),
            params = net.num_parameters(),
            "network assembled"
        );
        Ok(net)
    }

    /// Initialize trainable layers that are not loaded from disk, and log
    /// one model line per trainable layer.
    pub fn init_params(&mut self, rng: &mut Initializer) -> Result<()> {
        for layer in self.layers.iter_mut().filter(|l| l.is_trainable()) {
            if !layer.spec().load {
                layer.init_params(rng)?;
            }
            layer.model_info();
        }
        Ok(())
    }

    pub fn layers(&self) -> &[Box<dyn Layer<B>>] {
        &self.layers
    }

    pub fn nodes(&self) -> &[Tensor<B>] {
        &self.nodes
    }

    pub fn node(&self, i: usize) -> Option<&Tensor<B>> {
        self.nodes.get(i)
    }

    /// The input buffer (node 0).
    pub fn input(&self) -> Option<&Tensor<B>> {
        self.nodes.first()
    }

    pub fn input_mut(&mut self) -> Option<&mut Tensor<B>> {
        self.nodes.first_mut()
    }

    /// The last node buffer.
    pub fn output(&self) -> Option<&Tensor<B>> {
        self.nodes.last()
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// All trainable tensors in layer order, weight before bias.
    pub fn params(&self) -> Vec<&Tensor<B>> {
        self.layers.iter().flat_map(|l| l.params()).collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }
}
