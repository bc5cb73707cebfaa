//! # kestrel-nn
//!
//! Declarative layer graphs for kestrel.
//!
//! A network is described by a [`NetConfig`]: parallel per-layer arrays,
//! per-trainable-layer arrays, and optimizer scalars. From there:
//!
//! 1. **GraphBuilder** expands the config into a [`NetPlan`]: an indexed
//!    chain of [`LayerSpec`] nodes, with implicit Neuron/Dropout nodes
//!    inserted and frozen flags propagated over the prefix
//! 2. **OptimDescriptor** pairs (weight, bias) per trainable layer
//! 3. **create_layer** turns one spec into a concrete [`Layer`] bound to a
//!    device and two node buffers
//! 4. **Network** allocates the node buffers and instantiates the whole plan
//!
//! Layers are generic over `Backend`, so the same plan instantiates on the
//! host or on an accelerator.

pub mod activation;
pub mod config;
pub mod conv;
pub mod dropout;
pub mod factory;
pub mod fullc;
pub mod graph;
pub mod layer;
pub mod layer_spec;
pub mod loss;
pub mod network;
pub mod optim;

pub use activation::{Neuron, Softmax};
pub use config::{Flag, LayerConfig, ModelConfig, NetConfig, OptimConfig, TensorFormat};
pub use conv::{Convolution, Pooling};
pub use dropout::Dropout;
pub use factory::create_layer;
pub use fullc::FullConn;
pub use graph::{GraphBuilder, NetPlan};
pub use layer::{Layer, LayerBase};
pub use layer_spec::{LayerKind, LayerSpec};
pub use loss::Loss;
pub use network::{plan_node_shapes, Network};
pub use optim::{lr_multiplier, OptimDescriptor, OptimKind, REFERENCE_BATCH};
