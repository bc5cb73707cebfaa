// GraphBuilder — Expands a NetConfig into an indexed node graph
//
// The network is a chain. Declared layer i does not map to node i: layers
// may request an implicit activation and/or dropout after themselves, and
// each of those occupies its own node. The builder walks the declared
// layers once, handing out consecutive (src, dst) indices:
//
//   conv(neuron=1)  fullc(dropout=0.5)
//     → conv 0→1, neuron 1→2, fullc 2→3, dropout 3→4
//
// Trainable layers (conv, fullc) consume the per-trainable arrays
// (`model.isLoad/isFixed/sigma`) in order, with their own counter.
//
// FREEZING:
//
//   After the walk, every node whose dst is at or before the last frozen
//   node's dst is frozen too. Frozen layers therefore always form a prefix
//   of the chain.
//
// Optimizer descriptors take the configured `isFixed` flag of their own
// trainable layer, not the propagated one.
//
// All validation (names, array lengths, device range) happens before the
// first node is emitted; on error no plan is returned.

use kestrel_core::error::{Error, Result};
use kestrel_core::shape::Shape;

use crate::config::NetConfig;
use crate::layer_spec::{LayerKind, LayerSpec};
use crate::optim::{lr_multiplier, OptimDescriptor, OptimKind};

/// The expanded network: nodes, optimizer descriptors, and run bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct NetPlan {
    /// One entry per node-to-node layer, in execution order.
    pub layers: Vec<LayerSpec>,
    /// Weight descriptors, one per trainable layer.
    pub weight_optims: Vec<OptimDescriptor>,
    /// Bias descriptors, one per trainable layer.
    pub bias_optims: Vec<OptimDescriptor>,

    pub min_device: usize,
    pub max_device: usize,
    /// Devices taking part: `max_device - min_device + 1`.
    pub num_device: usize,
    /// Network replicas to allocate: `max_device + 1`.
    pub num_nnets: usize,
    /// Evaluation batches per device.
    pub num_evals: usize,
    pub stt_round: usize,
    pub end_round: usize,
    pub max_round: usize,

    /// Input node shape.
    pub shape_src: Shape,
    /// Expected output node shape.
    pub shape_dst: Shape,
}

impl NetPlan {
    /// Shorthand for `GraphBuilder::new(config).build()`.
    pub fn from_config(config: &NetConfig) -> Result<NetPlan> {
        GraphBuilder::new(config).build()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Number of trainable layers (descriptor pairs).
    pub fn num_optims(&self) -> usize {
        self.weight_optims.len()
    }

    /// Length of the node buffer array: `max(dst) + 1`.
    pub fn num_nodes(&self) -> usize {
        self.layers.iter().map(|l| l.dst + 1).max().unwrap_or(0)
    }

    /// All descriptors as (weight, bias) in trainable-layer order.
    pub fn optim_descriptors(&self) -> Vec<OptimDescriptor> {
        self.weight_optims
            .iter()
            .zip(&self.bias_optims)
            .flat_map(|(w, b)| [*w, *b])
            .collect()
    }

    /// Trainable layers in descriptor order.
    pub fn trainable_layers(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.iter().filter(|l| l.kind.is_trainable())
    }
}

fn check_len(key: &'static str, got: usize, expected: usize) -> Result<()> {
    if got < expected {
        return Err(Error::ConfigLength { key, expected, got });
    }
    Ok(())
}

/// Builds a [`NetPlan`] from a [`NetConfig`].
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'a> {
    config: &'a NetConfig,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(config: &'a NetConfig) -> Self {
        GraphBuilder { config }
    }

    fn validate(&self) -> Result<(Vec<LayerKind>, OptimKind)> {
        let layer = &self.config.layer;
        let model = &self.config.model;
        let n = layer.kind.len();
        if n == 0 {
            return Err(Error::msg("configuration declares no layers"));
        }

        let kinds = layer
            .kind
            .iter()
            .map(|name| name.parse::<LayerKind>())
            .collect::<Result<Vec<_>>>()?;

        check_len("layer.ksize", layer.ksize.len(), n)?;
        check_len("layer.pad", layer.pad.len(), n)?;
        check_len("layer.stride", layer.stride.len(), n)?;
        check_len("layer.flts", layer.flts.len(), n)?;
        check_len("layer.secc", layer.secc.len(), n)?;
        check_len("layer.neuron_t", layer.neuron_t.len(), n)?;
        check_len("layer.pool_t", layer.pool_t.len(), n)?;
        check_len("layer.dropout", layer.dropout.len(), n)?;
        check_len("layer.loss_t", layer.loss_t.len(), n)?;

        let trainable = kinds.iter().filter(|k| k.is_trainable()).count();
        check_len("model.isLoad", model.is_load.len(), trainable)?;
        check_len("model.isFixed", model.is_fixed.len(), trainable)?;
        check_len("model.sigma", model.sigma.len(), trainable)?;
        if model.is_load.len() > trainable {
            tracing::warn!(
                entries = model.is_load.len(),
                trainable,
                "ignoring per-trainable entries beyond the trainable layer count"
            );
        }

        if model.min_device > model.max_device {
            return Err(Error::msg(format!(
                "device range {}..={} is empty",
                model.min_device, model.max_device
            )));
        }

        let optim = self.config.optim.kind.parse::<OptimKind>()?;
        Ok((kinds, optim))
    }

    /// Expand the configuration. Fails without emitting anything on any
    /// configuration error.
    pub fn build(&self) -> Result<NetPlan> {
        let (kinds, optim_kind) = self.validate()?;
        let layer = &self.config.layer;
        let model = &self.config.model;

        let mut nodes: Vec<LayerSpec> = Vec::with_capacity(kinds.len() * 3);
        let mut next = 0;
        let mut trainable = 0;
        for (i, &kind) in kinds.iter().enumerate() {
            let mut spec = LayerSpec::new(kind, next, next + 1);
            spec.ksize = layer.ksize[i];
            spec.pad = layer.pad[i];
            spec.stride = layer.stride[i];
            spec.flts = layer.flts[i];
            spec.secc = layer.secc[i];
            spec.neuron = layer.neuron_t[i];
            spec.pool = layer.pool_t[i];
            spec.dropout = layer.dropout[i];
            spec.loss = layer.loss_t[i];
            if kind.is_trainable() {
                spec.load = model.is_load[trainable].is_set();
                spec.frozen = model.is_fixed[trainable].is_set();
                spec.sigma = model.sigma[trainable];
                trainable += 1;
            }
            next += 1;

            // implicit nodes copy the declared layer's settings
            let mut implicit = Vec::new();
            if spec.neuron > 0 {
                implicit.push(LayerKind::Neuron);
            }
            if spec.dropout > 0.0 {
                implicit.push(LayerKind::Dropout);
            }
            nodes.push(spec.clone());
            for kind in implicit {
                let mut node = spec.clone();
                node.kind = kind;
                node.src = next;
                node.dst = next + 1;
                nodes.push(node);
                next += 1;
            }
        }

        if let Some(last_frozen) = nodes.iter().filter(|l| l.frozen).map(|l| l.dst).max() {
            for node in nodes.iter_mut().filter(|l| l.dst <= last_frozen) {
                node.frozen = true;
            }
        }

        for node in &nodes {
            tracing::debug!(
                src = node.src,
                dst = node.dst,
                kind = %node.kind,
                frozen = node.frozen,
                "node"
            );
        }

        let num_device = model.max_device - model.min_device + 1;
        let tformat = self.config.tformat;
        let multi = lr_multiplier(num_device, tformat.nums);
        let optim = &self.config.optim;
        let (weight_optims, bias_optims): (Vec<_>, Vec<_>) = model.is_fixed[..trainable]
            .iter()
            .map(|fixed| {
                let weight = OptimDescriptor {
                    kind: optim_kind,
                    algo: optim.algo,
                    lr_base: optim.eps_w * multi,
                    lr_last: optim.eps_e * multi,
                    wd: optim.wd,
                    frozen: fixed.is_set(),
                };
                let bias = OptimDescriptor {
                    lr_base: optim.eps_b * multi,
                    wd: 0.0,
                    ..weight
                };
                (weight, bias)
            })
            .unzip();

        let plan = NetPlan {
            layers: nodes,
            weight_optims,
            bias_optims,
            min_device: model.min_device,
            max_device: model.max_device,
            num_device,
            num_nnets: model.max_device + 1,
            num_evals: model.num_evals / num_device,
            stt_round: model.stt_round,
            end_round: model.end_round,
            max_round: model.max_round,
            shape_src: Shape::new(tformat.rows, tformat.cols, tformat.chls, tformat.nums),
            shape_dst: Shape::new(tformat.num_class, 1, 1, tformat.nums),
        };
        tracing::info!(
            layers = plan.num_layers(),
            nodes = plan.num_nodes(),
            optims = plan.num_optims(),
            devices = plan.num_device,
            "network plan built"
        );
        Ok(plan)
    }
}
