// LayerSpec — Declarative description of one node-to-node layer
//
// A LayerSpec is what the graph builder emits per node: the layer kind, its
// geometry and hyperparameters, and the (src, dst) indices into the node
// buffer array. It holds no tensors; `factory::create_layer` turns it into
// a concrete layer bound to buffers.
//
// Shape planning lives here too, so a whole network can be sized before any
// memory is allocated:
//
//   Convolution  (rows, cols, chls, nums) → (h_col, w_col, flts, nums)
//   Pooling      (rows, cols, chls, nums) → (h_pool, w_pool, chls, nums)
//   FullConn     (rows, cols, chls, nums) → (flts, 1, 1, nums)
//   others       identity

use std::fmt;
use std::str::FromStr;

use kestrel_core::error::{Error, Result};
use kestrel_core::geometry::{Patch, Pool};
use kestrel_core::shape::Shape;

/// The seven layer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Convolution,
    Dropout,
    FullConn,
    Loss,
    Neuron,
    Pooling,
    Softmax,
}

impl LayerKind {
    pub const ALL: [LayerKind; 7] = [
        LayerKind::Convolution,
        LayerKind::Dropout,
        LayerKind::FullConn,
        LayerKind::Loss,
        LayerKind::Neuron,
        LayerKind::Pooling,
        LayerKind::Softmax,
    ];

    /// Name used in configuration files.
    pub fn config_name(self) -> &'static str {
        match self {
            LayerKind::Convolution => "conv",
            LayerKind::Dropout => "dropout",
            LayerKind::FullConn => "fullc",
            LayerKind::Loss => "loss",
            LayerKind::Neuron => "neuron",
            LayerKind::Pooling => "pool",
            LayerKind::Softmax => "softmax",
        }
    }

    /// Layers with weights and biases.
    pub fn is_trainable(self) -> bool {
        matches!(self, LayerKind::Convolution | LayerKind::FullConn)
    }
}

impl FromStr for LayerKind {
    type Err = Error;

    /// Parse a configuration name. Matching is exact and case-sensitive.
    fn from_str(s: &str) -> Result<Self> {
        LayerKind::ALL
            .into_iter()
            .find(|k| k.config_name() == s)
            .ok_or_else(|| Error::UnknownLayerType(s.to_string()))
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerKind::Convolution => "Convolution",
            LayerKind::Dropout => "Dropout",
            LayerKind::FullConn => "FullConn",
            LayerKind::Loss => "Loss",
            LayerKind::Neuron => "Neuron",
            LayerKind::Pooling => "Pooling",
            LayerKind::Softmax => "Softmax",
        };
        f.write_str(s)
    }
}

/// One node of the expanded layer graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub kind: LayerKind,
    /// Input node index.
    pub src: usize,
    /// Output node index.
    pub dst: usize,

    pub ksize: usize,
    pub pad: usize,
    pub stride: usize,
    /// Filter count (output channels / output features).
    pub flts: usize,
    /// Group count for grouped convolution.
    pub secc: usize,

    /// Activation type; > 0 requests an implicit Neuron node.
    pub neuron: i32,
    pub pool: i32,
    /// Dropout fraction; > 0 requests an implicit Dropout node.
    pub dropout: f32,
    pub loss: i32,

    /// Load parameters from disk instead of initializing them.
    pub load: bool,
    /// Excluded from parameter updates.
    pub frozen: bool,
    /// Initialization scale.
    pub sigma: f32,
}

impl LayerSpec {
    /// A spec with every field zeroed except kind and indices.
    pub fn new(kind: LayerKind, src: usize, dst: usize) -> Self {
        LayerSpec {
            kind,
            src,
            dst,
            ksize: 0,
            pad: 0,
            stride: 0,
            flts: 0,
            secc: 0,
            neuron: 0,
            pool: 0,
            dropout: 0.0,
            loss: 0,
            load: false,
            frozen: false,
            sigma: 0.0,
        }
    }

    /// Human-readable type description used in model logs.
    pub fn describe(&self) -> String {
        match self.kind {
            LayerKind::Convolution => format!("Convolution\t{}", self.secc),
            LayerKind::Dropout => format!("Dropout\t\t{}", self.dropout),
            LayerKind::Pooling => format!("Pooling\t\t{}", self.ksize),
            kind => kind.to_string(),
        }
    }

    pub fn patch(&self) -> Patch {
        Patch::new(self.ksize, self.pad, self.stride)
    }

    pub fn pool_window(&self) -> Pool {
        Pool::new(self.ksize, self.pad, self.stride)
    }

    fn check_filters(&self) -> Result<()> {
        if self.flts == 0 {
            return Err(Error::InvalidGeometry(format!(
                "{} layer {}→{} needs at least one filter",
                self.kind, self.src, self.dst
            )));
        }
        Ok(())
    }

    /// Output shape of this layer for a given input shape.
    pub fn output_shape(&self, input: &Shape) -> Result<Shape> {
        match self.kind {
            LayerKind::Convolution => {
                self.check_filters()?;
                let g = self.patch().pack_shape(input)?;
                Ok(Shape::new(g.h_col, g.w_col, self.flts, input.nums()))
            }
            LayerKind::Pooling => Ok(self.pool_window().pool_shape(input)?.shape),
            LayerKind::FullConn => {
                self.check_filters()?;
                Ok(Shape::new(self.flts, 1, 1, input.nums()))
            }
            LayerKind::Dropout | LayerKind::Loss | LayerKind::Neuron | LayerKind::Softmax => {
                Ok(*input)
            }
        }
    }

    /// Weight and bias shapes of a trainable layer; `None` otherwise.
    ///
    /// Convolution: weight (ksize, ksize, chls / secc, flts), bias (1, 1, flts, 1).
    /// FullConn: weight (flts, rows·cols·chls, 1, 1), bias (flts, 1, 1, 1).
    pub fn param_shapes(&self, input: &Shape) -> Result<Option<(Shape, Shape)>> {
        match self.kind {
            LayerKind::Convolution => {
                self.check_filters()?;
                if self.secc == 0 || input.chls() % self.secc != 0 {
                    return Err(Error::InvalidGeometry(format!(
                        "{} input channels can not be split into {} groups",
                        input.chls(),
                        self.secc
                    )));
                }
                Ok(Some((
                    Shape::new(self.ksize, self.ksize, input.chls() / self.secc, self.flts),
                    Shape::new(1, 1, self.flts, 1),
                )))
            }
            LayerKind::FullConn => {
                self.check_filters()?;
                let features = input.rows() * input.cols() * input.chls();
                Ok(Some((
                    Shape::new(self.flts, features, 1, 1),
                    Shape::new(self.flts, 1, 1, 1),
                )))
            }
            _ => Ok(None),
        }
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3} -> {:<3} {}", self.src, self.dst, self.describe())?;
        if self.frozen {
            write!(f, " [frozen]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("conv".parse::<LayerKind>().unwrap(), LayerKind::Convolution);
        assert_eq!("pool".parse::<LayerKind>().unwrap(), LayerKind::Pooling);
        assert_eq!("fullc".parse::<LayerKind>().unwrap(), LayerKind::FullConn);
        assert!(matches!(
            "Conv".parse::<LayerKind>(),
            Err(Error::UnknownLayerType(_))
        ));
        assert!("bogus".parse::<LayerKind>().is_err());
        for k in LayerKind::ALL {
            assert_eq!(k.config_name().parse::<LayerKind>().unwrap(), k);
        }
    }

    #[test]
    fn test_describe() {
        let mut s = LayerSpec::new(LayerKind::Convolution, 0, 1);
        s.secc = 2;
        assert_eq!(s.describe(), "Convolution\t2");
        s.kind = LayerKind::Dropout;
        s.dropout = 0.5;
        assert_eq!(s.describe(), "Dropout\t\t0.5");
        s.kind = LayerKind::Pooling;
        s.ksize = 3;
        assert_eq!(s.describe(), "Pooling\t\t3");
        s.kind = LayerKind::FullConn;
        assert_eq!(s.describe(), "FullConn");
        s.kind = LayerKind::Softmax;
        assert_eq!(s.describe(), "Softmax");
    }

    #[test]
    fn test_conv_planning() {
        let mut s = LayerSpec::new(LayerKind::Convolution, 0, 1);
        s.ksize = 5;
        s.pad = 2;
        s.stride = 1;
        s.flts = 32;
        s.secc = 1;
        let input = Shape::new(28, 28, 3, 16);
        assert_eq!(s.output_shape(&input).unwrap(), Shape::new(28, 28, 32, 16));
        let (w, b) = s.param_shapes(&input).unwrap().unwrap();
        assert_eq!(w, Shape::new(5, 5, 3, 32));
        assert_eq!(b, Shape::new(1, 1, 32, 1));

        s.secc = 2;
        assert!(s.param_shapes(&input).is_err());
    }

    #[test]
    fn test_fullc_and_identity_planning() {
        let mut s = LayerSpec::new(LayerKind::FullConn, 2, 3);
        s.flts = 10;
        let input = Shape::new(4, 4, 8, 32);
        assert_eq!(s.output_shape(&input).unwrap(), Shape::new(10, 1, 1, 32));
        let (w, _) = s.param_shapes(&input).unwrap().unwrap();
        assert_eq!(w.extents(), [10, 128, 1, 1]);

        let n = LayerSpec::new(LayerKind::Neuron, 3, 4);
        assert_eq!(n.output_shape(&input).unwrap(), input);
        assert!(n.param_shapes(&input).unwrap().is_none());

        s.flts = 0;
        assert!(s.output_shape(&input).is_err());
    }
}
