// NetConfig — Deserializable network configuration
//
// Field names follow the configuration keys one-to-one:
//
//   model.{min_device, max_device, num_evals, stt_round, end_round, max_round}
//   model.{isLoad, isFixed, sigma}           one entry per trainable layer
//   layer.{type, ksize, pad, stride, flts, secc,
//          neuron_t, pool_t, dropout, loss_t} one entry per declared layer
//   optim.{epsW, epsB, epsE, wd, type, algo}
//   tformat.{rows, cols, chls, nums, numClass}
//
// Parsing only checks types. Cross-field checks (array lengths, names) are
// done by the graph builder so a bad file fails with a precise error.

use serde::{Deserialize, Serialize};

/// Top-level network configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    pub model: ModelConfig,
    pub layer: LayerConfig,
    pub optim: OptimConfig,
    pub tformat: TensorFormat,
}

/// A boolean flag written either as `true`/`false` or as `0`/`1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    pub fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

impl From<bool> for Flag {
    fn from(b: bool) -> Self {
        Flag::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub min_device: usize,
    pub max_device: usize,
    pub num_evals: usize,
    pub stt_round: usize,
    pub end_round: usize,
    pub max_round: usize,
    #[serde(rename = "isLoad")]
    pub is_load: Vec<Flag>,
    #[serde(rename = "isFixed")]
    pub is_fixed: Vec<Flag>,
    pub sigma: Vec<f32>,
}

/// Parallel per-layer arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub ksize: Vec<usize>,
    pub pad: Vec<usize>,
    pub stride: Vec<usize>,
    pub flts: Vec<usize>,
    pub secc: Vec<usize>,
    pub neuron_t: Vec<i32>,
    pub pool_t: Vec<i32>,
    pub dropout: Vec<f32>,
    pub loss_t: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimConfig {
    #[serde(rename = "epsW")]
    pub eps_w: f32,
    #[serde(rename = "epsB")]
    pub eps_b: f32,
    #[serde(rename = "epsE")]
    pub eps_e: f32,
    pub wd: f32,
    #[serde(rename = "type")]
    pub kind: String,
    pub algo: i32,
}

/// Input tensor format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensorFormat {
    pub rows: usize,
    pub cols: usize,
    pub chls: usize,
    /// Batch size per device.
    pub nums: usize,
    #[serde(rename = "numClass")]
    pub num_class: usize,
}
