// Graph expansion: node indices, implicit nodes, freezing, descriptors,
// configuration errors.

use kestrel_core::{Error, Shape};
use kestrel_nn::{
    Flag, GraphBuilder, LayerConfig, LayerKind, ModelConfig, NetConfig, NetPlan, OptimConfig,
    OptimKind, TensorFormat,
};

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
}

/// A config for `types` with neutral per-layer settings and one entry per
/// trainable layer in the model arrays.
fn config(types: &[&str]) -> NetConfig {
    let n = types.len();
    let trainable = types.iter().filter(|t| **t == "conv" || **t == "fullc").count();
    NetConfig {
        model: ModelConfig {
            min_device: 0,
            max_device: 0,
            num_evals: 100,
            stt_round: 0,
            end_round: 10,
            max_round: 20,
            is_load: vec![Flag::Bool(false); trainable],
            is_fixed: vec![Flag::Bool(false); trainable],
            sigma: vec![0.01; trainable],
        },
        layer: LayerConfig {
            kind: types.iter().map(|t| t.to_string()).collect(),
            ksize: vec![3; n],
            pad: vec![1; n],
            stride: vec![1; n],
            flts: vec![8; n],
            secc: vec![1; n],
            neuron_t: vec![0; n],
            pool_t: vec![0; n],
            dropout: vec![0.0; n],
            loss_t: vec![0; n],
        },
        optim: OptimConfig {
            eps_w: 0.01,
            eps_b: 0.02,
            eps_e: 0.001,
            wd: 0.0005,
            kind: "sgd".into(),
            algo: 0,
        },
        tformat: TensorFormat {
            rows: 8,
            cols: 8,
            chls: 1,
            nums: 32,
            num_class: 10,
        },
    }
}

fn edges(plan: &NetPlan) -> Vec<(LayerKind, usize, usize)> {
    plan.layers.iter().map(|l| (l.kind, l.src, l.dst)).collect()
}

// Node expansion

#[test]
fn test_implicit_neuron_and_dropout_nodes() -> kestrel_core::Result<()> {
    let mut cfg = config(&["conv", "fullc"]);
    cfg.layer.neuron_t = vec![1, 0];
    cfg.layer.dropout = vec![0.0, 0.5];
    let plan = GraphBuilder::new(&cfg).build()?;

    assert_eq!(
        edges(&plan),
        vec![
            (LayerKind::Convolution, 0, 1),
            (LayerKind::Neuron, 1, 2),
            (LayerKind::FullConn, 2, 3),
            (LayerKind::Dropout, 3, 4),
        ]
    );
    assert_eq!(plan.num_layers(), 4);
    assert_eq!(plan.num_nodes(), 5);
    assert_eq!(plan.num_optims(), 2);
    assert_eq!(plan.optim_descriptors().len(), 4);
    Ok(())
}

#[test]
fn test_neuron_then_dropout_on_same_layer() -> kestrel_core::Result<()> {
    let mut cfg = config(&["fullc", "softmax"]);
    cfg.layer.neuron_t = vec![2, 0];
    cfg.layer.dropout = vec![0.25, 0.0];
    let plan = NetPlan::from_config(&cfg)?;
    assert_eq!(
        edges(&plan),
        vec![
            (LayerKind::FullConn, 0, 1),
            (LayerKind::Neuron, 1, 2),
            (LayerKind::Dropout, 2, 3),
            (LayerKind::Softmax, 3, 4),
        ]
    );
    // implicit nodes carry the declaring layer's settings
    assert_eq!(plan.layers[1].neuron, 2);
    assert_eq!(plan.layers[2].dropout, 0.25);
    Ok(())
}

#[test]
fn test_trainable_arrays_use_their_own_counter() -> kestrel_core::Result<()> {
    let mut cfg = config(&["conv", "pool", "conv", "fullc", "loss"]);
    cfg.model.sigma = vec![0.1, 0.2, 0.3];
    cfg.model.is_load = vec![Flag::Int(0), Flag::Int(1), Flag::Int(0)];
    let plan = GraphBuilder::new(&cfg).build()?;

    let sigmas: Vec<f32> = plan.trainable_layers().map(|l| l.sigma).collect();
    assert_eq!(sigmas, vec![0.1, 0.2, 0.3]);
    let loads: Vec<bool> = plan.trainable_layers().map(|l| l.load).collect();
    assert_eq!(loads, vec![false, true, false]);
    // parameterless layers keep the defaults
    assert_eq!(plan.layers[1].sigma, 0.0);
    assert!(!plan.layers[1].load);
    Ok(())
}

// Freezing

#[test]
fn test_frozen_prefix_propagation() -> kestrel_core::Result<()> {
    let mut cfg = config(&["conv", "conv", "fullc"]);
    cfg.layer.neuron_t = vec![1, 0, 0];
    cfg.layer.dropout = vec![0.5, 0.0, 0.0];
    cfg.model.is_fixed = vec![Flag::Bool(false), Flag::Bool(true), Flag::Bool(false)];
    let plan = GraphBuilder::new(&cfg).build()?;

    // conv 0→1, neuron 1→2, dropout 2→3, conv 3→4, fullc 4→5
    assert_eq!(plan.num_nodes(), 6);
    let frozen: Vec<bool> = plan.layers.iter().map(|l| l.frozen).collect();
    assert_eq!(frozen, vec![true, true, true, true, false]);

    // descriptors keep the configured flag, not the propagated one
    let optim_frozen: Vec<bool> = plan.weight_optims.iter().map(|o| o.frozen).collect();
    assert_eq!(optim_frozen, vec![false, true, false]);
    let bias_frozen: Vec<bool> = plan.bias_optims.iter().map(|o| o.frozen).collect();
    assert_eq!(bias_frozen, optim_frozen);
    Ok(())
}

#[test]
fn test_implicit_nodes_extend_the_frozen_prefix() -> kestrel_core::Result<()> {
    let mut cfg = config(&["conv", "fullc"]);
    cfg.layer.neuron_t = vec![1, 0];
    cfg.model.is_fixed = vec![Flag::Int(1), Flag::Int(0)];
    let plan = GraphBuilder::new(&cfg).build()?;

    assert!(plan.layers[0].frozen);
    assert_eq!(plan.layers[1].kind, LayerKind::Neuron);
    assert!(plan.layers[1].frozen);
    assert!(!plan.layers[2].frozen);
    Ok(())
}

#[test]
fn test_nothing_frozen() -> kestrel_core::Result<()> {
    let plan = GraphBuilder::new(&config(&["conv", "pool", "fullc"])).build()?;
    assert!(plan.layers.iter().all(|l| !l.frozen));
    assert!(plan.optim_descriptors().iter().all(|o| !o.frozen));
    Ok(())
}

// Optimizer descriptors

#[test]
fn test_descriptor_rates_scale_with_devices_and_batch() -> kestrel_core::Result<()> {
    let mut cfg = config(&["conv", "fullc"]);
    cfg.model.min_device = 1;
    cfg.model.max_device = 2;
    cfg.optim.kind = "adam".into();
    cfg.optim.algo = 3;
    let plan = GraphBuilder::new(&cfg).build()?;

    // 2 devices * 32 items / 128 = 0.5
    let w = plan.weight_optims[0];
    assert_eq!(w.kind, OptimKind::Adam);
    assert_eq!(w.algo, 3);
    assert!(approx_eq(w.lr_base, 0.005));
    assert!(approx_eq(w.lr_last, 0.0005));
    assert!(approx_eq(w.wd, 0.0005));

    let b = plan.bias_optims[0];
    assert!(approx_eq(b.lr_base, 0.01));
    assert!(approx_eq(b.lr_last, 0.0005));
    assert_eq!(b.wd, 0.0);

    let all = plan.optim_descriptors();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0], plan.weight_optims[0]);
    assert_eq!(all[1], plan.bias_optims[0]);
    assert_eq!(all[2], plan.weight_optims[1]);
    Ok(())
}

// Bookkeeping

#[test]
fn test_model_bookkeeping() -> kestrel_core::Result<()> {
    let mut cfg = config(&["conv", "fullc", "loss"]);
    cfg.model.min_device = 1;
    cfg.model.max_device = 4;
    cfg.model.num_evals = 100;
    let plan = GraphBuilder::new(&cfg).build()?;

    assert_eq!(plan.num_device, 4);
    assert_eq!(plan.num_nnets, 5);
    assert_eq!(plan.num_evals, 25);
    assert_eq!((plan.stt_round, plan.end_round, plan.max_round), (0, 10, 20));
    assert_eq!(plan.shape_src, Shape::new(8, 8, 1, 32));
    assert_eq!(plan.shape_dst, Shape::new(10, 1, 1, 32));
    Ok(())
}

// Configuration errors

#[test]
fn test_unknown_layer_type_fails_before_any_node() {
    let cfg = config(&["conv", "bogus", "fullc"]);
    match GraphBuilder::new(&cfg).build() {
        Err(Error::UnknownLayerType(name)) => assert_eq!(name, "bogus"),
        other => panic!("expected UnknownLayerType, got {other:?}"),
    }
}

#[test]
fn test_layer_names_are_case_sensitive() {
    let cfg = config(&["Conv"]);
    assert!(matches!(
        GraphBuilder::new(&cfg).build(),
        Err(Error::UnknownLayerType(_))
    ));
}

#[test]
fn test_short_per_layer_array() {
    let mut cfg = config(&["conv", "pool", "fullc"]);
    cfg.layer.stride.pop();
    match GraphBuilder::new(&cfg).build() {
        Err(Error::ConfigLength { key, expected, got }) => {
            assert_eq!(key, "layer.stride");
            assert_eq!((expected, got), (3, 2));
        }
        other => panic!("expected ConfigLength, got {other:?}"),
    }
}

#[test]
fn test_short_trainable_array() {
    let mut cfg = config(&["conv", "pool", "fullc"]);
    cfg.model.sigma = vec![0.01];
    assert!(matches!(
        GraphBuilder::new(&cfg).build(),
        Err(Error::ConfigLength {
            key: "model.sigma",
            expected: 2,
            got: 1
        })
    ));
}

#[test]
fn test_unknown_optimizer() {
    let mut cfg = config(&["fullc"]);
    cfg.optim.kind = "lbfgs".into();
    assert!(matches!(
        GraphBuilder::new(&cfg).build(),
        Err(Error::UnknownOptimizer(_))
    ));
}

#[test]
fn test_empty_device_range_and_empty_layer_list() {
    let mut cfg = config(&["fullc"]);
    cfg.model.min_device = 2;
    cfg.model.max_device = 1;
    assert!(GraphBuilder::new(&cfg).build().is_err());

    let cfg = config(&[]);
    assert!(GraphBuilder::new(&cfg).build().is_err());
}

// JSON shape of the configuration

#[test]
fn test_config_from_json() -> kestrel_core::Result<()> {
    let json = r#"{
        "model": {
            "min_device": 0, "max_device": 1, "num_evals": 10,
            "stt_round": 0, "end_round": 5, "max_round": 5,
            "isLoad": [0, false], "isFixed": [true, 0], "sigma": [0.1, 0.05]
        },
        "layer": {
            "type": ["conv", "pool", "fullc", "softmax"],
            "ksize": [5, 2, 0, 0], "pad": [2, 0, 0, 0], "stride": [1, 2, 0, 0],
            "flts": [16, 0, 10, 0], "secc": [1, 0, 0, 0],
            "neuron_t": [1, 0, 0, 0], "pool_t": [0, 1, 0, 0],
            "dropout": [0, 0, 0.5, 0], "loss_t": [0, 0, 0, 1]
        },
        "optim": { "epsW": 0.01, "epsB": 0.02, "epsE": 0.001, "wd": 0.0005, "type": "nag", "algo": 1 },
        "tformat": { "rows": 28, "cols": 28, "chls": 1, "nums": 64, "numClass": 10 }
    }"#;
    let cfg: NetConfig =
        serde_json::from_str(json).map_err(|e| Error::msg(e.to_string()))?;
    assert!(cfg.model.is_fixed[0].is_set());
    assert!(!cfg.model.is_load[0].is_set());

    let plan = GraphBuilder::new(&cfg).build()?;
    assert_eq!(
        edges(&plan),
        vec![
            (LayerKind::Convolution, 0, 1),
            (LayerKind::Neuron, 1, 2),
            (LayerKind::Pooling, 2, 3),
            (LayerKind::FullConn, 3, 4),
            (LayerKind::Dropout, 4, 5),
            (LayerKind::Softmax, 5, 6),
        ]
    );
    assert!(plan.layers[0].frozen && plan.layers[1].frozen);
    assert!(!plan.layers[2].frozen);
    assert_eq!(plan.weight_optims[0].kind, OptimKind::Nag);
    Ok(())
}
