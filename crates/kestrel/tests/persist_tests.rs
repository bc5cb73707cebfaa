// Raw buffer persistence and JSON configuration loading through the facade.

use std::fs;

use tempfile::tempdir;

use kestrel::nn::{GraphBuilder, LayerKind, Network};
use kestrel::persist::{load_raw, load_raw_into, save_raw};
use kestrel::{CpuBackend, CpuDevice, Error, Shape, Tensor};

type T = Tensor<CpuBackend, f32>;

const NET_JSON: &str = r#"{
    "model": {
        "min_device": 0, "max_device": 0, "num_evals": 4,
        "stt_round": 0, "end_round": 2, "max_round": 2,
        "isLoad": [0, 0], "isFixed": [0, 0], "sigma": [0.1, 0.1]
    },
    "layer": {
        "type": ["conv", "pool", "fullc", "softmax"],
        "ksize": [3, 2, 0, 0], "pad": [1, 0, 0, 0], "stride": [1, 2, 0, 0],
        "flts": [2, 0, 3, 0], "secc": [1, 0, 0, 0],
        "neuron_t": [1, 0, 0, 0], "pool_t": [0, 1, 0, 0],
        "dropout": [0, 0, 0, 0], "loss_t": [0, 0, 0, 0]
    },
    "optim": { "epsW": 0.01, "epsB": 0.01, "epsE": 0.001, "wd": 0.0, "type": "sgd", "algo": 0 },
    "tformat": { "rows": 4, "cols": 4, "chls": 1, "nums": 2, "numClass": 3 }
}"#;

#[test]
fn test_save_and_load_raw() -> kestrel::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("buffer.bin");
    let dev = CpuDevice::new(0);

    let data: Vec<f32> = (0..24).map(|i| i as f32 * 0.5).collect();
    let t = T::from_slice(&data, (2, 3, 2, 2), &dev)?;
    save_raw(&t, &path)?;
    assert_eq!(fs::metadata(&path)?.len(), 24 * 4);

    // layout is nums-outermost, then chls, rows, cols: the bytes are the buffer
    let raw = fs::read(&path)?;
    let first = f32::from_ne_bytes([raw[4], raw[5], raw[6], raw[7]]);
    assert_eq!(first, 0.5);

    let back: T = load_raw(&path, (2, 3, 2, 2), &dev)?;
    assert_eq!(*back.shape(), Shape::new(2, 3, 2, 2));
    assert!(back.is_owning());
    assert_eq!(back.to_vec()?, data);

    // shape is taken out of band: any shape of the same size reads the same bytes
    let flat: T = load_raw(&path, (24, 1, 1, 1), &dev)?;
    assert_eq!(flat.to_vec()?, data);
    Ok(())
}

#[test]
fn test_load_raw_rejects_wrong_length() -> kestrel::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("short.bin");
    let dev = CpuDevice::new(0);
    save_raw(&T::zeros((5, 1, 1, 1), &dev)?, &path)?;

    assert!(load_raw::<CpuBackend, f32>(&path, (6, 1, 1, 1), &dev).is_err());
    // 5 f32 = 20 bytes, which is not 5 f64
    assert!(load_raw::<CpuBackend, f64>(&path, (5, 1, 1, 1), &dev).is_err());

    let mut target = T::zeros((4, 1, 1, 1), &dev)?;
    assert!(load_raw_into(&mut target, &path).is_err());
    Ok(())
}

#[test]
fn test_load_raw_missing_file() {
    let dev = CpuDevice::new(0);
    let res = load_raw::<CpuBackend, f32>("/definitely/not/here.bin", (1, 1, 1, 1), &dev);
    assert!(matches!(res, Err(Error::Io(_))));
}

#[test]
fn test_parameters_round_trip_through_files() -> kestrel::Result<()> {
    let dir = tempdir()?;
    let dev = CpuDevice::new(0);
    let cfg = kestrel::config::from_json_str(NET_JSON)?;
    let plan = GraphBuilder::new(&cfg).build()?;
    let mut net = Network::<CpuBackend>::assemble(&plan, &dev)?;
    net.init_params(&mut kestrel::Initializer::seeded(11))?;

    let weight = net.params()[0];
    let path = dir.path().join("conv_w.bin");
    save_raw(weight, &path)?;

    let mut restored = T::zeros(*weight.shape(), &dev)?;
    load_raw_into(&mut restored, &path)?;
    assert_eq!(restored.to_vec()?, weight.to_vec()?);
    Ok(())
}

#[test]
fn test_load_json_file() -> kestrel::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("net.json");
    fs::write(&path, NET_JSON)?;

    let cfg = kestrel::config::load_json(&path)?;
    let plan = GraphBuilder::new(&cfg).build()?;
    let kinds: Vec<LayerKind> = plan.layers.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LayerKind::Convolution,
            LayerKind::Neuron,
            LayerKind::Pooling,
            LayerKind::FullConn,
            LayerKind::Softmax,
        ]
    );
    assert_eq!(plan.shape_dst, Shape::new(3, 1, 1, 2));

    // serializing and reading back gives the same configuration
    let text = kestrel::config::to_json_string(&cfg)?;
    assert_eq!(kestrel::config::from_json_str(&text)?, cfg);
    Ok(())
}

#[test]
fn test_load_json_reports_path() -> kestrel::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"model\": 1 }")?;
    let err = kestrel::config::load_json(&path).unwrap_err();
    assert!(err.to_string().contains("broken.json"));
    Ok(())
}
