// Raw buffer persistence
//
// A persisted buffer is a flat dump of its elements in native byte order,
// with no header. Elements are laid out nums-outermost, then chls, rows,
// cols, which is the in-memory order, so the file is the buffer verbatim.
//
// Because nothing about the tensor is stored, loading takes the shape and
// device from the caller. The file length must be exactly
// `shape.size() × element width`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use kestrel_core::backend::Backend;
use kestrel_core::dtype::WithDType;
use kestrel_core::error::{Error, Result};
use kestrel_core::shape::Shape;
use kestrel_core::tensor::Tensor;

/// Write the contents of `tensor` to `path`, replacing any existing file.
pub fn save_raw<B: Backend, T: WithDType>(
    tensor: &Tensor<B, T>,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = tensor.to_bytes()?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "buffer saved");
    Ok(())
}

/// Read a buffer of `shape` from `path` into a new tensor on `device`.
pub fn load_raw<B: Backend, T: WithDType>(
    path: impl AsRef<Path>,
    shape: impl Into<Shape>,
    device: &B::Device,
) -> Result<Tensor<B, T>> {
    let path = path.as_ref();
    let shape = shape.into();
    let expected = shape.size() * T::width();

    let file = File::open(path)?;
    let found = file.metadata()?.len() as usize;
    if found != expected {
        return Err(Error::msg(format!(
            "{}: file holds {found} bytes, shape {shape} of {} needs {expected}",
            path.display(),
            T::DTYPE
        )));
    }
    let mut bytes = Vec::with_capacity(expected);
    BufReader::new(file).read_to_end(&mut bytes)?;

    let mut tensor = Tensor::new(shape, device)?;
    tensor.write_bytes(&bytes)?;
    tracing::debug!(path = %path.display(), bytes = expected, "buffer loaded");
    Ok(tensor)
}

/// Load into an existing tensor, keeping its shape and device.
pub fn load_raw_into<B: Backend, T: WithDType>(
    tensor: &mut Tensor<B, T>,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let mut bytes = Vec::with_capacity(tensor.byte_len());
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    tensor.write_bytes(&bytes).map_err(|e| match e {
        Error::ElementCountMismatch { expected, got } => Error::msg(format!(
            "{}: file holds {got} bytes, tensor needs {expected}",
            path.display()
        )),
        other => other,
    })
}
